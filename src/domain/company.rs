use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyRecord {
    pub domain: String,
    pub name: String,
}
