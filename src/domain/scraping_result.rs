use serde::Serialize;

use super::{company::CompanyRecord, lead::ExtractedLead, search_result::SearchResult};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingResult {
    pub competitor: String,
    pub search_results: Vec<SearchResult>,
    pub leads: Vec<ExtractedLead>,
    pub companies: Vec<CompanyRecord>,
    pub total_searched: usize,
    pub domains_checked: usize,
    pub total_leads_found: usize,
    pub errors: Vec<String>,
}

impl ScrapingResult {
    pub fn new(competitor: &str) -> Self {
        ScrapingResult {
            competitor: competitor.to_string(),
            ..Default::default()
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty() && !self.leads.is_empty()
    }
}
