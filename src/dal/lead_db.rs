use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::domain::lead::{ExtractedLead, LeadStatus};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LeadRow {
    pub id: i64,
    pub company_id: i64,
    pub contact_name: Option<String>,
    pub contact_email: String,
    pub source_url: String,
    pub status: LeadStatus,
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Returns false when the company already has a lead with this email.
pub async fn insert_lead(
    con: &mut PgConnection,
    company_id: i64,
    lead: &ExtractedLead,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        insert into leads
            (company_id, contact_name, contact_email, source_url, status)
        values
            ($1, $2, $3, $4, $5)
        on conflict (company_id, contact_email) do nothing
        "#,
    )
    .bind(company_id)
    .bind(lead.name.as_deref())
    .bind(&lead.email)
    .bind(&lead.source_url)
    .bind(LeadStatus::New)
    .execute(&mut *con)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_leads_for_company(
    pool: &PgPool,
    company_id: i64,
) -> Result<Vec<LeadRow>, sqlx::Error> {
    sqlx::query_as::<_, LeadRow>(
        r#"
        select
            id, company_id, contact_name, contact_email, source_url, status, note, timestamp
        from
            leads
        where
            company_id = $1
        order by timestamp desc
        "#,
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
}
