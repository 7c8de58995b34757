use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgPool;

use crate::{
    dal::{company_db, lead_db},
    domain::{scraping_result::ScrapingResult, web_domain::normalize_domain},
    services::prettify_domain,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct StoredCounts {
    pub companies: usize,
    pub leads: usize,
    pub duplicate_leads: usize,
}

/// Writes companies and leads of one run in a single transaction.
pub async fn persist_scraping_result(
    pool: &PgPool,
    result: &ScrapingResult,
) -> Result<StoredCounts, sqlx::Error> {
    let mut counts = StoredCounts::default();
    let mut company_ids: HashMap<String, i64> = HashMap::new();
    let mut tx = pool.begin().await?;

    for company in result.companies.iter() {
        let Some(domain) = normalize_domain(&company.domain) else {
            log::warn!("Skipping company with invalid domain: {}", company.domain);
            continue;
        };
        let id = company_db::upsert_company(&mut *tx, &domain, &company.name).await?;
        company_ids.insert(company.domain.clone(), id);
        counts.companies += 1;
    }

    for lead in result.leads.iter() {
        let company_id = match company_ids.get(&lead.domain) {
            Some(id) => *id,
            None => {
                let Some(domain) = normalize_domain(&lead.domain) else {
                    log::warn!("Skipping lead {} with invalid domain", lead.email);
                    continue;
                };
                let id =
                    company_db::upsert_company(&mut *tx, &domain, &prettify_domain(&domain)).await?;
                company_ids.insert(lead.domain.clone(), id);
                counts.companies += 1;
                id
            }
        };

        match lead_db::insert_lead(&mut *tx, company_id, lead).await? {
            true => counts.leads += 1,
            false => counts.duplicate_leads += 1,
        }
    }

    tx.commit().await?;

    Ok(counts)
}
