use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dal::job_db;

use super::{
    persist_scraping_result, ProgressEvent, ProgressHub, ProgressPhase, ScrapeEventSink,
    ScrapeOrchestrator,
};

pub const GENERIC_FAILURE: &str = "Scrape failed. Please try again later.";

/// Runs one job to completion: scrape, store, then mark the job done or error.
/// A panic inside the run still leaves the job in `error` with its channel closed.
pub async fn run_scrape_job(
    pool: PgPool,
    orchestrator: Arc<ScrapeOrchestrator>,
    hub: Arc<ProgressHub>,
    job_id: Uuid,
    competitor: String,
    domain_budget: usize,
) {
    hub.open(job_id);

    let task = tokio::spawn(execute_job(
        pool.clone(),
        orchestrator,
        hub.clone(),
        job_id,
        competitor,
        domain_budget,
    ));

    if let Err(e) = task.await {
        log::error!("Job {} aborted: {:?}", job_id, e);
        if let Err(e) = job_db::mark_job_failed(&pool, job_id, GENERIC_FAILURE).await {
            log::error!("Failed to update state of job {}: {:?}", job_id, e);
        }
        hub.publish(
            job_id,
            ProgressEvent::new(
                ProgressPhase::Complete,
                "error",
                1.0,
                json!({ "error": GENERIC_FAILURE }),
            ),
        );
        hub.close(job_id);
    }
}

async fn execute_job(
    pool: PgPool,
    orchestrator: Arc<ScrapeOrchestrator>,
    hub: Arc<ProgressHub>,
    job_id: Uuid,
    competitor: String,
    domain_budget: usize,
) {
    let sink = hub.sink(job_id);

    let outcome = match orchestrator.run(&competitor, domain_budget, &sink).await {
        Ok(result) => {
            sink.publish(ProgressEvent::new(
                ProgressPhase::Storage,
                "storing results",
                0.0,
                json!({ "companies": result.companies.len(), "leads": result.leads.len() }),
            ));
            match persist_scraping_result(&pool, &result).await {
                Ok(counts) => {
                    sink.publish(ProgressEvent::new(
                        ProgressPhase::Storage,
                        "results stored",
                        1.0,
                        json!(counts),
                    ));
                    Ok(result)
                }
                Err(e) => Err(format!("storage failed: {:?}", e)),
            }
        }
        Err(e) => Err(format!("scrape failed: {:?}", e)),
    };

    let finished = match outcome {
        Ok(result) => {
            let note = match result.errors.is_empty() {
                true => None,
                false => Some(format!(
                    "Completed with {} errors ({} leads found)",
                    result.errors.len(),
                    result.total_leads_found
                )),
            };
            let finished = job_db::mark_job_done(&pool, job_id, note.as_deref()).await;
            sink.publish(ProgressEvent::new(
                ProgressPhase::Complete,
                "done",
                1.0,
                json!({
                    "totalSearched": result.total_searched,
                    "totalLeadsFound": result.total_leads_found,
                    "companies": result.companies.len(),
                    "errors": result.errors,
                    "partial": result.is_partial(),
                }),
            ));
            finished
        }
        Err(e) => {
            log::error!("Job {} failed: {}", job_id, e);
            let finished = job_db::mark_job_failed(&pool, job_id, GENERIC_FAILURE).await;
            sink.publish(ProgressEvent::new(
                ProgressPhase::Complete,
                "error",
                1.0,
                json!({ "error": GENERIC_FAILURE }),
            ));
            finished
        }
    };

    if let Err(e) = finished {
        log::error!("Failed to update state of job {}: {:?}", job_id, e);
    }

    hub.close(job_id);
}
