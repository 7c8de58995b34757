use actix_web::{http::StatusCode, post, web, HttpResponse, ResponseError};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    configuration::ScraperSettings,
    dal::job_db,
    domain::job::{parse_competitor, Job},
    services::{run_scrape_job, ProgressHub, ScrapeOrchestrator},
};

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("{0}")]
    Validation(String),
    #[error("Job {0} not found")]
    JobNotFound(Uuid),
    #[error("Job {0} is not queued")]
    JobNotQueued(Uuid),
    #[error("Competitor does not match the job")]
    CompetitorMismatch,
    #[error("Internal server error")]
    Database(#[from] sqlx::Error),
}

impl ResponseError for TriggerError {
    fn status_code(&self) -> StatusCode {
        match self {
            TriggerError::Validation(_) | TriggerError::CompetitorMismatch => {
                StatusCode::BAD_REQUEST
            }
            TriggerError::JobNotFound(_) => StatusCode::NOT_FOUND,
            TriggerError::JobNotQueued(_) => StatusCode::CONFLICT,
            TriggerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let TriggerError::Database(e) = self {
            log::error!("Database error while triggering scrape: {:?}", e);
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerScrapeBody {
    job_id: String,
    competitor: String,
}

pub fn parse_job_id(raw: &str) -> Result<Uuid, TriggerError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| TriggerError::Validation(format!("Invalid job id: {}", raw)))
}

/// Checks that `job` may be started for `competitor`. Runs before any network activity.
pub fn validate_trigger(job: &Job, competitor: &str) -> Result<(), TriggerError> {
    if !job.is_queued() {
        return Err(TriggerError::JobNotQueued(job.id));
    }
    if !job.competitor_matches(competitor) {
        return Err(TriggerError::CompetitorMismatch);
    }
    Ok(())
}

#[post("/scrape")]
async fn trigger_scrape(
    body: web::Json<TriggerScrapeBody>,
    pool: web::Data<PgPool>,
    orchestrator: web::Data<ScrapeOrchestrator>,
    hub: web::Data<ProgressHub>,
    settings: web::Data<ScraperSettings>,
) -> Result<HttpResponse, TriggerError> {
    let job_id = parse_job_id(&body.job_id)?;
    let competitor = parse_competitor(&body.competitor).map_err(TriggerError::Validation)?;

    let job = job_db::get_job(&pool, job_id)
        .await?
        .ok_or(TriggerError::JobNotFound(job_id))?;
    validate_trigger(&job, &competitor)?;

    if !job_db::mark_job_running(&pool, job_id).await? {
        return Err(TriggerError::JobNotQueued(job_id));
    }
    hub.open(job_id);
    log::info!("Starting scrape job {} for {}", job_id, competitor);

    tokio::spawn(run_scrape_job(
        pool.get_ref().clone(),
        orchestrator.into_inner(),
        hub.into_inner(),
        job_id,
        competitor,
        settings.domain_budget,
    ));

    Ok(HttpResponse::Accepted().json(json!({ "jobId": job_id, "state": "running" })))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::job::JobState;

    fn job(state: JobState) -> Job {
        Job {
            id: Uuid::new_v4(),
            competitor: "Acme".to_string(),
            state,
            requested_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    #[test]
    fn validate_trigger_accepts_queued_matching_job() {
        assert!(validate_trigger(&job(JobState::Queued), "acme").is_ok());
    }

    #[test]
    fn validate_trigger_rejects_wrong_state() {
        for state in [JobState::Running, JobState::Done, JobState::Error] {
            let err = validate_trigger(&job(state), "Acme").unwrap_err();
            assert_eq!(err.status_code(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn validate_trigger_rejects_other_competitor() {
        let err = validate_trigger(&job(JobState::Queued), "Globex").unwrap_err();

        assert!(matches!(err, TriggerError::CompetitorMismatch));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn parse_job_id_invalid() {
        let err = parse_job_id("not-a-uuid").unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(parse_job_id(&Uuid::new_v4().to_string()).is_ok());
    }

    #[test]
    fn database_errors_hide_details() {
        let err = TriggerError::Database(sqlx::Error::RowNotFound);

        assert_eq!(err.to_string(), "Internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
