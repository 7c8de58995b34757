use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_COMPETITOR_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub competitor: String,
    pub state: JobState,
    pub requested_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Job {
    pub fn is_queued(&self) -> bool {
        self.state == JobState::Queued
    }

    pub fn competitor_matches(&self, competitor: &str) -> bool {
        self.competitor.trim().to_lowercase() == competitor.trim().to_lowercase()
    }
}

/// Trims the competitor name and rejects empty or oversized input.
pub fn parse_competitor(raw: &str) -> Result<String, String> {
    let competitor = raw.trim();

    if competitor.is_empty() {
        return Err("Competitor name must not be empty".to_string());
    }
    if competitor.chars().count() > MAX_COMPETITOR_LEN {
        return Err(format!(
            "Competitor name must be at most {} characters",
            MAX_COMPETITOR_LEN
        ));
    }
    if competitor.chars().any(|c| c.is_control()) {
        return Err("Competitor name contains control characters".to_string());
    }

    Ok(competitor.to_string())
}
