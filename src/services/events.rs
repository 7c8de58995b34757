use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Init,
    DomainDiscovery,
    PrivacyCrawl,
    LeadExtraction,
    Storage,
    Complete,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub operation: String,
    pub progress: f64,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(
        phase: ProgressPhase,
        operation: impl Into<String>,
        progress: f64,
        details: serde_json::Value,
    ) -> Self {
        let progress = match progress.is_nan() {
            true => 0.0,
            false => progress.clamp(0.0, 1.0),
        };

        ProgressEvent {
            phase,
            operation: operation.into(),
            progress,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// Receives the domain events of one scrape run.
pub trait ScrapeEventSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

pub struct NullSink;

impl ScrapeEventSink for NullSink {
    fn publish(&self, _event: ProgressEvent) {}
}

struct JobChannel {
    sender: broadcast::Sender<ProgressEvent>,
    latest: Option<ProgressEvent>,
}

/// Fan-out of progress events keyed by job id.
#[derive(Default)]
pub struct ProgressHub {
    jobs: Mutex<HashMap<Uuid, JobChannel>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        ProgressHub::default()
    }

    /// Creates the job's channel. Only a running job has one.
    pub fn open(&self, job_id: Uuid) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.entry(job_id).or_insert_with(|| JobChannel {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
            latest: None,
        });
    }

    /// Most recent event plus a receiver for what follows, or `None` when the
    /// job has no open channel.
    pub fn subscribe(
        &self,
        job_id: Uuid,
    ) -> Option<(Option<ProgressEvent>, broadcast::Receiver<ProgressEvent>)> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.get(&job_id)
            .map(|channel| (channel.latest.clone(), channel.sender.subscribe()))
    }

    pub fn publish(&self, job_id: Uuid, event: ProgressEvent) {
        log::info!(
            "Job {} | {:?} | {} | {:.0}% | {}",
            job_id,
            event.phase,
            event.operation,
            event.progress * 100.0,
            event.details
        );

        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let Some(channel) = jobs.get_mut(&job_id) else {
            log::debug!("Job {} has no open progress channel", job_id);
            return;
        };
        channel.latest = Some(event.clone());
        // No subscribers is fine.
        _ = channel.sender.send(event);
    }

    /// Drops the job's channel so open streams terminate.
    pub fn close(&self, job_id: Uuid) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.remove(&job_id);
    }

    pub fn sink(self: &Arc<Self>, job_id: Uuid) -> JobProgressSink {
        JobProgressSink {
            hub: self.clone(),
            job_id,
        }
    }
}

pub struct JobProgressSink {
    hub: Arc<ProgressHub>,
    job_id: Uuid,
}

impl ScrapeEventSink for JobProgressSink {
    fn publish(&self, event: ProgressEvent) {
        self.hub.publish(self.job_id, event);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn progress_is_clamped() {
        let event = ProgressEvent::new(ProgressPhase::Init, "start", 1.7, json!({}));
        assert_eq!(event.progress, 1.0);

        let event = ProgressEvent::new(ProgressPhase::Init, "start", f64::NAN, json!({}));
        assert_eq!(event.progress, 0.0);
    }

    #[test]
    fn phases_are_ordered() {
        assert!(ProgressPhase::Init < ProgressPhase::DomainDiscovery);
        assert!(ProgressPhase::DomainDiscovery < ProgressPhase::PrivacyCrawl);
        assert!(ProgressPhase::PrivacyCrawl < ProgressPhase::LeadExtraction);
        assert!(ProgressPhase::LeadExtraction < ProgressPhase::Storage);
        assert!(ProgressPhase::Storage < ProgressPhase::Complete);
        assert_eq!(
            serde_json::to_value(ProgressPhase::DomainDiscovery).unwrap(),
            json!("domain_discovery")
        );
    }

    #[tokio::test]
    async fn hub_delivers_to_subscribers() {
        let hub = Arc::new(ProgressHub::new());
        let job_id = Uuid::new_v4();
        hub.open(job_id);
        let (latest, mut receiver) = hub.subscribe(job_id).unwrap();
        assert!(latest.is_none());

        hub.sink(job_id).publish(ProgressEvent::new(
            ProgressPhase::LeadExtraction,
            "fetching page",
            0.5,
            json!({"url": "https://mueller-bau.de"}),
        ));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.phase, ProgressPhase::LeadExtraction);
        assert_eq!(event.operation, "fetching page");

        let (latest, _) = hub.subscribe(job_id).unwrap();
        assert_eq!(latest.unwrap().progress, 0.5);

        hub.close(job_id);
        assert!(receiver.recv().await.is_err());
    }

    #[test]
    fn closed_or_unknown_jobs_leave_no_channel_behind() {
        let hub = ProgressHub::new();
        let job_id = Uuid::new_v4();

        assert!(hub.subscribe(job_id).is_none());

        hub.open(job_id);
        hub.publish(
            job_id,
            ProgressEvent::new(ProgressPhase::Complete, "done", 1.0, json!({})),
        );
        hub.close(job_id);

        assert!(hub.subscribe(job_id).is_none());
        hub.publish(
            job_id,
            ProgressEvent::new(ProgressPhase::Complete, "done", 1.0, json!({})),
        );
        assert!(hub.subscribe(job_id).is_none());
        assert!(hub.jobs.lock().unwrap().is_empty());
    }
}
