use actix_web::{get, web, HttpResponse};
use futures::{stream, StreamExt};
use serde_json::json;
use sqlx::PgPool;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{
    dal::job_db,
    domain::job::{Job, JobState},
    services::{ProgressEvent, ProgressHub, ProgressPhase},
};

pub fn sse_frame(event: &ProgressEvent) -> Result<web::Bytes, actix_web::Error> {
    let data = serde_json::to_string(event).map_err(actix_web::error::ErrorInternalServerError)?;
    Ok(web::Bytes::from(format!("event: progress\ndata: {}\n\n", data)))
}

/// Snapshot for a job without a live channel: `complete` once it has
/// finished, otherwise an `init` event carrying its state.
pub fn job_status_event(job: &Job) -> ProgressEvent {
    match job.state {
        JobState::Done | JobState::Error => ProgressEvent::new(
            ProgressPhase::Complete,
            "finished",
            1.0,
            json!({ "state": job.state, "errorMessage": job.error_message }),
        ),
        JobState::Queued | JobState::Running => ProgressEvent::new(
            ProgressPhase::Init,
            "waiting",
            0.0,
            json!({ "state": job.state }),
        ),
    }
}

fn event_stream_response() -> actix_web::HttpResponseBuilder {
    let mut builder = HttpResponse::Ok();
    builder
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"));
    builder
}

async fn load_job(pool: &PgPool, job_id: Uuid) -> Result<Job, HttpResponse> {
    match job_db::get_job(pool, job_id).await {
        Ok(Some(job)) => Ok(job),
        Ok(None) => Err(HttpResponse::NotFound()
            .json(json!({ "error": format!("Job {} not found", job_id) }))),
        Err(e) => {
            log::error!("Failed to load job {}: {:?}", job_id, e);
            Err(HttpResponse::InternalServerError()
                .json(json!({ "error": "Internal server error" })))
        }
    }
}

#[get("/jobs/{id}/progress")]
async fn job_progress(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
    hub: web::Data<ProgressHub>,
) -> HttpResponse {
    let job_id = path.into_inner();

    let job = match load_job(&pool, job_id).await {
        Ok(job) => job,
        Err(response) => return response,
    };

    let subscription = match job.state {
        JobState::Running => hub.subscribe(job_id),
        _ => None,
    };

    let Some((latest, receiver)) = subscription else {
        // The run may have closed its channel after the first read.
        let job = match job.state {
            JobState::Running => match load_job(&pool, job_id).await {
                Ok(job) => job,
                Err(response) => return response,
            },
            _ => job,
        };
        let event = job_status_event(&job);
        return event_stream_response().streaming(stream::once(async move { sse_frame(&event) }));
    };

    let updates = BroadcastStream::new(receiver).filter_map(|item| async move { item.ok() });
    let body = stream::iter(latest)
        .chain(updates)
        .map(|event| sse_frame(&event));

    event_stream_response().streaming(body)
}
