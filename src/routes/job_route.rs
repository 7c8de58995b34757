use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{dal::job_db, domain::job::parse_competitor};

#[derive(Deserialize)]
struct CreateJobBody {
    competitor: String,
}

#[post("/jobs")]
async fn create_job(body: web::Json<CreateJobBody>, pool: web::Data<PgPool>) -> HttpResponse {
    let competitor = match parse_competitor(&body.competitor) {
        Ok(c) => c,
        Err(e) => return HttpResponse::BadRequest().json(json!({ "error": e })),
    };

    match job_db::insert_job(&pool, &competitor).await {
        Ok(job) => HttpResponse::Created().json(job),
        Err(e) => {
            log::error!("Failed to insert job for {}: {:?}", competitor, e);
            HttpResponse::InternalServerError().json(json!({ "error": "Internal server error" }))
        }
    }
}

#[get("/jobs/{id}")]
async fn get_job(path: web::Path<Uuid>, pool: web::Data<PgPool>) -> HttpResponse {
    let id = path.into_inner();

    match job_db::get_job(&pool, id).await {
        Ok(Some(job)) => HttpResponse::Ok().json(job),
        Ok(None) => HttpResponse::NotFound().json(json!({ "error": format!("Job {} not found", id) })),
        Err(e) => {
            log::error!("Failed to load job {}: {:?}", id, e);
            HttpResponse::InternalServerError().json(json!({ "error": "Internal server error" }))
        }
    }
}
