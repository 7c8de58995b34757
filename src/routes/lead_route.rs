use actix_web::{get, web, HttpResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::dal::lead_db;

#[get("/companies/{id}/leads")]
async fn get_company_leads(path: web::Path<i64>, pool: web::Data<PgPool>) -> HttpResponse {
    let company_id = path.into_inner();

    match lead_db::get_leads_for_company(&pool, company_id).await {
        Ok(leads) => HttpResponse::Ok().json(leads),
        Err(e) => {
            log::error!("Failed to load leads of company {}: {:?}", company_id, e);
            HttpResponse::InternalServerError().json(json!({ "error": "Internal server error" }))
        }
    }
}
