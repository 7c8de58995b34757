use std::{net::TcpListener, sync::Arc};

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;

use crate::{
    configuration::ScraperSettings,
    routes::{default_route, job_route, lead_route, progress_route, scrape_route},
    services::{ProgressHub, ScrapeOrchestrator},
};

pub fn run(
    listener: TcpListener,
    db_pool: PgPool,
    orchestrator: ScrapeOrchestrator,
    hub: Arc<ProgressHub>,
    scraper_settings: ScraperSettings,
) -> Result<Server, std::io::Error> {
    let db_pool = web::Data::new(db_pool);
    let orchestrator = web::Data::new(orchestrator);
    let hub = web::Data::from(hub);
    let scraper_settings = web::Data::new(scraper_settings);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::health)
            .service(
                web::scope("/api")
                    .service(job_route::create_job)
                    .service(progress_route::job_progress)
                    .service(job_route::get_job)
                    .service(scrape_route::trigger_scrape)
                    .service(lead_route::get_company_leads),
            )
            .app_data(db_pool.clone())
            .app_data(orchestrator.clone())
            .app_data(hub.clone())
            .app_data(scraper_settings.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
