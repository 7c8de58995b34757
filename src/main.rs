use std::{net::TcpListener, sync::Arc, time::Duration};

use env_logger::Env;
use leadscout::{
    configuration::get_configuration,
    services::{ProgressHub, ScrapeOrchestrator},
    startup::run,
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().map_err(std::io::Error::other)?;

    let pool_options = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(15 * 60)) // 15 minutes
        .max_lifetime(None);

    let connection_pool = pool_options.connect_lazy_with(configuration.database.with_db());
    if let Err(e) = sqlx::migrate!("./migrations").run(&connection_pool).await {
        log::error!("Failed to run migrations: {:?}", e);
        return Err(std::io::Error::other(e));
    }

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(address)?;

    let orchestrator =
        ScrapeOrchestrator::from_settings(&configuration.scraper, configuration.discovery.clone())
            .map_err(std::io::Error::other)?;
    let hub = Arc::new(ProgressHub::new());

    log::info!(
        "Listening on {}:{}",
        configuration.application.host,
        configuration.application.port
    );

    run(
        listener,
        connection_pool,
        orchestrator,
        hub,
        configuration.scraper,
    )?
    .await
}
