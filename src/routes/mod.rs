pub mod default_route;
pub mod job_route;
pub mod lead_route;
pub mod progress_route;
pub mod scrape_route;
