pub mod classifier;
pub mod domain_discovery;
pub mod events;
pub mod html_extractor;
pub mod job_runner;
pub mod lead_persistence;
pub mod mention_search;
pub mod page_fetcher;
pub mod robots;
pub mod scrape_orchestrator;

pub use classifier::*;
pub use domain_discovery::*;
pub use events::*;
pub use html_extractor::*;
pub use job_runner::*;
pub use lead_persistence::*;
pub use mention_search::*;
pub use page_fetcher::*;
pub use robots::*;
pub use scrape_orchestrator::*;
