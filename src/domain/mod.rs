pub mod company;
pub mod job;
pub mod lead;
pub mod scraping_result;
pub mod search_result;
pub mod web_domain;
