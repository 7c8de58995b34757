pub mod company_db;
pub mod job_db;
pub mod lead_db;
