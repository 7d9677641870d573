pub mod instagram;
pub mod logs;
pub mod match_job;
pub mod queue;
pub mod scrape;
