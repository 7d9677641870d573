pub mod payload;
pub mod pool;

pub use pool::{run_match_worker, run_scrape_like_worker};
