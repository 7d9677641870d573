pub mod error;
pub mod pool;
pub mod rate_limiter;

pub use error::{BrowserPoolError, Result};
pub use pool::{BrowserPool, PooledPage};
pub use rate_limiter::RateLimiter;
