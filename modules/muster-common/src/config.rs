use std::env;

/// Application configuration loaded from environment variables (spec §6).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,

    pub headless: bool,
    pub browser_pool_size: usize,
    pub browserless_url: String,
    pub browserless_token: Option<String>,

    pub scrape_concurrency: usize,
    pub match_concurrency: usize,
    pub instagram_concurrency: usize,

    pub run_heartbeat_timeout_seconds: u64,
    pub dispatch_interval_seconds: u64,
    /// How long a source can go unscraped before the Dispatcher considers
    /// it due for refresh (spec §4.10).
    pub source_refresh_interval_seconds: u64,

    pub log_level: String,

    pub job_api_bind: String,
}

impl Config {
    /// Load configuration for `muster-worker` / `muster-api`. Panics with a
    /// clear message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            redis_url: required_env("REDIS_URL"),
            headless: env_bool("HEADLESS", true),
            browser_pool_size: env_parse("BROWSER_POOL_SIZE", 3),
            browserless_url: env::var("BROWSERLESS_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            browserless_token: env::var("BROWSERLESS_TOKEN").ok(),
            scrape_concurrency: env_parse("SCRAPE_CONCURRENCY", 2),
            match_concurrency: env_parse("MATCH_CONCURRENCY", 1),
            instagram_concurrency: env_parse("INSTAGRAM_CONCURRENCY", 1),
            run_heartbeat_timeout_seconds: env_parse("RUN_HEARTBEAT_TIMEOUT_SECONDS", 600),
            dispatch_interval_seconds: env_parse("DISPATCH_INTERVAL_SECONDS", 60),
            source_refresh_interval_seconds: env_parse("SCRAPE_REFRESH_INTERVAL_SECONDS", 6 * 60 * 60),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            job_api_bind: env::var("JOB_API_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }

    /// Log the shape (not the value) of sensitive config, for startup
    /// diagnostics without leaking credentials into process logs.
    pub fn log_redacted(&self) {
        let vars = [
            ("DATABASE_URL", &self.database_url),
            ("REDIS_URL", &self.redis_url),
        ];
        for (name, value) in vars {
            tracing::info!("{name} = ({} chars)", value.len());
        }
        tracing::info!(
            browser_pool_size = self.browser_pool_size,
            scrape_concurrency = self.scrape_concurrency,
            match_concurrency = self.match_concurrency,
            instagram_concurrency = self.instagram_concurrency,
            "loaded config"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_missing_or_bad_value() {
        assert_eq!(env_parse::<usize>("MUSTER_TEST_DOES_NOT_EXIST", 3), 3);
    }

    #[test]
    fn env_bool_defaults() {
        assert!(env_bool("MUSTER_TEST_DOES_NOT_EXIST_BOOL", true));
    }
}
