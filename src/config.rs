// Application configuration: where the backend lives and how pages are sized.

use std::env;
use std::time::Duration;

/// Default backend address for local development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Page size used for message history fetches.
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server root, without the API prefix.
    pub base_url: String,
    pub page_size: usize,
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    /// Defaults, with `PARLEY_BASE_URL` taken from the environment when set.
    pub fn from_env() -> Self {
        let mut config = AppConfig::default();
        if let Ok(url) = env::var("PARLEY_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        config
    }

    /// All API routes hang off the `/api` prefix.
    pub fn api_url(&self) -> String {
        format!("{}/api", self.base_url)
    }
}
