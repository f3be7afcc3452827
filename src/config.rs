use crate::error::CrawlError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Crawl settings, usually loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// URL to start crawling from
    pub start_url: String,

    /// Glob patterns bounding which links are followed.
    /// Empty means the default scope derived from `start_url`.
    #[serde(default)]
    pub scope_patterns: Vec<String>,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Stop after this many records
    #[serde(default)]
    pub max_pages: Option<usize>,

    /// Per-request timeout for the HTTP fetcher
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Fetch through a WebDriver server instead of plain HTTP
    #[serde(default)]
    pub webdriver_url: Option<String>,

    /// Minimum readable characters for a page to produce a record
    #[serde(default = "default_char_threshold")]
    pub char_threshold: usize,
}

impl CrawlerConfig {
    pub fn new(start_url: &str) -> Self {
        Self {
            start_url: start_url.to_string(),
            scope_patterns: Vec::new(),
            user_agent: default_user_agent(),
            max_pages: None,
            request_timeout_secs: default_request_timeout_secs(),
            webdriver_url: None,
            char_threshold: default_char_threshold(),
        }
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CrawlError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, CrawlError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }
}

/// Desktop Chrome user agent; some documentation hosts refuse unknown clients.
pub fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_char_threshold() -> usize {
    100
}
