//! Retrieving raw markup for a URL.
//!
//! The crawl only talks to the [`Fetcher`] trait. [`HttpFetcher`] is the
//! default; [`WebDriverFetcher`] asks a running WebDriver server (e.g.
//! ChromeDriver) for the browser's view of the page instead.

use crate::config::CrawlerConfig;
use crate::error::{CrawlError, FetchError};
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use std::time::Duration;
use url::Url;

/// Raw response for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// A missing content type is treated as HTML.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => {
                let mime = ct.split(';').next().unwrap_or_default().trim();
                mime.eq_ignore_ascii_case("text/html")
                    || mime.eq_ignore_ascii_case("application/xhtml+xml")
            }
            None => true,
        }
    }

    /// The body, if this is a successful HTML response.
    pub fn into_html(self, url: &Url) -> Result<String, FetchError> {
        if !self.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: self.status,
            });
        }
        if !self.is_html() {
            return Err(FetchError::NotHtml {
                url: url.to_string(),
                content_type: self.content_type.unwrap_or_default(),
            });
        }
        Ok(self.body)
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`. Non-2xx responses are returned as pages, not errors.
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;

    /// Called once after the crawl loop ends.
    async fn shutdown(&self) {}
}

/// Plain HTTP fetcher identifying itself with a configured User-Agent.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| CrawlError::Fetcher(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self, CrawlError> {
        Self::new(
            &config.user_agent,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        ::log::debug!("GET {}", url);
        let network = |e: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(network)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await.map_err(network)?;

        ::log::debug!("{} answered {} ({} bytes)", url, status, body.len());
        Ok(FetchedPage {
            status,
            content_type,
            body,
        })
    }
}

/// Fetches through a WebDriver session. WebDriver does not expose the HTTP
/// status, so every page that loads is reported as `200 text/html`.
pub struct WebDriverFetcher {
    client: Client,
}

impl WebDriverFetcher {
    pub async fn connect(webdriver_url: &str, user_agent: &str) -> Result<Self, CrawlError> {
        let mut capabilities = serde_json::Map::new();
        capabilities.insert(
            "goog:chromeOptions".to_string(),
            serde_json::json!({
                "args": ["--headless", format!("--user-agent={}", user_agent)]
            }),
        );

        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities);
        match builder.connect(webdriver_url).await {
            Ok(client) => {
                ::log::info!("Connected to WebDriver at {}", webdriver_url);
                Ok(Self { client })
            }
            Err(e) => {
                ::log::error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
                ::log::error!("Make sure a WebDriver server is running at that address");
                Err(CrawlError::Fetcher(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Fetcher for WebDriverFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let webdriver = |e: fantoccini::error::CmdError| {
            if e.to_string().contains("Unable to find session") {
                ::log::warn!("Lost WebDriver session while loading {}", url);
            }
            FetchError::WebDriver {
                url: url.to_string(),
                message: e.to_string(),
            }
        };

        self.client.goto(url.as_str()).await.map_err(webdriver)?;
        let body = self.client.source().await.map_err(webdriver)?;

        Ok(FetchedPage {
            status: 200,
            content_type: Some("text/html".to_string()),
            body,
        })
    }

    async fn shutdown(&self) {
        if let Err(e) = self.client.clone().close().await {
            ::log::warn!("Failed to close WebDriver session: {}", e);
        }
    }
}
