use crate::config::CrawlerConfig;
use crate::crawlers::fetcher::{Fetcher, HttpFetcher, WebDriverFetcher};
use crate::crawlers::web::{self, CrawlSettings, Frontier};
use crate::error::CrawlError;
use crate::extract::ExtractOptions;
use crate::filter::UrlFilter;
use crate::render::RenderOptions;
use crate::results::PageRecord;
use crate::utils::default_scope_pattern;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// Builder for configuring and running a crawl.
pub struct Pages {
    config: CrawlerConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    render: RenderOptions,
}

impl Pages {
    /// Create a new builder crawling from `start_url`
    pub fn new(start_url: &str) -> Self {
        Self {
            config: CrawlerConfig::new(start_url),
            fetcher: None,
            render: RenderOptions::default(),
        }
    }

    /// Replace the whole configuration, start URL included
    pub fn with_config(mut self, config: CrawlerConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a JSON file
    pub fn with_config_file<P: AsRef<Path>>(self, path: P) -> Result<Self, CrawlError> {
        let config = CrawlerConfig::from_file(path)?;
        Ok(self.with_config(config))
    }

    /// Apply configuration from a JSON string
    pub fn with_config_str(self, json: &str) -> Result<Self, CrawlError> {
        let config = CrawlerConfig::from_json(json)?;
        Ok(self.with_config(config))
    }

    /// Glob patterns bounding the crawl. Without any, the scope is everything
    /// below the start URL's directory.
    pub fn with_scope_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.scope_patterns = patterns;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = Some(max_pages);
        self
    }

    pub fn with_webdriver_url(mut self, webdriver_url: &str) -> Self {
        self.config.webdriver_url = Some(webdriver_url.to_string());
        self
    }

    /// Use a caller supplied fetcher instead of building one from the config
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Scope patterns the crawl will use, defaults applied.
    pub fn scope_patterns(&self) -> Vec<String> {
        if self.config.scope_patterns.is_empty() {
            vec![default_scope_pattern(&self.config.start_url)]
        } else {
            self.config.scope_patterns.clone()
        }
    }

    /// Start the crawl and get a receiver yielding records in BFS order.
    ///
    /// Seed and patterns are validated before anything is fetched.
    pub async fn generate(self) -> Result<mpsc::Receiver<PageRecord>, CrawlError> {
        let seed = Url::parse(&self.config.start_url).map_err(|source| {
            CrawlError::InvalidSeed {
                url: self.config.start_url.clone(),
                source,
            }
        })?;
        let patterns = self.scope_patterns();
        let filter = UrlFilter::new(&seed, &patterns)?;
        ::log::info!("Crawling from {} within {}", seed, patterns.join(", "));

        let settings = CrawlSettings {
            max_pages: self.config.max_pages,
            extract: ExtractOptions {
                char_threshold: self.config.char_threshold,
            },
            render: self.render,
        };

        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => match &self.config.webdriver_url {
                Some(webdriver_url) => Arc::new(
                    WebDriverFetcher::connect(webdriver_url, &self.config.user_agent).await?,
                ),
                None => Arc::new(HttpFetcher::from_config(&self.config)?),
            },
        };

        Ok(web::start(fetcher, Frontier::new(seed, filter), settings))
    }

    /// Run the crawl to completion and collect every record.
    pub async fn collect(self) -> Result<Vec<PageRecord>, CrawlError> {
        let mut rx = self.generate().await?;
        let mut records = Vec::new();
        while let Some(record) = rx.recv().await {
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawlers::fetcher::FetchedPage;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use httpmock::{Method::GET, MockServer};

    /// Serves the same page for every URL.
    struct StaticFetcher(String);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, _url: &Url) -> Result<FetchedPage, FetchError> {
            Ok(FetchedPage {
                status: 200,
                content_type: None,
                body: self.0.clone(),
            })
        }
    }

    const PARAGRAPH: &str = "Every page in this small test site carries enough prose for the \
        extractor to consider it significant content worth keeping in the output.";

    fn page(title: &str, links: &[&str]) -> String {
        let anchors: String = links
            .iter()
            .map(|l| format!("<a href=\"{l}\">{l}</a> "))
            .collect();
        format!(
            "<html><head><title>{title}</title></head><body>\
             <nav>{anchors}</nav><main><h1>{title}</h1><p>{PARAGRAPH}</p></main>\
             </body></html>"
        )
    }

    #[test]
    fn test_default_scope_pattern_applied() {
        let pages = Pages::new("https://site.com/docs/intro");
        assert_eq!(pages.scope_patterns(), vec!["https://site.com/docs/**/*"]);

        let pages = pages.with_scope_patterns(vec!["https://site.com/**".to_string()]);
        assert_eq!(pages.scope_patterns(), vec!["https://site.com/**"]);
    }

    #[test]
    fn test_config_str_replaces_config() {
        let pages = Pages::new("https://ignored.com/")
            .with_config_str(r#"{"start_url": "https://site.com/", "max_pages": 4}"#)
            .unwrap()
            .with_webdriver_url("http://localhost:4444");
        assert_eq!(pages.config().start_url, "https://site.com/");
        assert_eq!(pages.config().max_pages, Some(4));
        assert_eq!(
            pages.config().webdriver_url.as_deref(),
            Some("http://localhost:4444")
        );
    }

    #[test]
    fn test_config_file() {
        let path = std::env::temp_dir().join("md_crawler_pages_config_test.json");
        std::fs::write(
            &path,
            r#"{"start_url": "https://site.com/", "scope_patterns": ["https://site.com/*"]}"#,
        )
        .unwrap();
        let pages = Pages::new("https://ignored.com/")
            .with_config_file(&path)
            .unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(pages.scope_patterns(), vec!["https://site.com/*"]);
    }

    #[tokio::test]
    async fn test_cleanup_normalizes_custom_bullets() {
        let body = format!(
            "<html><head><title>List</title></head><body><main><h1>List</h1>\
             <p>{PARAGRAPH}</p><ul><li>one</li><li>two</li></ul></main></body></html>"
        );
        let records = Pages::new("https://site.com/docs/")
            .with_fetcher(Arc::new(StaticFetcher(body)))
            .with_render_options(RenderOptions {
                bullet_marker: '*',
                ..RenderOptions::default()
            })
            .collect()
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert!(records[0].markdown().contains("- one\n- two"));
    }

    #[tokio::test]
    async fn test_invalid_seed_is_rejected() {
        let err = Pages::new("not a url").collect().await.unwrap_err();
        assert!(matches!(err, CrawlError::InvalidSeed { .. }));
    }

    #[tokio::test]
    async fn test_collect_over_http() {
        let server = MockServer::start_async().await;
        let docs = server
            .mock_async(|when, then| {
                when.method(GET).path("/docs/");
                then.status(200)
                    .header("content-type", "text/html")
                    .body(page("Docs", &["guide", "/blog/post"]));
            })
            .await;
        let guide = server
            .mock_async(|when, then| {
                when.method(GET).path("/docs/guide");
                then.status(200)
                    .header("content-type", "text/html")
                    .body(page("Guide", &["../docs/"]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/blog/post");
                then.status(200).body(page("Blog", &[]));
            })
            .await;

        let records = Pages::new(&server.url("/docs/")).collect().await.unwrap();

        docs.assert_async().await;
        guide.assert_async().await;
        let titles: Vec<&str> = records.iter().map(|r| r.title()).collect();
        assert_eq!(titles, vec!["Docs", "Guide"]);
        assert!(records[0].markdown().starts_with("# Docs\n\n"));
    }

    #[tokio::test]
    async fn test_max_pages_from_builder() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(200)
                    .header("content-type", "text/html")
                    .body(page("Home", &["a", "b"]));
            })
            .await;
        for path in ["/a", "/b"] {
            server
                .mock_async(|when, then| {
                    when.method(GET).path(path);
                    then.status(200)
                        .header("content-type", "text/html")
                        .body(page(path, &[]));
                })
                .await;
        }

        let records = Pages::new(&server.url("/"))
            .with_max_pages(2)
            .collect()
            .await
            .unwrap();

        let titles: Vec<&str> = records.iter().map(|r| r.title()).collect();
        assert_eq!(titles, vec!["Home", "/a"]);
    }
}
