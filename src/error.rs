use thiserror::Error;

/// Reasons a single URL could not be fetched. The crawl skips the URL and moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("{url} is not HTML (content type: {content_type})")]
    NotHtml { url: String, content_type: String },

    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("webdriver error fetching {url}: {message}")]
    WebDriver { url: String, message: String },
}

/// Reasons a fetched page produced no readable content.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("document has no body content")]
    Empty,

    #[error("best content candidate has {found} characters, below the threshold of {threshold}")]
    NotSignificant { found: usize, threshold: usize },
}

/// A single href could not be turned into an absolute URL.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot resolve '{href}' against {base}: {reason}")]
pub struct LinkResolutionError {
    pub href: String,
    pub base: String,
    pub reason: String,
}

/// Fatal errors. These only happen before the crawl starts or while writing output.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid seed URL '{url}': {source}")]
    InvalidSeed {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid scope pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to build fetcher: {0}")]
    Fetcher(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to serialize output: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// The rendered Markdown could not be parsed back into a tree.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot parse markdown: {0}")]
pub struct MarkdownError(pub String);
