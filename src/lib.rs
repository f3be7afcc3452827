//! Crawl a documentation or blog site breadth first and turn every in-scope
//! page into a clean Markdown record.

pub mod cleanup;
pub mod config;
pub mod crawlers;
pub mod error;
pub mod extract;
pub mod filter;
pub mod pages;
pub mod parsers;
pub mod render;
pub mod results;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::CrawlerConfig;
pub use crawlers::fetcher::{FetchedPage, Fetcher};
pub use error::{CrawlError, ExtractionError, FetchError, LinkResolutionError};
pub use pages::Pages;
pub use results::PageRecord;
