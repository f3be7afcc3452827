use crate::error::CrawlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// One successfully processed page. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    url: Url,
    title: String,
    markdown: String,
    html: String,
    at: DateTime<Utc>,
}

impl PageRecord {
    /// Create a record stamped with the current time
    pub fn new(url: Url, title: String, markdown: String, html: String) -> Self {
        Self {
            url,
            title,
            markdown,
            html,
            at: Utc::now(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    /// Raw markup as fetched
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

/// The `{title, content}` shape written by the command line tool.
#[derive(Debug, Serialize)]
struct OutputEntry<'a> {
    title: &'a str,
    content: &'a str,
}

/// Serialize records as a YAML sequence of `{title, content}` maps.
pub fn to_yaml(records: &[PageRecord]) -> Result<String, CrawlError> {
    let entries: Vec<OutputEntry<'_>> = records
        .iter()
        .map(|r| OutputEntry {
            title: r.title(),
            content: r.markdown(),
        })
        .collect();
    Ok(serde_yaml::to_string(&entries)?)
}

pub fn write_yaml<P: AsRef<Path>>(path: P, records: &[PageRecord]) -> Result<(), CrawlError> {
    let yaml = to_yaml(records)?;
    std::fs::write(path, yaml)?;
    Ok(())
}
