use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "md-crawler")]
#[command(about = "Crawl a site and write every page's main content as Markdown")]
#[command(version)]
pub struct Args {
    /// URL to start crawling from
    pub url: String,

    /// Output file; `.yaml` is appended when missing
    pub output: String,

    /// Scope glob for links to follow (repeatable). Defaults to everything
    /// below the start URL's directory
    #[arg(long = "pattern")]
    pub patterns: Vec<String>,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Fetch through a WebDriver server (e.g. http://localhost:4444)
    #[arg(long, env = "WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// JSON configuration file; command line flags override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
