use clap::Parser;
use md_crawler::error::CrawlError;
use md_crawler::{Pages, results, utils};
use std::process::ExitCode;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ::log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), CrawlError> {
    ::log::info!("Starting crawler for URL: {}", args.url);

    let mut pages = Pages::new(&args.url);
    if let Some(path) = &args.config {
        let mut config = md_crawler::CrawlerConfig::from_file(path)?;
        config.start_url = args.url.clone();
        pages = pages.with_config(config);
    }
    if !args.patterns.is_empty() {
        pages = pages.with_scope_patterns(args.patterns.clone());
    }
    if let Some(max_pages) = args.max_pages {
        pages = pages.with_max_pages(max_pages);
    }
    if let Some(webdriver_url) = &args.webdriver_url {
        pages = pages.with_webdriver_url(webdriver_url);
    }

    let start_time = std::time::Instant::now();
    let mut rx = pages.generate().await?;

    let mut records = Vec::new();
    while let Some(record) = rx.recv().await {
        ::log::info!("Processed page {}: {}", records.len() + 1, record.url());
        records.push(record);
    }

    let output = utils::yaml_output_path(&args.output);
    results::write_yaml(&output, &records)?;

    ::log::info!(
        "Crawling complete - wrote {} pages to {} in {:.2} seconds",
        records.len(),
        output,
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
