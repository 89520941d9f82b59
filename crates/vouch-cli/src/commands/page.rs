//! Page command - fetch one page of vouchers over HTTP.

use std::time::Duration;

use clap::Args;
use console::style;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use vouch_core::models::config::SourceConfig;
use vouch_core::{DocumentSource, QueryWindow, SourceRequest, TransportError, VoucherService};

use super::load_config;
use super::output::{format_summary, format_vouchers, OutputFormat};

/// Arguments for the page command.
#[derive(Args)]
pub struct PageArgs {
    /// Start date (YYYYMMDD or YYYY-MM-DD)
    #[arg(long)]
    from: String,

    /// End date (YYYYMMDD or YYYY-MM-DD)
    #[arg(long)]
    to: String,

    /// Company name as known to the accounting system
    #[arg(long)]
    company: String,

    /// Page number, starting at 1
    #[arg(short, long, default_value_t = 1)]
    page: u32,

    /// Page size (default from config)
    #[arg(long)]
    page_size: Option<usize>,

    /// Free-text search filter
    #[arg(long, default_value = "")]
    filter: String,

    /// Source endpoint (default from config)
    #[arg(long)]
    url: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Print totals for the fetched page
    #[arg(long)]
    summary: bool,
}

/// Accounting system reached over its HTTP XML interface.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn classify(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            TransportError::Unreachable(e.to_string())
        } else {
            TransportError::Rejected(e.to_string())
        }
    }
}

impl DocumentSource for HttpSource {
    async fn fetch_raw(&self, request: &SourceRequest) -> Result<String, TransportError> {
        let body = request
            .to_xml()
            .map_err(|e| TransportError::Rejected(e.to_string()))?;
        debug!("POST {} (page {})", self.url, request.page);

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        response.text().await.map_err(|e| self.classify(e))
    }
}

pub async fn run(args: PageArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(url) = args.url {
        config.source.url = url;
    }
    // A one-shot command exits before background fetches could land.
    config.prefetch.enabled = false;

    let page_size = args.page_size.unwrap_or(config.extraction.page_size);
    let window = QueryWindow::new(&args.from, &args.to, &args.company, page_size)?
        .with_filter(&args.filter);

    let service = VoucherService::new(HttpSource::new(&config.source)?, &config);
    let result = service.get_page(&window, args.page).await?;

    println!("{}", format_vouchers(&result.vouchers, args.format)?);

    eprintln!(
        "{} Page {} of {} ({} vouchers{})",
        style("ℹ").blue(),
        result.page,
        window.total_pages(result.total_count).max(1),
        result.total_count,
        if result.has_more { ", more available" } else { "" }
    );

    if args.summary {
        eprint!("{}", format_summary(&service.summary(&window)));
    }

    Ok(())
}
