//! Scrape run orchestration: company registry, fetch/parse pipeline and reporting.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use scrapify_core::{CompanySelection, RunResult, DEFAULT_USER_AGENT};
use scrapify_storage::{BackoffPolicy, HttpClientConfig, HttpFetcher, SheetLayout, XlsxSink};
use tracing::info;

pub mod pipeline;
pub mod registry;
pub mod report;

pub use pipeline::{PipelineOptions, ScrapeError, ScrapePipeline, NO_RECORDS_MESSAGE};
pub use registry::{CompaniesFile, CompanyEntry, CompanyOverride, ConfiguredCompany, Registry, Resolution};
pub use report::{ChannelReporter, ProgressTracker, RunEvent, RunReporter, TracingReporter};

pub const CRATE_NAME: &str = "scrapify-sync";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfig {
    pub workbook_path: PathBuf,
    pub sheet_name: String,
    pub companies_file: PathBuf,
    pub user_agent: String,
    pub listing_timeout_secs: u64,
    pub detail_timeout_secs: u64,
    pub detail_delay_ms: u64,
    /// Whether a newly created sheet gets a `Time` column.
    pub include_time: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            workbook_path: PathBuf::from("Scrapify.xlsx"),
            sheet_name: "Sheet1".to_string(),
            companies_file: PathBuf::from("companies.yaml"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            listing_timeout_secs: 20,
            detail_timeout_secs: 15,
            detail_delay_ms: 500,
            include_time: false,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True" | "yes"))
}

fn env_number(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl ScrapeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workbook_path: std::env::var("SCRAPIFY_WORKBOOK")
                .map(PathBuf::from)
                .unwrap_or(defaults.workbook_path),
            sheet_name: std::env::var("SCRAPIFY_SHEET").unwrap_or(defaults.sheet_name),
            companies_file: std::env::var("SCRAPIFY_COMPANIES_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.companies_file),
            user_agent: std::env::var("SCRAPIFY_USER_AGENT").unwrap_or(defaults.user_agent),
            listing_timeout_secs: env_number("SCRAPIFY_LISTING_TIMEOUT_SECS")
                .unwrap_or(defaults.listing_timeout_secs),
            detail_timeout_secs: env_number("SCRAPIFY_DETAIL_TIMEOUT_SECS")
                .unwrap_or(defaults.detail_timeout_secs),
            detail_delay_ms: env_number("SCRAPIFY_DETAIL_DELAY_MS")
                .unwrap_or(defaults.detail_delay_ms),
            include_time: env_flag("SCRAPIFY_INCLUDE_TIME").unwrap_or(defaults.include_time),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            listing_timeout: Duration::from_secs(self.listing_timeout_secs),
            detail_timeout: Duration::from_secs(self.detail_timeout_secs),
            detail_delay: Duration::from_millis(self.detail_delay_ms),
        }
    }

    pub fn sink(&self) -> XlsxSink {
        let layout = if self.include_time {
            SheetLayout::WithTime
        } else {
            SheetLayout::WithoutTime
        };
        XlsxSink::new(&self.workbook_path)
            .with_sheet_name(self.sheet_name.clone())
            .with_new_layout(layout)
    }
}

impl ScrapePipeline {
    /// Registry from the overlay file, reqwest fetcher and xlsx sink, all
    /// driven by `config`.
    pub async fn from_config(config: &ScrapeConfig, reporter: Arc<dyn RunReporter>) -> Result<Self> {
        let registry = Registry::load(&config.companies_file, &config.user_agent).await?;
        let fetcher = HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(config.listing_timeout_secs.max(config.detail_timeout_secs)),
            user_agent: Some(config.user_agent.clone()),
            backoff: BackoffPolicy::default(),
        })?;
        info!(
            workbook = %config.workbook_path.display(),
            companies = registry.entries().len(),
            "pipeline configured"
        );
        Ok(Self::new(registry, Arc::new(fetcher), Arc::new(config.sink()), reporter)
            .with_options(config.pipeline_options()))
    }
}

pub async fn run_once_from_env(selection: &CompanySelection) -> Result<RunResult> {
    let config = ScrapeConfig::from_env();
    let pipeline = ScrapePipeline::from_config(&config, Arc::new(TracingReporter)).await?;
    Ok(pipeline.run(selection).await)
}
