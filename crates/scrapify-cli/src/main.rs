use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use scrapify_core::CompanySelection;
use scrapify_sync::{Resolution, ScrapeConfig, ScrapePipeline, TracingReporter};
use tracing::warn;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "scrapify")]
#[command(about = "Collect job postings from company careers pages into a spreadsheet")]
struct Cli {
    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags that take precedence over `SCRAPIFY_*` environment variables.
#[derive(Debug, Args)]
struct ConfigOverrides {
    #[arg(long, global = true)]
    workbook: Option<PathBuf>,
    #[arg(long, global = true)]
    sheet: Option<String>,
    #[arg(long, global = true)]
    companies_file: Option<PathBuf>,
    #[arg(long, global = true)]
    delay_ms: Option<u64>,
    /// Add a Time column when the workbook is created.
    #[arg(long, global = true)]
    include_time: bool,
}

impl ConfigOverrides {
    fn apply(self, mut config: ScrapeConfig) -> ScrapeConfig {
        if let Some(path) = self.workbook {
            config.workbook_path = path;
        }
        if let Some(sheet) = self.sheet {
            config.sheet_name = sheet;
        }
        if let Some(path) = self.companies_file {
            config.companies_file = path;
        }
        if let Some(delay) = self.delay_ms {
            config.detail_delay_ms = delay;
        }
        if self.include_time {
            config.include_time = true;
        }
        config
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape every registered company, or just one.
    Run {
        #[arg(long)]
        company: Option<String>,
    },
    /// List registered companies and whether they are configured.
    Companies,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.overrides.apply(ScrapeConfig::from_env());
    let pipeline = ScrapePipeline::from_config(&config, Arc::new(TracingReporter)).await?;

    match cli.command.unwrap_or(Commands::Run { company: None }) {
        Commands::Companies => {
            for entry in pipeline.registry().entries() {
                let status = match entry.adapter_name() {
                    Some(adapter) if entry.is_configured() => adapter,
                    _ => "not configured",
                };
                let note = entry
                    .site
                    .as_ref()
                    .and_then(|s| s.note.as_deref())
                    .unwrap_or("");
                println!("{:<20} {:<20} {:<18} {note}", entry.id, entry.display_name, status);
            }
        }
        Commands::Run { company } => {
            let selection = match company {
                Some(id) => {
                    if let Resolution::NotConfigured(name) = pipeline.registry().resolve(&id) {
                        bail!("{name}: not configured");
                    }
                    CompanySelection::Single(id)
                }
                None => CompanySelection::All,
            };

            let cancel = pipeline.cancel_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping after the current company");
                    cancel.store(true, Ordering::SeqCst);
                }
            });

            let result = pipeline.run(&selection).await;
            println!("{}", result.summary_message);
            for err in &result.errors {
                println!("  - {err}");
            }
            if !result.overall_success {
                bail!("run failed: {}", result.summary_message);
            }
        }
    }

    Ok(())
}
