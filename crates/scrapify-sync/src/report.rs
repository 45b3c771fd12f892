//! Progress and status reporting for a scrape run.

use scrapify_core::RunResult;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Receives every observable step of a run. Implementations must not block.
pub trait RunReporter: Send + Sync {
    fn progress(&self, percent: u8);
    fn status(&self, message: &str);
    fn log(&self, line: &str);
    /// Called exactly once per run.
    fn finished(&self, result: &RunResult);
}

/// Forwards everything into the `tracing` stream. Used by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl RunReporter for TracingReporter {
    fn progress(&self, percent: u8) {
        debug!(percent, "progress");
    }

    fn status(&self, message: &str) {
        info!(status = message);
    }

    fn log(&self, line: &str) {
        info!("{line}");
    }

    fn finished(&self, result: &RunResult) {
        if result.overall_success {
            info!(errors = result.errors.len(), "{}", result.summary_message);
        } else {
            warn!(errors = result.errors.len(), "{}", result.summary_message);
        }
        for err in &result.errors {
            warn!(error = %err, "run error");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RunEvent {
    Progress(u8),
    Status(String),
    Log(String),
    Finished(RunResult),
}

/// Streams [`RunEvent`]s to an interactive front end running on another task.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: RunEvent) {
        // A closed receiver means nobody is watching; the run carries on.
        let _ = self.tx.send(event);
    }
}

impl RunReporter for ChannelReporter {
    fn progress(&self, percent: u8) {
        self.send(RunEvent::Progress(percent));
    }

    fn status(&self, message: &str) {
        self.send(RunEvent::Status(message.to_string()));
    }

    fn log(&self, line: &str) {
        self.send(RunEvent::Log(line.to_string()));
    }

    fn finished(&self, result: &RunResult) {
        self.send(RunEvent::Finished(result.clone()));
    }
}

const SCRAPE_SHARE: f64 = 80.0;
const LISTING_FETCHED: f64 = 0.15;
const LISTING_PARSED: f64 = 0.25;
const DETAILS: f64 = 0.60;

/// Maps pipeline steps onto 0..=100.
///
/// Each company owns an equal slice of 0..80; inside a slice the listing
/// fetch ends at 15%, listing parse at 25%, and the detail pages share the
/// next 60%. The sink owns 80..100. Values never go backwards.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_companies: usize,
    last: u8,
}

impl ProgressTracker {
    pub fn new(total_companies: usize) -> Self {
        Self {
            total_companies,
            last: 0,
        }
    }

    pub fn current(&self) -> u8 {
        self.last
    }

    fn span(&self) -> f64 {
        if self.total_companies == 0 {
            0.0
        } else {
            SCRAPE_SHARE / self.total_companies as f64
        }
    }

    fn within_company(&mut self, index: usize, fraction: f64) -> u8 {
        let span = self.span();
        self.advance(index as f64 * span + span * fraction)
    }

    pub fn listing_fetched(&mut self, index: usize) -> u8 {
        self.within_company(index, LISTING_FETCHED)
    }

    pub fn listing_parsed(&mut self, index: usize) -> u8 {
        self.within_company(index, LISTING_PARSED)
    }

    pub fn detail_done(&mut self, index: usize, done: usize, total_jobs: usize) -> u8 {
        let share = if total_jobs == 0 {
            DETAILS
        } else {
            DETAILS * done as f64 / total_jobs as f64
        };
        self.within_company(index, LISTING_PARSED + share)
    }

    pub fn company_done(&mut self, index: usize) -> u8 {
        self.within_company(index, 1.0)
    }

    pub fn saving(&mut self) -> u8 {
        self.advance(SCRAPE_SHARE)
    }

    pub fn finish(&mut self) -> u8 {
        self.advance(100.0)
    }

    fn advance(&mut self, value: f64) -> u8 {
        // Absorb float error so 0.55 * 80 lands on 44, not 43.
        let value = (value + 1e-9).floor().clamp(0.0, 100.0) as u8;
        self.last = self.last.max(value);
        self.last
    }
}
