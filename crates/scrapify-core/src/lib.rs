//! Core domain model for Scrapify: site configs, postings, persisted records, run outcomes.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use url::Url;

pub const CRATE_NAME: &str = "scrapify-core";

/// Desktop browser identity sent when a site config declares no headers of its own.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Static per-site configuration, constructed once per run and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl SiteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Fills in the default `User-Agent` when no headers were configured.
    pub fn with_default_headers(mut self, user_agent: &str) -> Self {
        if self.headers.is_empty() {
            self.headers
                .insert("User-Agent".to_string(), user_agent.to_string());
        }
        self
    }

    /// Scheme, host and port of the listing URL, without a trailing slash.
    pub fn origin(&self) -> String {
        match Url::parse(&self.url) {
            Ok(url) if url.has_host() => url.origin().ascii_serialization(),
            _ => self.url.trim_end_matches('/').to_string(),
        }
    }
}

/// One `(title, url)` pair discovered on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    pub title: String,
    pub url: String,
}

impl JobListing {
    pub fn new(title: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            title: collapse_whitespace(title.as_ref()),
            url: url.into(),
        }
    }
}

/// A discovered posting while the pipeline works on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub company: String,
    pub title: String,
    pub detail_url: String,
    pub description: String,
}

/// The unit persisted to the workbook. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRecord {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub company: String,
    pub title: String,
    pub description: String,
}

impl ScrapeRecord {
    /// Builds a record from a finished posting. Returns `None` when the
    /// description is blank, since blank descriptions are never stored.
    pub fn from_posting(
        posting: &JobPosting,
        date: NaiveDate,
        time: Option<NaiveTime>,
    ) -> Option<Self> {
        let description = posting.description.trim();
        if description.is_empty() {
            return None;
        }
        Some(Self {
            date,
            time,
            company: posting.company.clone(),
            title: posting.title.clone(),
            description: description.to_string(),
        })
    }

    pub fn date_cell(&self) -> String {
        self.date.format("%m/%d/%Y").to_string()
    }

    pub fn time_cell(&self) -> String {
        self.time
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default()
    }
}

/// Which companies a run should cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanySelection {
    All,
    Single(String),
}

/// Terminal outcome of a run, handed to the reporting boundary exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub overall_success: bool,
    pub summary_message: String,
    pub errors: Vec<String>,
}

impl RunResult {
    pub fn completed(summary_message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            overall_success: true,
            summary_message: summary_message.into(),
            errors,
        }
    }

    pub fn aborted(summary_message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            overall_success: false,
            summary_message: summary_message.into(),
            errors,
        }
    }
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Anchors a site-relative href at `origin`. Absolute hrefs pass through.
///
/// `./x` and `/x` both land at `{origin}/x`, a bare `x` becomes `{origin}/x`,
/// and protocol-relative `//host/x` is given an https scheme.
pub fn resolve_href(origin: &str, href: &str) -> String {
    let href = href.trim();
    let origin = origin.trim_end_matches('/');
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if let Some(rest) = href.strip_prefix("./") {
        return format!("{origin}/{rest}");
    }
    if href.starts_with('/') {
        return format!("{origin}{href}");
    }
    format!("{origin}/{href}")
}

/// True when `text` holds characters that XML-based spreadsheets reject.
pub fn has_unstorable_chars(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\t' | '\r'))
}

/// Drops control characters other than line breaks and tabs.
pub fn strip_non_printable(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect()
}
