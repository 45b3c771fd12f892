//! Careers pages without a per-posting container: scan every link and keep the
//! ones whose href looks like a job page.

use std::collections::HashSet;

use async_trait::async_trait;
use scraper::Html;
use scrapify_core::{resolve_href, JobListing, SiteConfig};

use crate::{
    inline_text, selector, AdapterError, DescriptionChain, PageFallback, SiteAdapter,
    TextHeuristics,
};

/// Which field makes two scanned links "the same posting".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupeKey {
    Url,
    Title,
}

#[derive(Debug, Clone, Copy)]
pub struct AnchorRules {
    /// The lower-cased href must contain one of these.
    pub href_any: &'static [&'static str],
    /// When non-empty, the lower-cased href must also contain one of these.
    pub href_also_any: &'static [&'static str],
    /// Titles this short or shorter are navigation, not postings.
    pub min_title_chars: usize,
    /// Lower-cased titles containing any of these are skipped.
    pub skip_titles: &'static [&'static str],
    pub dedupe: DedupeKey,
}

impl AnchorRules {
    fn href_matches(&self, href: &str) -> bool {
        let lower = href.to_lowercase();
        self.href_any.iter().any(|k| lower.contains(k))
            && (self.href_also_any.is_empty() || self.href_also_any.iter().any(|k| lower.contains(k)))
    }

    fn title_matches(&self, title: &str) -> bool {
        if title.chars().count() <= self.min_title_chars {
            return false;
        }
        let lower = title.to_lowercase();
        !self.skip_titles.iter().any(|s| lower.contains(s))
    }

    /// Scans `a[href]` in document order, deduplicating within this one page.
    pub fn scan(&self, document: &Html, origin: &str) -> Result<Vec<JobListing>, AdapterError> {
        let link_sel = selector("a[href]")?;
        let mut seen = HashSet::new();
        let mut jobs = Vec::new();

        for link in document.select(&link_sel) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if !self.href_matches(href) {
                continue;
            }
            let title = inline_text(link);
            if !self.title_matches(&title) {
                continue;
            }
            let listing = JobListing::new(title, resolve_href(origin, href));
            let key = match self.dedupe {
                DedupeKey::Url => listing.url.clone(),
                DedupeKey::Title => listing.title.clone(),
            };
            if seen.insert(key) {
                jobs.push(listing);
            }
        }
        Ok(jobs)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnchorScanAdapter {
    name: &'static str,
    rules: AnchorRules,
    description: DescriptionChain,
}

impl AnchorScanAdapter {
    pub fn new(name: &'static str, rules: AnchorRules, description: DescriptionChain) -> Self {
        Self {
            name,
            rules,
            description,
        }
    }
}

#[async_trait]
impl SiteAdapter for AnchorScanAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn extract_listings(
        &self,
        document: &Html,
        site: &SiteConfig,
    ) -> Result<Vec<JobListing>, AdapterError> {
        self.rules.scan(document, &site.origin())
    }

    fn extract_description(&self, document: &Html) -> Result<String, AdapterError> {
        self.description.extract(document)
    }
}

pub fn mimic() -> AnchorScanAdapter {
    AnchorScanAdapter::new(
        "mimic",
        AnchorRules {
            href_any: &["/jobs/", "/careers/", "/job/"],
            href_also_any: &[],
            min_title_chars: 3,
            skip_titles: &[],
            dedupe: DedupeKey::Url,
        },
        DescriptionChain {
            candidates: &["main", "article"],
            heuristics: TextHeuristics::FIRST_MATCH,
            fallback: PageFallback::Text(&["body"]),
        },
    )
}

pub fn flyability() -> AnchorScanAdapter {
    AnchorScanAdapter::new(
        "flyability",
        AnchorRules {
            href_any: &["/career/", "/careers/", "/job/", "/position/"],
            href_also_any: &[],
            min_title_chars: 3,
            skip_titles: &["open position", "back", "apply", "see all", "view all"],
            dedupe: DedupeKey::Title,
        },
        DescriptionChain {
            candidates: &[".job-description", ".description", ".content", ".entry-content", "main", "article"],
            heuristics: TextHeuristics::FIRST_MATCH,
            fallback: PageFallback::Nothing,
        },
    )
}
