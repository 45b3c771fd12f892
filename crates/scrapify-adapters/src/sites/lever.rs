//! Lever-hosted job boards (`jobs.lever.co/<account>`).

use async_trait::async_trait;
use scraper::Html;
use scrapify_core::{resolve_href, JobListing, SiteConfig};

use crate::{
    element_text, inline_text, selector, AdapterError, DescriptionChain, PageFallback, SiteAdapter,
    TextHeuristics,
};

const FALLBACK_CHAIN: DescriptionChain = DescriptionChain {
    candidates: &[
        "div.posting-description",
        "div.description",
        "article",
        "div.content",
        "main",
    ],
    heuristics: TextHeuristics {
        min_container_chars: 200,
        min_line_chars: 10,
        ..TextHeuristics::FIRST_MATCH
    },
    fallback: PageFallback::Text(&[]),
};

#[derive(Debug, Clone, Copy)]
pub struct LeverAdapter {
    name: &'static str,
    fallback: Option<DescriptionChain>,
}

impl LeverAdapter {
    /// Only the standard `section page-centered` blocks.
    pub fn plain(name: &'static str) -> Self {
        Self {
            name,
            fallback: None,
        }
    }

    /// Standard sections, then alternate containers, then filtered page text.
    pub fn with_fallbacks(name: &'static str) -> Self {
        Self {
            name,
            fallback: Some(FALLBACK_CHAIN),
        }
    }
}

#[async_trait]
impl SiteAdapter for LeverAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn extract_listings(
        &self,
        document: &Html,
        site: &SiteConfig,
    ) -> Result<Vec<JobListing>, AdapterError> {
        let posting_sel = selector("div.posting")?;
        let title_sel = selector("h5")?;
        let link_sel = selector("a.posting-title")?;
        let origin = site.origin();

        let mut jobs = Vec::new();
        for post in document.select(&posting_sel) {
            let Some(title) = post.select(&title_sel).next().map(inline_text) else {
                continue;
            };
            let Some(href) = post
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .filter(|h| !h.trim().is_empty())
            else {
                continue;
            };
            if title.is_empty() {
                continue;
            }
            jobs.push(JobListing::new(title, resolve_href(&origin, href)));
        }
        Ok(jobs)
    }

    fn extract_description(&self, document: &Html) -> Result<String, AdapterError> {
        let section_sel = selector("div.section.page-centered")?;
        let sections = document
            .select(&section_sel)
            .map(element_text)
            .collect::<Vec<_>>();

        match &self.fallback {
            None => Ok(sections.join("\n\n")),
            Some(_) if !sections.is_empty() => Ok(sections.join("\n\n")),
            Some(chain) => chain.extract(document),
        }
    }
}
