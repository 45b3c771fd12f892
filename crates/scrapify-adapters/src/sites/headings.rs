//! Careers pages where each posting is a heading with a link on or around it.

use std::collections::HashSet;

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use scrapify_core::{resolve_href, JobListing, SiteConfig};

use crate::{
    inline_text, selector, AdapterError, DescriptionChain, PageFallback, SiteAdapter,
    TextHeuristics,
};

/// Where the link for a heading lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPlacement {
    /// `<h5><a href>..</a></h5>`
    Inside,
    /// `<a href><h3>..</h3></a>` first, then a link inside the heading.
    AroundThenInside,
}

#[derive(Debug, Clone, Copy)]
pub struct HeadingLinkAdapter {
    name: &'static str,
    headings: &'static str,
    placement: LinkPlacement,
    min_title_chars: usize,
    description: DescriptionChain,
}

fn enclosing_link<'a>(heading: ElementRef<'a>) -> Option<ElementRef<'a>> {
    heading
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "a" && e.value().attr("href").is_some())
}

impl HeadingLinkAdapter {
    fn link_for<'a>(
        &self,
        heading: ElementRef<'a>,
        inner_link: &scraper::Selector,
    ) -> Option<ElementRef<'a>> {
        let inside = || heading.select(inner_link).next();
        match self.placement {
            LinkPlacement::Inside => inside(),
            LinkPlacement::AroundThenInside => enclosing_link(heading).or_else(inside),
        }
    }
}

#[async_trait]
impl SiteAdapter for HeadingLinkAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn extract_listings(
        &self,
        document: &Html,
        site: &SiteConfig,
    ) -> Result<Vec<JobListing>, AdapterError> {
        let heading_sel = selector(self.headings)?;
        let link_sel = selector("a[href]")?;
        let origin = site.origin();
        let mut seen = HashSet::new();
        let mut jobs = Vec::new();

        for heading in document.select(&heading_sel) {
            let Some(link) = self.link_for(heading, &link_sel) else {
                continue;
            };
            let Some(href) = link.value().attr("href").filter(|h| !h.trim().is_empty()) else {
                continue;
            };
            let title = inline_text(heading);
            if title.is_empty() || title.chars().count() < self.min_title_chars {
                continue;
            }
            let url = resolve_href(&origin, href);
            if seen.insert(url.clone()) {
                jobs.push(JobListing::new(title, url));
            }
        }
        Ok(jobs)
    }

    fn extract_description(&self, document: &Html) -> Result<String, AdapterError> {
        self.description.extract(document)
    }
}

pub fn hexagon_robotics() -> HeadingLinkAdapter {
    HeadingLinkAdapter {
        name: "hexagon-robotics",
        headings: "h5",
        placement: LinkPlacement::Inside,
        min_title_chars: 1,
        description: DescriptionChain {
            candidates: &[".job-description", ".description", ".content", ".oj-content"],
            heuristics: TextHeuristics {
                min_line_chars: 20,
                ..TextHeuristics::FIRST_MATCH
            },
            fallback: PageFallback::Text(&["main", "body"]),
        },
    }
}

/// Framer-built site: headings inside link cards, lots of header/footer chrome.
pub fn flexion_robotics() -> HeadingLinkAdapter {
    HeadingLinkAdapter {
        name: "flexion-robotics",
        headings: "h1, h2, h3, h4, h5, h6",
        placement: LinkPlacement::AroundThenInside,
        min_title_chars: 8,
        description: DescriptionChain {
            candidates: &[
                "div[data-block-type=\"text\"]",
                "div.job-description",
                "div.description",
                "article",
                "div.content",
                "main",
            ],
            heuristics: TextHeuristics {
                min_container_chars: 300,
                min_container_lines: 5,
                noise_markers: &[
                    "footer",
                    "©",
                    "all rights reserved",
                    "privacy policy",
                    "cookie",
                    "imprint",
                ],
                min_line_chars: 15,
                cutoff_markers: &[
                    "©",
                    "all rights reserved",
                    "privacy",
                    "cookie",
                    "imprint",
                    "contact us",
                    "back to top",
                ],
                min_page_chars: 200,
            },
            fallback: PageFallback::Text(&[]),
        },
    }
}
