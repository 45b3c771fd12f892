//! Site adapter contract, shared extraction helpers and the built-in adapter table.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use scrapify_core::{collapse_whitespace, JobListing, SiteConfig};
use scrapify_storage::{FetchError, PageFetcher};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub mod sites;

pub use sites::anchors::{AnchorRules, AnchorScanAdapter, DedupeKey};
pub use sites::headings::{HeadingLinkAdapter, LinkPlacement};
pub use sites::json_api::{JsonApiAdapter, JsonListingShape};
pub use sites::lever::LeverAdapter;

pub const CRATE_NAME: &str = "scrapify-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    Message(String),
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid JSON from listing API: {0}")]
    Json(#[from] serde_json::Error),
}

/// Translates one site's listing and detail pages into canonical job data.
///
/// `extract_listings` may legitimately return nothing (script-rendered
/// pages). `extract_description` returns `Ok("")` when nothing useful was
/// found; `Err` means the adapter itself is broken.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Listing discovery through a JSON API. `None` for HTML-only sites.
    /// A returned `Err` makes the caller fall back to `extract_listings`.
    async fn listings_from_api(
        &self,
        _http: &dyn PageFetcher,
        _site: &SiteConfig,
    ) -> Option<Result<Vec<JobListing>, AdapterError>> {
        None
    }

    fn extract_listings(
        &self,
        document: &Html,
        site: &SiteConfig,
    ) -> Result<Vec<JobListing>, AdapterError>;

    fn extract_description(&self, document: &Html) -> Result<String, AdapterError>;
}

/// Per-adapter "is this text good enough" rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextHeuristics {
    /// A candidate container must hold more characters than this.
    pub min_container_chars: usize,
    /// A candidate container must hold at least this many non-blank lines.
    pub min_container_lines: usize,
    /// A candidate container mentioning any of these is treated as chrome.
    pub noise_markers: &'static [&'static str],
    /// Page-fallback lines of this many characters or fewer are dropped.
    pub min_line_chars: usize,
    /// Page-fallback consumption stops at the first line mentioning any of these.
    pub cutoff_markers: &'static [&'static str],
    /// Page-fallback output must hold more characters than this, else it is discarded.
    pub min_page_chars: usize,
}

impl TextHeuristics {
    /// The first matching container wins, whatever it holds.
    pub const FIRST_MATCH: Self = Self {
        min_container_chars: 0,
        min_container_lines: 0,
        noise_markers: &[],
        min_line_chars: 0,
        cutoff_markers: &[],
        min_page_chars: 0,
    };

    pub fn accepts_container(&self, text: &str) -> bool {
        if self.min_container_chars == 0
            && self.min_container_lines == 0
            && self.noise_markers.is_empty()
        {
            return true;
        }
        let lines = text.lines().filter(|l| !l.trim().is_empty()).count();
        if lines < self.min_container_lines {
            return false;
        }
        let lower = text.to_lowercase();
        if self.noise_markers.iter().any(|m| lower.contains(m)) {
            return false;
        }
        text.chars().count() > self.min_container_chars
    }

    pub fn filter_page_text(&self, text: &str) -> String {
        let mut kept = Vec::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.chars().count() <= self.min_line_chars {
                continue;
            }
            let lower = line.to_lowercase();
            if self.cutoff_markers.iter().any(|m| lower.contains(m)) {
                break;
            }
            kept.push(line);
        }
        let cleaned = kept.join("\n");
        if self.min_page_chars == 0 || cleaned.chars().count() > self.min_page_chars {
            cleaned
        } else {
            String::new()
        }
    }
}

/// What a description chain does once every candidate container was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFallback {
    Nothing,
    /// Text of the first present root (whole document when none match),
    /// run through [`TextHeuristics::filter_page_text`].
    Text(&'static [&'static str]),
}

/// Ordered candidate selectors tried against a detail page, most specific first.
#[derive(Debug, Clone, Copy)]
pub struct DescriptionChain {
    pub candidates: &'static [&'static str],
    pub heuristics: TextHeuristics,
    pub fallback: PageFallback,
}

impl DescriptionChain {
    pub fn extract(&self, document: &Html) -> Result<String, AdapterError> {
        for css in self.candidates {
            let sel = selector(css)?;
            if let Some(element) = document.select(&sel).next() {
                let text = element_text(element);
                if self.heuristics.accepts_container(&text) {
                    return Ok(text);
                }
            }
        }

        match self.fallback {
            PageFallback::Nothing => Ok(String::new()),
            PageFallback::Text(roots) => {
                let mut text = None;
                for css in roots {
                    let sel = selector(css)?;
                    if let Some(element) = document.select(&sel).next() {
                        text = Some(element_text(element));
                        break;
                    }
                }
                let text = text.unwrap_or_else(|| document_text(document));
                Ok(self.heuristics.filter_page_text(&text))
            }
        }
    }
}

pub fn selector(css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css).map_err(|e| AdapterError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn is_hidden_text_container(name: &str) -> bool {
    matches!(name, "script" | "style" | "noscript" | "template" | "head")
}

/// Visible text under `element`, one stripped text node per line.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| is_hidden_text_container(e.name()))
            });
            if hidden {
                return None;
            }
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn document_text(document: &Html) -> String {
    element_text(document.root_element())
}

/// Text of an element flattened onto one line, as used for titles.
pub fn inline_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn json_str<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a str> {
    let mut cur = value;
    for segment in path {
        cur = cur.get(*segment)?;
    }
    cur.as_str()
}

/// Lower-case, dash-separated identifier: "Gravis Robotics" -> "gravis-robotics".
pub fn normalize_company_id(input: &str) -> String {
    input
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// A company the binary knows about out of the box.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinCompany {
    pub id: &'static str,
    pub display_name: &'static str,
    pub adapter: &'static str,
    pub url: &'static str,
    pub note: Option<&'static str>,
}

impl BuiltinCompany {
    pub fn site_config(&self, user_agent: &str) -> SiteConfig {
        let mut config = SiteConfig::new(self.url).with_default_headers(user_agent);
        config.note = self.note.map(ToString::to_string);
        config
    }
}

pub const BUILTIN_COMPANIES: &[BuiltinCompany] = &[
    BuiltinCompany {
        id: "rivr",
        display_name: "Rivr",
        adapter: "lever",
        url: "https://jobs.lever.co/rivr",
        note: Some("Lever.co standard"),
    },
    BuiltinCompany {
        id: "gravis-robotics",
        display_name: "Gravis Robotics",
        adapter: "lever-fallback",
        url: "https://jobs.lever.co/gravisrobotics",
        note: Some("Lever.co with fallback selectors for varying job layouts"),
    },
    BuiltinCompany {
        id: "anybotics",
        display_name: "ANYbotics",
        adapter: "anybotics",
        url: "https://apply.workable.com/anybotics/",
        note: Some("Workable API, careers page as fallback"),
    },
    BuiltinCompany {
        id: "mimic",
        display_name: "mimic",
        adapter: "mimic",
        url: "https://www.mimicrobotics.com/careers",
        note: None,
    },
    BuiltinCompany {
        id: "leica-geosystems",
        display_name: "Leica Geosystems",
        adapter: "leica-geosystems",
        url: "https://leica-geosystems.com/about-us/careers",
        note: Some("Hexagon careers API, link scan as fallback"),
    },
    BuiltinCompany {
        id: "hexagon-robotics",
        display_name: "Hexagon Robotics",
        adapter: "hexagon-robotics",
        url: "https://robotics.hexagon.com/careers",
        note: None,
    },
    BuiltinCompany {
        id: "flexion-robotics",
        display_name: "Flexion Robotics",
        adapter: "flexion-robotics",
        url: "https://flexion.ai/careers",
        note: Some("Framer site, filtered to avoid header/footer noise"),
    },
    BuiltinCompany {
        id: "flyability",
        display_name: "Flyability",
        adapter: "flyability",
        url: "https://www.flyability.com/careers",
        note: None,
    },
];

/// Companies users may pick that have no site configuration yet.
pub const PLACEHOLDER_COMPANIES: &[(&str, &str)] = &[
    ("hexagon-ab", "Hexagon AB"),
    ("flink-robotics", "Flink Robotics"),
];

pub fn adapter_by_name(name: &str) -> Option<Box<dyn SiteAdapter>> {
    match normalize_company_id(name).as_str() {
        "lever" | "rivr" => Some(Box::new(LeverAdapter::plain("lever"))),
        "lever-fallback" | "gravis-robotics" => {
            Some(Box::new(LeverAdapter::with_fallbacks("lever-fallback")))
        }
        "anybotics" => Some(Box::new(sites::json_api::anybotics())),
        "leica-geosystems" => Some(Box::new(sites::json_api::leica_geosystems())),
        "mimic" => Some(Box::new(sites::anchors::mimic())),
        "flyability" => Some(Box::new(sites::anchors::flyability())),
        "hexagon-robotics" => Some(Box::new(sites::headings::hexagon_robotics())),
        "flexion-robotics" => Some(Box::new(sites::headings::flexion_robotics())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_ids_normalize_from_display_names() {
        assert_eq!(normalize_company_id("Gravis Robotics"), "gravis-robotics");
        assert_eq!(normalize_company_id("  ANYbotics "), "anybotics");
        assert_eq!(normalize_company_id("Leica_Geosystems!!"), "leica-geosystems");
    }

    #[test]
    fn every_builtin_company_has_an_adapter() {
        for company in BUILTIN_COMPANIES {
            assert!(
                adapter_by_name(company.adapter).is_some(),
                "no adapter named {}",
                company.adapter
            );
            assert_eq!(normalize_company_id(company.id), company.id);
        }
        assert!(adapter_by_name("hexagon-ab").is_none());
    }

    #[test]
    fn element_text_skips_scripts_and_blank_nodes() {
        let doc = Html::parse_document(
            "<html><head><title>T</title><style>.x{}</style></head><body>\
             <main><p> First </p><script>var a = 1;</script>\n<p>Second</p></main></body></html>",
        );
        let main = doc.select(&selector("main").unwrap()).next().unwrap();
        assert_eq!(element_text(main), "First\nSecond");
        assert_eq!(document_text(&doc), "First\nSecond");
    }

    #[test]
    fn heuristics_reject_short_or_noisy_containers() {
        let rules = TextHeuristics {
            min_container_chars: 20,
            min_container_lines: 2,
            noise_markers: &["privacy policy"],
            ..TextHeuristics::FIRST_MATCH
        };
        assert!(!rules.accepts_container("one line only that is long enough"));
        assert!(!rules.accepts_container("short\nlines"));
        assert!(!rules.accepts_container("a long first line here\nPrivacy Policy"));
        assert!(rules.accepts_container("a long first line here\nand another one"));
        assert!(TextHeuristics::FIRST_MATCH.accepts_container(""));
    }

    #[test]
    fn page_filter_drops_short_lines_and_stops_at_cutoff() {
        let rules = TextHeuristics {
            min_line_chars: 5,
            cutoff_markers: &["©"],
            ..TextHeuristics::FIRST_MATCH
        };
        let text = "Menu\nWe build robots for you\nApply now please\n© 2026 Robots AG\nLate line ignored";
        assert_eq!(rules.filter_page_text(text), "We build robots for you\nApply now please");

        let strict = TextHeuristics {
            min_page_chars: 500,
            ..rules
        };
        assert_eq!(strict.filter_page_text(text), "");
    }

    #[test]
    fn description_chain_walks_candidates_in_order() {
        let chain = DescriptionChain {
            candidates: &[".job-description", "main"],
            heuristics: TextHeuristics::FIRST_MATCH,
            fallback: PageFallback::Nothing,
        };
        let doc = Html::parse_document("<body><main><p>From main</p></main></body>");
        assert_eq!(chain.extract(&doc).unwrap(), "From main");

        let doc = Html::parse_document("<body><div>Nothing matching</div></body>");
        assert_eq!(chain.extract(&doc).unwrap(), "");
    }

    #[test]
    fn broken_selectors_surface_as_adapter_errors() {
        let chain = DescriptionChain {
            candidates: &["div[["],
            heuristics: TextHeuristics::FIRST_MATCH,
            fallback: PageFallback::Nothing,
        };
        let doc = Html::parse_document("<body></body>");
        assert!(matches!(chain.extract(&doc), Err(AdapterError::Selector { .. })));
    }
}
