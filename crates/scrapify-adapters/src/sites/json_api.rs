//! Sites whose postings come from a JSON endpoint, with an HTML link scan
//! when the endpoint is unreachable or returns garbage.

use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;
use scrapify_core::{resolve_href, JobListing, SiteConfig};
use scrapify_storage::PageFetcher;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::anchors::{AnchorRules, DedupeKey};
use crate::{json_str, AdapterError, DescriptionChain, PageFallback, SiteAdapter, TextHeuristics};

const API_TIMEOUT: Duration = Duration::from_secs(15);

/// Where titles and links live inside an API response. For each field the
/// first key present on the object wins.
#[derive(Debug, Clone, Copy)]
pub struct JsonListingShape {
    pub list_keys: &'static [&'static str],
    pub title_keys: &'static [&'static str],
    pub url_keys: &'static [&'static str],
}

fn first_present<'a>(value: &'a JsonValue, keys: &[&str]) -> Option<&'a JsonValue> {
    keys.iter().find_map(|k| value.get(*k))
}

impl JsonListingShape {
    pub fn listings(&self, body: &JsonValue, origin: &str) -> Vec<JobListing> {
        let Some(items) = first_present(body, self.list_keys).and_then(JsonValue::as_array) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let title_key = self.title_keys.iter().find(|k| item.get(**k).is_some())?;
                let url_key = self.url_keys.iter().find(|k| item.get(**k).is_some())?;
                let title = json_str(item, &[*title_key])?.trim();
                let url = json_str(item, &[*url_key])?.trim();
                if title.is_empty() || url.is_empty() {
                    return None;
                }
                Some(JobListing::new(title, resolve_href(origin, url)))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JsonApiAdapter {
    name: &'static str,
    api_url: &'static str,
    shape: JsonListingShape,
    fallback: AnchorRules,
    description: DescriptionChain,
}

impl JsonApiAdapter {
    pub fn new(
        name: &'static str,
        api_url: &'static str,
        shape: JsonListingShape,
        fallback: AnchorRules,
        description: DescriptionChain,
    ) -> Self {
        Self {
            name,
            api_url,
            shape,
            fallback,
            description,
        }
    }

    pub fn api_url(&self) -> &'static str {
        self.api_url
    }

    async fn fetch_api(
        &self,
        http: &dyn PageFetcher,
        site: &SiteConfig,
    ) -> Result<Vec<JobListing>, AdapterError> {
        let response = http.fetch_text(self.api_url, &site.headers, API_TIMEOUT).await?;
        let body: JsonValue = serde_json::from_str(&response.body)?;
        let jobs = self.shape.listings(&body, &site.origin());
        debug!(adapter = self.name, count = jobs.len(), "listings from api");
        Ok(jobs)
    }
}

#[async_trait]
impl SiteAdapter for JsonApiAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn listings_from_api(
        &self,
        http: &dyn PageFetcher,
        site: &SiteConfig,
    ) -> Option<Result<Vec<JobListing>, AdapterError>> {
        Some(self.fetch_api(http, site).await)
    }

    fn extract_listings(
        &self,
        document: &Html,
        site: &SiteConfig,
    ) -> Result<Vec<JobListing>, AdapterError> {
        self.fallback.scan(document, &site.origin())
    }

    fn extract_description(&self, document: &Html) -> Result<String, AdapterError> {
        self.description.extract(document)
    }
}

pub fn anybotics() -> JsonApiAdapter {
    JsonApiAdapter::new(
        "anybotics",
        "https://api.workable.com/organization/anybotics/jobs",
        JsonListingShape {
            list_keys: &["jobs"],
            title_keys: &["title"],
            url_keys: &["url"],
        },
        AnchorRules {
            href_any: &["/j/"],
            href_also_any: &[],
            min_title_chars: 3,
            skip_titles: &[],
            dedupe: DedupeKey::Url,
        },
        DescriptionChain {
            candidates: &["div.description", "main", "div.content"],
            heuristics: TextHeuristics::FIRST_MATCH,
            fallback: PageFallback::Text(&[]),
        },
    )
}

pub fn leica_geosystems() -> JsonApiAdapter {
    JsonApiAdapter::new(
        "leica-geosystems",
        "https://careers.hexagon.com/api/v1/jobs?brand=leica-geosystems&limit=100",
        JsonListingShape {
            list_keys: &["jobs", "results"],
            title_keys: &["title", "name"],
            url_keys: &["url", "link"],
        },
        AnchorRules {
            href_any: &["job"],
            href_also_any: &["leica", "hexagon"],
            min_title_chars: 3,
            skip_titles: &[],
            dedupe: DedupeKey::Url,
        },
        DescriptionChain {
            candidates: &[".job-description", ".description", ".content", "main"],
            heuristics: TextHeuristics::FIRST_MATCH,
            fallback: PageFallback::Nothing,
        },
    )
}
