//! Company registry: the built-in table plus an optional `companies.yaml` overlay.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use scrapify_adapters::{
    adapter_by_name, normalize_company_id, SiteAdapter, BUILTIN_COMPANIES, PLACEHOLDER_COMPANIES,
};
use scrapify_core::{CompanySelection, SiteConfig};
use serde::Deserialize;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompaniesFile {
    #[serde(default)]
    pub companies: Vec<CompanyOverride>,
}

/// One `companies.yaml` entry. Unset fields keep the built-in value.
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyOverride {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub adapter: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Clone)]
pub struct CompanyEntry {
    pub id: String,
    pub display_name: String,
    pub site: Option<SiteConfig>,
    pub adapter: Option<Arc<dyn SiteAdapter>>,
}

impl fmt::Debug for CompanyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompanyEntry")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("site", &self.site)
            .field("adapter", &self.adapter_name())
            .finish()
    }
}

impl CompanyEntry {
    pub fn configured(
        display_name: impl Into<String>,
        site: SiteConfig,
        adapter: Arc<dyn SiteAdapter>,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            id: normalize_company_id(&display_name),
            display_name,
            site: Some(site),
            adapter: Some(adapter),
        }
    }

    /// A company users can pick that has no site configuration yet.
    pub fn placeholder(display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            id: normalize_company_id(&display_name),
            display_name,
            site: None,
            adapter: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.site.is_some() && self.adapter.is_some()
    }

    pub fn adapter_name(&self) -> Option<&'static str> {
        self.adapter.as_ref().map(|a| a.name())
    }
}

/// A company ready to be scraped.
#[derive(Clone)]
pub struct ConfiguredCompany {
    pub id: String,
    pub display_name: String,
    pub site: SiteConfig,
    pub adapter: Arc<dyn SiteAdapter>,
}

pub enum Resolution {
    Configured(ConfiguredCompany),
    /// Carries the display name when the id is known, else the id as given.
    NotConfigured(String),
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<CompanyEntry>,
}

impl Registry {
    pub fn new(entries: Vec<CompanyEntry>) -> Self {
        Self { entries }
    }

    pub fn builtin(user_agent: &str) -> Self {
        let mut entries = Vec::new();
        for company in BUILTIN_COMPANIES {
            let Some(adapter) = adapter_by_name(company.adapter) else {
                warn!(company = company.id, adapter = company.adapter, "built-in adapter missing");
                continue;
            };
            entries.push(CompanyEntry {
                id: company.id.to_string(),
                display_name: company.display_name.to_string(),
                site: Some(company.site_config(user_agent)),
                adapter: Some(Arc::from(adapter)),
            });
        }
        for (id, display_name) in PLACEHOLDER_COMPANIES {
            entries.push(CompanyEntry {
                id: id.to_string(),
                display_name: display_name.to_string(),
                site: None,
                adapter: None,
            });
        }
        Self { entries }
    }

    /// Built-in table merged with the overlay at `path`, when that file exists.
    pub async fn load(path: &Path, user_agent: &str) -> Result<Self> {
        let registry = Self::builtin(user_agent);
        let present = fs::try_exists(path)
            .await
            .with_context(|| format!("checking {}", path.display()))?;
        if !present {
            debug!(path = %path.display(), "no companies overlay");
            return Ok(registry);
        }
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let overlay: CompaniesFile = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(registry.with_overrides(overlay, user_agent))
    }

    pub fn with_overrides(mut self, overlay: CompaniesFile, user_agent: &str) -> Self {
        for item in overlay.companies {
            let id = normalize_company_id(&item.id);
            if !item.enabled {
                self.entries.retain(|e| e.id != id);
                continue;
            }

            let pos = match self.entries.iter().position(|e| e.id == id) {
                Some(pos) => pos,
                None => {
                    self.entries.push(CompanyEntry {
                        id: id.clone(),
                        display_name: item.id.trim().to_string(),
                        site: None,
                        adapter: None,
                    });
                    self.entries.len() - 1
                }
            };
            let entry = &mut self.entries[pos];

            if let Some(name) = item.display_name {
                entry.display_name = name;
            }
            if let Some(adapter_name) = &item.adapter {
                entry.adapter = adapter_by_name(adapter_name).map(Arc::from);
                if entry.adapter.is_none() {
                    warn!(company = %id, adapter = %adapter_name, "unknown adapter, company left unconfigured");
                }
            }

            let mut site = match (entry.site.take(), item.url) {
                (Some(mut site), Some(url)) => {
                    site.url = url;
                    Some(site)
                }
                (existing, None) => existing,
                (None, Some(url)) => Some(SiteConfig::new(url)),
            };
            if let Some(site) = site.as_mut() {
                if !item.headers.is_empty() {
                    site.headers = item.headers;
                }
                if item.note.is_some() {
                    site.note = item.note;
                }
            }
            entry.site = site.map(|s| s.with_default_headers(user_agent));
        }
        self
    }

    pub fn entries(&self) -> &[CompanyEntry] {
        &self.entries
    }

    fn find(&self, id_or_name: &str) -> Option<&CompanyEntry> {
        let id = normalize_company_id(id_or_name);
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn resolve(&self, id_or_name: &str) -> Resolution {
        let Some(entry) = self.find(id_or_name) else {
            return Resolution::NotConfigured(id_or_name.trim().to_string());
        };
        match (&entry.site, &entry.adapter) {
            (Some(site), Some(adapter)) => Resolution::Configured(ConfiguredCompany {
                id: entry.id.clone(),
                display_name: entry.display_name.clone(),
                site: site.clone(),
                adapter: Arc::clone(adapter),
            }),
            _ => Resolution::NotConfigured(entry.display_name.clone()),
        }
    }

    /// Company ids a run should visit, in registry order. `All` covers only
    /// configured companies; placeholders are reachable through `Single`.
    pub fn select(&self, selection: &CompanySelection) -> Vec<String> {
        match selection {
            CompanySelection::All => self
                .entries
                .iter()
                .filter(|e| e.is_configured())
                .map(|e| e.id.clone())
                .collect(),
            CompanySelection::Single(id) => vec![id.clone()],
        }
    }
}
