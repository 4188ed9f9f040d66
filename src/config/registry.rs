//! Provider registry.
//!
//! Maps provider identifiers and website names to the report templates
//! that can read their documents. Templates are tried in registration
//! order, so alternative geometries for older report layouts go after the
//! current one.
//!
//! # Example
//!
//! ```no_run
//! use pdfholdings::config::ProviderRegistry;
//!
//! fn main() -> pdfholdings::Result<()> {
//!     let registry = ProviderRegistry::load_file("providers.json")?;
//!     if let Some(provider) = registry.select_for("Amundi Asset Management") {
//!         println!("{} templates", provider.templates.len());
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ExtractionConfig;
use crate::error::{Error, Result};

/// A provider and its report templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    /// Provider identifier (e.g. "amundi")
    pub id: String,
    /// Substrings of website fund-manager names that select this provider
    #[serde(default)]
    pub website_markers: Vec<String>,
    /// Templates in the order they are tried
    pub templates: Vec<Arc<ExtractionConfig>>,
}

impl Provider {
    /// Create a provider with one template.
    pub fn new(id: impl Into<String>, template: ExtractionConfig) -> Self {
        Self {
            id: id.into(),
            website_markers: Vec::new(),
            templates: vec![Arc::new(template)],
        }
    }

    /// Add a website-name marker.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.website_markers.push(marker.into());
        self
    }

    /// Append a fallback template.
    pub fn with_template(mut self, template: ExtractionConfig) -> Self {
        self.templates.push(Arc::new(template));
        self
    }

    fn matches_website(&self, website_name: &str) -> bool {
        let name = website_name.to_lowercase();
        self.website_markers
            .iter()
            .any(|m| name.contains(&m.to_lowercase()))
    }
}

/// Registry of providers.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<Provider>>,
    by_id: HashMap<String, usize>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider after validating its templates.
    ///
    /// A provider with an already registered id replaces the old one but
    /// keeps its position for website-name selection.
    pub fn register(&mut self, provider: Provider) -> Result<()> {
        if provider.templates.is_empty() {
            return Err(Error::Config(format!(
                "provider {} has no templates",
                provider.id
            )));
        }
        for template in &provider.templates {
            template.validate()?;
        }

        let key = provider.id.to_lowercase();
        let provider = Arc::new(provider);
        match self.by_id.get(&key) {
            Some(&index) => {
                log::debug!("replacing provider {}", provider.id);
                self.providers[index] = provider;
            }
            None => {
                self.by_id.insert(key, self.providers.len());
                self.providers.push(provider);
            }
        }
        Ok(())
    }

    /// Parse a JSON array of providers.
    pub fn from_json(json: &str) -> Result<Self> {
        let providers: Vec<Provider> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for provider in providers {
            registry.register(provider)?;
        }
        Ok(registry)
    }

    /// Load a JSON array of providers from a file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Get a provider by id (case-insensitive).
    pub fn get(&self, id: &str) -> Option<Arc<Provider>> {
        self.by_id
            .get(&id.to_lowercase())
            .map(|&i| Arc::clone(&self.providers[i]))
    }

    /// Select the first registered provider whose marker occurs in a
    /// website fund-manager name.
    pub fn select_for(&self, website_name: &str) -> Option<Arc<Provider>> {
        self.providers
            .iter()
            .find(|p| p.matches_website(website_name))
            .cloned()
    }

    /// Registered provider ids, in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id.as_str()).collect()
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Anchor, ColumnRole, LocatorConfig, TableConfig};

    fn template(name: &str) -> ExtractionConfig {
        let table = TableConfig::new(
            vec![300.0, 400.0],
            vec![
                ColumnRole::HoldingName,
                ColumnRole::MarketValue,
                ColumnRole::NetAssets,
            ],
        );
        ExtractionConfig::new(name, table)
            .with_locator(LocatorConfig::new().with_anchor(Anchor::literal("Portefeuille")))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Provider::new("Amundi", template("amundi")).with_marker("amundi"))
            .unwrap();

        assert!(registry.get("amundi").is_some());
        assert!(registry.get("AMUNDI").is_some());
        assert!(registry.get("pictet").is_none());
        assert_eq!(registry.ids(), vec!["Amundi"]);
    }

    #[test]
    fn test_select_first_match_wins() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Provider::new("bnp", template("bnp")).with_marker("BNP Paribas"))
            .unwrap();
        registry
            .register(Provider::new("paribas", template("other")).with_marker("Paribas"))
            .unwrap();

        let selected = registry.select_for("BNP PARIBAS ASSET MANAGEMENT").unwrap();
        assert_eq!(selected.id, "bnp");
        let selected = registry.select_for("Paribas Real Estate").unwrap();
        assert_eq!(selected.id, "paribas");
        assert!(registry.select_for("Comgest").is_none());
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut registry = ProviderRegistry::new();
        registry.register(Provider::new("a", template("a1"))).unwrap();
        registry.register(Provider::new("b", template("b1"))).unwrap();
        registry.register(Provider::new("A", template("a2"))).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("a").unwrap().templates[0].name, "a2");
        assert_eq!(registry.ids(), vec!["A", "b"]);
    }

    #[test]
    fn test_invalid_template_rejected() {
        let mut bad = template("bad");
        bad.table.column_boundaries.push(500.0);
        let mut registry = ProviderRegistry::new();
        assert!(registry.register(Provider::new("bad", bad)).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_from_json() {
        let json = r#"[{
            "id": "crelan",
            "website_markers": ["Crelan"],
            "templates": [
                {
                    "name": "crelan-current",
                    "locator": {"table_anchor": {"literal": "Portefeuille-titres"}},
                    "table": {
                        "column_boundaries": [300, 400],
                        "columns": ["holding_name", "market_value", "net_assets"]
                    },
                    "min_net_assets_total": 15.0
                },
                {
                    "name": "crelan-legacy",
                    "locator": {"table_anchor": {"literal": "Portefeuille-titres"}},
                    "table": {
                        "column_boundaries": [280, 390],
                        "columns": ["holding_name", "market_value", "net_assets"]
                    }
                }
            ]
        }]"#;
        let registry = ProviderRegistry::from_json(json).unwrap();
        let crelan = registry.select_for("Crelan Fund").unwrap();
        assert_eq!(crelan.templates.len(), 2);
        assert_eq!(crelan.templates[0].min_net_assets_total, Some(15.0));
        assert_eq!(crelan.templates[1].name, "crelan-legacy");
    }
}
