//! Source plugin trait and the compile-time plugin registry.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               PluginRegistry                 │
//! │  ┌──────────────┐ ┌──────────┐ ┌──────────┐  │
//! │  │ Synthetic    │ │ Market-  │ │ Custom   │  │
//! │  │ catalogs     │ │ place    │ │ (Rust)   │  │
//! │  └──────────────┘ └──────────┘ └──────────┘  │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!             ScrapeOrchestrator::run()
//! ```
//!
//! Built-in plugins are listed once in [`BUILTIN_PLUGINS`]. A constructor
//! that fails is logged and skipped; the remaining plugins still load.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use scrapqt_core::models::RawItem;

use crate::config::Config;
use crate::plugin_catalog::{ExampleCommerce, PremiumElectronics};
use crate::plugin_marketplace::MarketplacePlugin;

// ═══════════════════════════════════════════════════════════════════════
// SourcePlugin Trait
// ═══════════════════════════════════════════════════════════════════════

/// A product source that can answer a search query.
///
/// Implementations must not share mutable state with other plugins; the
/// orchestrator may run them against different queries concurrently.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use scrapqt::plugins::SourcePlugin;
/// use scrapqt_core::models::RawItem;
///
/// struct FixedShop;
///
/// #[async_trait]
/// impl SourcePlugin for FixedShop {
///     fn platform_name(&self) -> &str { "FixedShop" }
///     fn description(&self) -> &str { "Always returns one item" }
///
///     async fn scrape(&self, query: &str) -> Result<Vec<RawItem>> {
///         Ok(vec![RawItem::new(query, "https://fixed.example/p/1")])
///     }
/// }
/// ```
#[async_trait]
pub trait SourcePlugin: Send + Sync {
    /// Platform label stamped on every item this plugin produces.
    fn platform_name(&self) -> &str;

    /// One-line description, shown by `scrapqt plugins`.
    fn description(&self) -> &str;

    /// Return listings matching `query`.
    ///
    /// An `Err` marks the whole plugin as failed for this query; per-item
    /// problems should be handled inside the plugin.
    async fn scrape(&self, query: &str) -> Result<Vec<RawItem>>;

    /// Like [`scrape`](SourcePlugin::scrape), but also reports items that
    /// were found and then fenced out during extraction.
    async fn scrape_detailed(&self, query: &str) -> Result<ScrapeOutput> {
        Ok(ScrapeOutput {
            items: self.scrape(query).await?,
            extraction_errors: Vec::new(),
        })
    }
}

/// Items from one plugin run plus `"url: reason"` messages for the items
/// that failed extraction.
#[derive(Debug, Default)]
pub struct ScrapeOutput {
    pub items: Vec<RawItem>,
    pub extraction_errors: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

type PluginCtor = fn(&Config) -> Result<Option<Arc<dyn SourcePlugin>>>;

/// Every plugin compiled into the binary. A constructor returns `Ok(None)`
/// when the plugin is disabled in config.
const BUILTIN_PLUGINS: &[(&str, PluginCtor)] = &[
    ("ExampleCommerce", example_commerce),
    ("PremiumElectronics", premium_electronics),
    ("Marketplace", marketplace),
];

fn example_commerce(config: &Config) -> Result<Option<Arc<dyn SourcePlugin>>> {
    if !config.plugins.example_commerce {
        return Ok(None);
    }
    Ok(Some(Arc::new(ExampleCommerce::new())))
}

fn premium_electronics(config: &Config) -> Result<Option<Arc<dyn SourcePlugin>>> {
    if !config.plugins.premium_electronics {
        return Ok(None);
    }
    Ok(Some(Arc::new(PremiumElectronics::new())))
}

fn marketplace(config: &Config) -> Result<Option<Arc<dyn SourcePlugin>>> {
    match &config.plugins.marketplace {
        Some(m) => Ok(Some(Arc::new(MarketplacePlugin::new(m, &config.extraction)?))),
        None => Ok(None),
    }
}

/// Ordered collection of loaded plugins.
#[derive(Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn SourcePlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Load every enabled built-in plugin.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for (name, ctor) in BUILTIN_PLUGINS {
            match ctor(config) {
                Ok(Some(plugin)) => registry.register(plugin),
                Ok(None) => {}
                Err(e) => warn!(plugin = name, error = %e, "plugin failed to initialize, skipping"),
            }
        }
        info!(count = registry.len(), plugins = ?registry.names(), "plugins loaded");
        registry
    }

    pub fn register(&mut self, plugin: Arc<dyn SourcePlugin>) {
        self.plugins.push(plugin);
    }

    pub fn plugins(&self) -> &[Arc<dyn SourcePlugin>] {
        &self.plugins
    }

    pub fn find(&self, platform: &str) -> Option<&Arc<dyn SourcePlugin>> {
        self.plugins.iter().find(|p| p.platform_name() == platform)
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins
            .iter()
            .map(|p| p.platform_name().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarketplaceConfig;

    #[test]
    fn defaults_load_synthetic_plugins() {
        let config = Config::with_db("unused.sqlite");
        let registry = PluginRegistry::from_config(&config);
        assert_eq!(registry.names(), vec!["ExampleCommerce", "PremiumElectronics"]);
        assert!(registry.find("PremiumElectronics").is_some());
        assert!(registry.find("Tokopedia").is_none());
    }

    #[test]
    fn disabled_plugins_are_left_out() {
        let mut config = Config::with_db("unused.sqlite");
        config.plugins.example_commerce = false;
        let registry = PluginRegistry::from_config(&config);
        assert_eq!(registry.names(), vec!["PremiumElectronics"]);
    }

    #[test]
    fn failing_constructor_is_skipped() {
        let mut config = Config::with_db("unused.sqlite");
        config.plugins.marketplace = Some(MarketplaceConfig {
            name: "Broken".into(),
            base_url: "not a url".into(),
        });
        let registry = PluginRegistry::from_config(&config);
        assert_eq!(registry.len(), 2);
        assert!(registry.find("Broken").is_none());
    }

    #[test]
    fn marketplace_loads_when_configured() {
        let mut config = Config::with_db("unused.sqlite");
        config.plugins.marketplace = Some(MarketplaceConfig {
            name: "Tokopedia".into(),
            base_url: "https://www.tokopedia.com".into(),
        });
        let registry = PluginRegistry::from_config(&config);
        assert_eq!(registry.len(), 3);
        assert!(registry.find("Tokopedia").is_some());
    }
}
