//! Page-driven marketplace plugin.
//!
//! Scrapes a live marketplace in two phases: one session discovers detail
//! page URLs for the query (see [`crate::discovery`]), then the
//! [`ExtractionEngine`] parses those pages in parallel. Items that fail
//! extraction are logged and left out of the returned list.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use scrapqt_core::models::RawItem;

use crate::config::{ExtractionConfig, MarketplaceConfig};
use crate::discovery::discover;
use crate::engine::{ExtractionEngine, ExtractionReport};
use crate::error::PipelineError;
use crate::plugins::{ScrapeOutput, SourcePlugin};
use crate::session::{HttpSessionFactory, SessionFactory, SessionPool};

/// Extra links gathered beyond `max_products` so a few failed pages do not
/// leave the result short.
const DISCOVERY_SLACK: usize = 5;

pub struct MarketplacePlugin {
    name: String,
    description: String,
    base: Url,
    factory: Arc<dyn SessionFactory>,
    config: ExtractionConfig,
}

impl MarketplacePlugin {
    pub fn new(marketplace: &MarketplaceConfig, config: &ExtractionConfig) -> Result<Self> {
        let factory = Arc::new(HttpSessionFactory::new(config.clone()));
        Self::with_factory(marketplace, config, factory)
    }

    /// Build the plugin over a custom session source.
    pub fn with_factory(
        marketplace: &MarketplaceConfig,
        config: &ExtractionConfig,
        factory: Arc<dyn SessionFactory>,
    ) -> Result<Self> {
        let base = Url::parse(&marketplace.base_url)
            .with_context(|| format!("invalid marketplace URL: {}", marketplace.base_url))?;
        if base.host_str().is_none() {
            anyhow::bail!("marketplace URL has no host: {}", marketplace.base_url);
        }

        Ok(Self {
            name: marketplace.name.clone(),
            description: format!("Live listings from {}", base),
            base,
            factory,
            config: config.clone(),
        })
    }

    /// Run both phases and return the full report, including fenced items.
    pub async fn scrape_report(&self, query: &str) -> Result<ExtractionReport> {
        // Each scrape request gets its own pool so concurrent requests do
        // not share sessions.
        let pool = Arc::new(SessionPool::new(
            self.factory.clone(),
            self.config.workers,
        ));

        let target = self.config.max_products + DISCOVERY_SLACK;
        let mut urls = {
            let mut lease = pool.acquire().await?;
            let urls = discover(
                &mut lease,
                &self.base,
                query,
                target,
                self.config.max_scroll_attempts,
            )
            .await?;
            lease.recycle();
            urls
        };

        if urls.is_empty() {
            warn!(platform = %self.name, query, "no product links discovered");
            return Ok(ExtractionReport::default());
        }
        urls.truncate(self.config.max_products);

        let engine = ExtractionEngine::new(
            pool,
            self.base.clone(),
            self.config.workers,
            Duration::from_secs(self.config.item_timeout_secs),
        );
        Ok(engine.extract_all(urls).await)
    }
}

#[async_trait]
impl SourcePlugin for MarketplacePlugin {
    fn platform_name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn scrape(&self, query: &str) -> Result<Vec<RawItem>> {
        Ok(self.scrape_detailed(query).await?.items)
    }

    async fn scrape_detailed(&self, query: &str) -> Result<ScrapeOutput> {
        let report = self.scrape_report(query).await?;
        info!(
            platform = %self.name,
            query,
            items = report.items.len(),
            extraction_errors = report.errors.len(),
            "marketplace scrape finished"
        );
        let extraction_errors = report
            .errors
            .into_iter()
            .map(|(url, source)| {
                let err = PipelineError::Extraction { url, source };
                warn!(platform = %self.name, error = %err, "item fenced out");
                err.to_string()
            })
            .collect();
        Ok(ScrapeOutput {
            extraction_errors,
            items: report.items,
        })
    }
}
