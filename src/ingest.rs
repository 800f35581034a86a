//! Scrape orchestration.
//!
//! Coordinates one scrape request: resolve the query id → run every
//! registered plugin → normalize raw items → save the whole batch through
//! the [`ItemSink`]. A failing plugin is isolated; a failing store write
//! marks the request unsuccessful with nothing saved.

use std::sync::Arc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use scrapqt_core::models::CanonicalItem;

use crate::cancel::Cancellation;
use crate::config::Config;
use crate::error::PipelineError;
use crate::plugins::PluginRegistry;
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::sink::ItemSink;

/// Outcome of one plugin within a scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginReport {
    pub platform: String,
    /// Usable items the plugin returned.
    pub items: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a whole scrape request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeReport {
    /// `false` only when the store write failed.
    pub success: bool,
    pub query: String,
    pub query_id: i64,
    /// Items the store accepted: new products plus linked duplicates.
    pub items_scraped: u64,
    pub inserted: u64,
    pub linked: u64,
    /// Normalized items produced by all plugins.
    pub items_found: usize,
    /// Items dropped for lacking a title or link.
    pub dropped: usize,
    pub plugins: Vec<PluginReport>,
    /// Items fenced out by page-driven plugins.
    pub extraction_errors: usize,
    #[serde(default)]
    pub cancelled: bool,
}

pub struct ScrapeOrchestrator {
    plugins: PluginRegistry,
    sink: Arc<dyn ItemSink>,
    cancel: Cancellation,
}

impl ScrapeOrchestrator {
    pub fn new(plugins: PluginRegistry, sink: Arc<dyn ItemSink>) -> Self {
        Self {
            plugins,
            sink,
            cancel: Cancellation::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn sink(&self) -> &Arc<dyn ItemSink> {
        &self.sink
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// Scrape `query`, creating its query record if needed.
    pub async fn run(&self, query: &str) -> Result<ScrapeReport> {
        self.run_with_progress(query, &NoProgress).await
    }

    pub async fn run_with_progress(
        &self,
        query: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<ScrapeReport> {
        let query = query.trim();
        if query.is_empty() {
            bail!("query must not be empty");
        }
        let query_id = self.sink.resolve_query(query).await?;
        Ok(self.run_for(query_id, query, progress).await)
    }

    /// Scrape `query` and attribute every item to `query_id`.
    ///
    /// Never fails: plugin and store errors are reported in the result.
    pub async fn run_for(
        &self,
        query_id: i64,
        query: &str,
        progress: &dyn ProgressReporter,
    ) -> ScrapeReport {
        let mut report = ScrapeReport {
            success: true,
            query: query.to_string(),
            query_id,
            ..ScrapeReport::default()
        };
        let mut batch: Vec<CanonicalItem> = Vec::new();

        for plugin in self.plugins.plugins() {
            if self.cancel.is_cancelled() {
                info!(query_id, "scrape cancelled between plugins");
                report.cancelled = true;
                break;
            }

            let platform = plugin.platform_name().to_string();
            progress.report(ProgressEvent::PluginStarted {
                platform: platform.clone(),
                query: query.to_string(),
            });

            match plugin.scrape_detailed(query).await {
                Ok(output) => {
                    report.extraction_errors += output.extraction_errors.len();
                    let mut usable = 0;
                    for raw in output.items {
                        if raw.title.trim().is_empty() || raw.link.trim().is_empty() {
                            warn!(platform = %platform, "dropping item without title or link");
                            report.dropped += 1;
                            continue;
                        }
                        batch.push(CanonicalItem::from_raw(raw, &platform, query_id));
                        usable += 1;
                    }
                    info!(platform = %platform, query_id, items = usable, "plugin finished");
                    progress.report(ProgressEvent::PluginFinished {
                        platform: platform.clone(),
                        items: usable as u64,
                        failed: false,
                    });
                    report.plugins.push(PluginReport {
                        platform,
                        items: usable,
                        error: None,
                    });
                }
                Err(source) => {
                    let err = PipelineError::PluginFailure {
                        platform: platform.clone(),
                        source,
                    };
                    warn!(query_id, error = %err, "plugin failed, continuing");
                    progress.report(ProgressEvent::PluginFinished {
                        platform: platform.clone(),
                        items: 0,
                        failed: true,
                    });
                    report.plugins.push(PluginReport {
                        platform,
                        items: 0,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        report.items_found = batch.len();
        if batch.is_empty() {
            info!(query_id, "no items to save");
            return report;
        }

        match self.sink.persist_items(&batch).await {
            Ok(outcome) => {
                report.items_scraped = outcome.saved();
                report.inserted = outcome.inserted;
                report.linked = outcome.linked;
                report.dropped += outcome.skipped as usize;
                progress.report(ProgressEvent::Saved {
                    query: query.to_string(),
                    saved: outcome.saved(),
                    total: batch.len() as u64,
                });
                info!(
                    query_id,
                    inserted = outcome.inserted,
                    linked = outcome.linked,
                    "scrape saved"
                );
            }
            Err(e) => {
                let err = PipelineError::StoreTransaction(e);
                warn!(query_id, error = %err, "save failed, nothing kept");
                report.success = false;
                report.items_scraped = 0;
            }
        }
        report
    }
}

/// Print a scrape report the way `scrapqt scrape` shows it.
pub fn print_report(report: &ScrapeReport) {
    println!("scrape \"{}\" (query {})", report.query, report.query_id);
    for p in &report.plugins {
        match &p.error {
            Some(e) => println!("  {:<20} failed: {}", p.platform, e),
            None => println!("  {:<20} {} items", p.platform, p.items),
        }
    }
    if report.extraction_errors > 0 {
        println!("  extraction errors: {}", report.extraction_errors);
    }
    if report.dropped > 0 {
        println!("  dropped (no title/link): {}", report.dropped);
    }
    if report.cancelled {
        println!("  cancelled before all plugins ran");
    }
    if report.success {
        println!(
            "  saved: {} ({} new, {} already known)",
            report.items_scraped, report.inserted, report.linked
        );
    } else {
        println!("  save FAILED: nothing was stored");
    }
}

/// `scrapqt scrape`: run every enabled plugin for `query`.
pub async fn run_scrape(
    config: &Config,
    sink: Arc<dyn ItemSink>,
    query: &str,
    progress: &dyn ProgressReporter,
    cancel: Cancellation,
) -> Result<ScrapeReport> {
    let orchestrator = ScrapeOrchestrator::new(PluginRegistry::from_config(config), sink)
        .with_cancellation(cancel);
    let report = orchestrator.run_with_progress(query, progress).await?;
    print_report(&report);
    Ok(report)
}
