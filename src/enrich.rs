//! Batch sentiment enrichment.
//!
//! Loads every product without a sentiment score, splits the list into
//! fixed-size batches and scores items one at a time through the
//! [`ScoringOracle`]. Batches run strictly in sequence with a pause between
//! them; the pause is the only rate limiting. A failed item is recorded and
//! skipped, never retried within the run.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use scrapqt_core::score::normalize_score;
use scrapqt_core::store::Store;

use crate::cancel::Cancellation;
use crate::config::EnrichmentConfig;
use crate::error::PipelineError;
use crate::oracle::ScoringOracle;
use crate::progress::{ProgressEvent, ProgressReporter};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    pub analyzed: u64,
    pub failed: u64,
    pub failed_ids: Vec<i64>,
    /// Batches actually processed.
    pub batches: u64,
    #[serde(default)]
    pub cancelled: bool,
}

pub struct BatchEnricher {
    store: Arc<dyn Store>,
    oracle: Arc<dyn ScoringOracle>,
    batch_size: usize,
    delay: Duration,
    cancel: Cancellation,
}

impl BatchEnricher {
    pub fn new(store: Arc<dyn Store>, oracle: Arc<dyn ScoringOracle>, config: &EnrichmentConfig) -> Self {
        Self {
            store,
            oracle,
            batch_size: config.batch_size.max(1),
            delay: Duration::from_millis(config.batch_delay_ms),
            cancel: Cancellation::new(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Score every unscored product.
    ///
    /// Fails up front with [`PipelineError::OracleUnavailable`] when the
    /// oracle cannot be used at all; per-item failures only show up in the
    /// report.
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<EnrichmentReport> {
        self.oracle
            .check_ready()
            .map_err(PipelineError::OracleUnavailable)?;

        let pending = self
            .store
            .unscored_products()
            .await
            .context("loading unscored products")?;
        let total_batches = pending.len().div_ceil(self.batch_size);
        info!(
            items = pending.len(),
            batches = total_batches,
            batch_size = self.batch_size,
            "enrichment starting"
        );

        let mut report = EnrichmentReport::default();
        let mut processed = 0u64;

        for (index, batch) in pending.chunks(self.batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                info!(batch = index + 1, "enrichment cancelled");
                report.cancelled = true;
                break;
            }

            for product in batch {
                processed += 1;
                let text = product.scoring_text();
                if text.is_empty() {
                    warn!(product_id = product.id, "no text to score");
                    report.failed += 1;
                    report.failed_ids.push(product.id);
                    continue;
                }

                let outcome = match self.oracle.score(&text).await {
                    Ok(raw) => match normalize_score(raw) {
                        Ok(score) => self.store.set_sentiment(product.id, score).await.map(|_| score),
                        Err(e) => Err(e),
                    },
                    Err(e) => Err(e.into()),
                };

                match outcome {
                    Ok(score) => {
                        debug!(product_id = product.id, score, "scored");
                        report.analyzed += 1;
                    }
                    Err(e) => {
                        warn!(product_id = product.id, error = %e, "scoring failed, continuing");
                        report.failed += 1;
                        report.failed_ids.push(product.id);
                    }
                }
            }

            report.batches += 1;
            progress.report(ProgressEvent::Batch {
                batch: (index + 1) as u64,
                total_batches: total_batches as u64,
                processed,
            });

            if index + 1 < total_batches && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        info!(
            analyzed = report.analyzed,
            failed = report.failed,
            "enrichment finished"
        );
        Ok(report)
    }
}

/// `scrapqt enrich`.
pub async fn run_enrich(enricher: &BatchEnricher, progress: &dyn ProgressReporter) -> Result<()> {
    let report = enricher.run(progress).await?;
    println!("enrich");
    println!("  batches:  {}", report.batches);
    println!("  analyzed: {}", report.analyzed);
    println!("  failed:   {}", report.failed);
    if !report.failed_ids.is_empty() {
        println!("  failed ids: {:?}", report.failed_ids);
    }
    if report.cancelled {
        println!("  cancelled before all batches ran");
    }
    Ok(())
}
