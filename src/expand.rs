//! Linked-query expansion.
//!
//! Walks the directed query-link graph depth-first from a primary query and
//! scrapes every reachable linked query, attributing its items to the
//! linked query's own id. A visited set per expansion guarantees
//! termination when the graph has cycles.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::ingest::{ScrapeOrchestrator, ScrapeReport};
use crate::progress::{NoProgress, ProgressReporter};

/// One linked query that was scraped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedScrape {
    /// Query whose link led here.
    pub via_query_id: i64,
    pub relationship_type: String,
    pub report: ScrapeReport,
}

/// A branch that could not be followed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkFailure {
    pub query_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpansionReport {
    pub primary_query_id: i64,
    /// Scrape of the primary query itself, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<ScrapeReport>,
    /// Linked queries in the order they were scraped.
    pub linked: Vec<LinkedScrape>,
    /// Ids reached more than once; expanded only the first time.
    pub skipped: Vec<i64>,
    pub failures: Vec<LinkFailure>,
    #[serde(default)]
    pub cancelled: bool,
}

impl ExpansionReport {
    pub fn items_scraped(&self) -> u64 {
        self.primary.as_ref().map(|p| p.items_scraped).unwrap_or(0)
            + self.linked.iter().map(|l| l.report.items_scraped).sum::<u64>()
    }
}

pub struct LinkedQueryExpander {
    orchestrator: Arc<ScrapeOrchestrator>,
}

struct Pending {
    query_id: i64,
    via_query_id: i64,
    relationship_type: String,
}

impl LinkedQueryExpander {
    pub fn new(orchestrator: Arc<ScrapeOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Scrape `query` and then every query reachable from it.
    pub async fn scrape_with_links(
        &self,
        query: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<ExpansionReport> {
        let primary = self.orchestrator.run_with_progress(query, progress).await?;
        let mut report = self.expand_with_progress(primary.query_id, progress).await?;
        report.primary = Some(primary);
        Ok(report)
    }

    /// Scrape every query reachable from `primary_query_id`, not including
    /// the primary itself.
    pub async fn expand(&self, primary_query_id: i64) -> Result<ExpansionReport> {
        self.expand_with_progress(primary_query_id, &NoProgress).await
    }

    pub async fn expand_with_progress(
        &self,
        primary_query_id: i64,
        progress: &dyn ProgressReporter,
    ) -> Result<ExpansionReport> {
        let sink = self.orchestrator.sink();
        if sink.lookup_query(primary_query_id).await?.is_none() {
            bail!(PipelineError::LinkResolution {
                query_id: primary_query_id
            });
        }

        let mut report = ExpansionReport {
            primary_query_id,
            ..ExpansionReport::default()
        };
        let mut visited: HashSet<i64> = HashSet::from([primary_query_id]);
        let mut stack: Vec<Pending> = Vec::new();
        self.push_links(primary_query_id, &mut stack, &mut report).await;

        while let Some(next) = stack.pop() {
            if self.orchestrator.cancellation().is_cancelled() {
                info!(primary_query_id, "expansion cancelled");
                report.cancelled = true;
                break;
            }
            if !visited.insert(next.query_id) {
                report.skipped.push(next.query_id);
                continue;
            }

            let query = match sink.lookup_query(next.query_id).await {
                Ok(Some(q)) => q,
                Ok(None) => {
                    let err = PipelineError::LinkResolution {
                        query_id: next.query_id,
                    };
                    warn!(via = next.via_query_id, error = %err, "skipping branch");
                    report.failures.push(LinkFailure {
                        query_id: next.query_id,
                        message: err.to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    warn!(query_id = next.query_id, error = %e, "query lookup failed, skipping branch");
                    report.failures.push(LinkFailure {
                        query_id: next.query_id,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            info!(
                query_id = query.id,
                via = next.via_query_id,
                relationship = %next.relationship_type,
                "scraping linked query: {}",
                query.text
            );
            let scrape = self.orchestrator.run_for(query.id, &query.text, progress).await;
            report.linked.push(LinkedScrape {
                via_query_id: next.via_query_id,
                relationship_type: next.relationship_type,
                report: scrape,
            });

            self.push_links(query.id, &mut stack, &mut report).await;
        }

        info!(
            primary_query_id,
            linked = report.linked.len(),
            skipped = report.skipped.len(),
            failures = report.failures.len(),
            "expansion finished"
        );
        Ok(report)
    }

    /// Queue the outgoing links of `query_id` so they pop in stored order.
    async fn push_links(&self, query_id: i64, stack: &mut Vec<Pending>, report: &mut ExpansionReport) {
        match self.orchestrator.sink().query_links(query_id).await {
            Ok(links) => {
                for link in links.into_iter().rev() {
                    stack.push(Pending {
                        query_id: link.linked_query_id,
                        via_query_id: query_id,
                        relationship_type: link.relationship_type,
                    });
                }
            }
            Err(e) => {
                warn!(query_id, error = %e, "could not read query links");
                report.failures.push(LinkFailure {
                    query_id,
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Print an expansion report the way `scrapqt expand` shows it.
pub fn print_report(report: &ExpansionReport) {
    if let Some(primary) = &report.primary {
        crate::ingest::print_report(primary);
    }
    if report.linked.is_empty() {
        println!("no linked queries for query {}", report.primary_query_id);
    }
    for l in &report.linked {
        println!(
            "linked via {} ({}):",
            l.via_query_id, l.relationship_type
        );
        crate::ingest::print_report(&l.report);
    }
    for f in &report.failures {
        println!("  skipped query {}: {}", f.query_id, f.message);
    }
    if !report.skipped.is_empty() {
        println!("  already expanded: {:?}", report.skipped);
    }
    println!("total saved: {}", report.items_scraped());
}
