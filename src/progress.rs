//! Scrape and enrichment progress reporting.
//!
//! Progress goes to **stderr** so stdout stays parseable for scripts. The
//! orchestrator reports one event per plugin plus one for the store write;
//! the enricher reports one event per batch.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// A plugin started scraping `query`.
    PluginStarted { platform: String, query: String },
    /// A plugin finished; `failed` when it returned an error.
    PluginFinished {
        platform: String,
        items: u64,
        failed: bool,
    },
    /// Items for `query` were written to the store.
    Saved { query: String, saved: u64, total: u64 },
    /// Enrichment batch `batch` of `total_batches` is done; `processed`
    /// items so far.
    Batch {
        batch: u64,
        total_batches: u64,
        processed: u64,
    },
}

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "enrich  batch 3 / 12  30 items".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::PluginStarted { platform, query } => {
                format!("scrape {}  \"{}\"...\n", platform, query)
            }
            ProgressEvent::PluginFinished {
                platform,
                items,
                failed,
            } => {
                if *failed {
                    format!("scrape {}  failed\n", platform)
                } else {
                    format!("scrape {}  {} items\n", platform, format_number(*items))
                }
            }
            ProgressEvent::Saved { query, saved, total } => format!(
                "save \"{}\"  {} / {} items\n",
                query,
                format_number(*saved),
                format_number(*total)
            ),
            ProgressEvent::Batch {
                batch,
                total_batches,
                processed,
            } => format!(
                "enrich  batch {} / {}  {} items\n",
                batch,
                total_batches,
                format_number(*processed)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::PluginStarted { platform, query } => serde_json::json!({
                "event": "progress",
                "phase": "scraping",
                "platform": platform,
                "query": query
            }),
            ProgressEvent::PluginFinished {
                platform,
                items,
                failed,
            } => serde_json::json!({
                "event": "progress",
                "phase": "scraped",
                "platform": platform,
                "items": items,
                "failed": failed
            }),
            ProgressEvent::Saved { query, saved, total } => serde_json::json!({
                "event": "progress",
                "phase": "saved",
                "query": query,
                "saved": saved,
                "total": total
            }),
            ProgressEvent::Batch {
                batch,
                total_batches,
                processed,
            } => serde_json::json!({
                "event": "progress",
                "phase": "enriching",
                "batch": batch,
                "total_batches": total_batches,
                "processed": processed
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
