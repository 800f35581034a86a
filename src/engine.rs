//! Parallel extraction engine: the second phase of a page-driven scrape.
//!
//! Discovered detail URLs are fanned out over a bounded number of workers.
//! Every worker borrows one session from the [`SessionPool`], loads exactly
//! one page and parses it. Each item runs under its own timeout, counted
//! from the moment its session is leased; a timed out item becomes an [`ExtractionError::Timeout`] and its session is torn
//! down with the dropped lease. Failures never cross item boundaries.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use url::Url;

use scrapqt_core::models::RawItem;

use crate::error::ExtractionError;
use crate::extract::parse_product;
use crate::session::SessionPool;

/// Outcome of one extraction run.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Successfully parsed items, in discovery order.
    pub items: Vec<RawItem>,
    /// Items that were fenced out, with the URL that produced them.
    pub errors: Vec<(String, ExtractionError)>,
}

impl ExtractionReport {
    pub fn attempted(&self) -> usize {
        self.items.len() + self.errors.len()
    }
}

pub struct ExtractionEngine {
    pool: Arc<SessionPool>,
    base: Url,
    workers: usize,
    item_timeout: Duration,
}

impl ExtractionEngine {
    pub fn new(pool: Arc<SessionPool>, base: Url, workers: usize, item_timeout: Duration) -> Self {
        Self {
            pool,
            base,
            workers: workers.max(1),
            item_timeout,
        }
    }

    /// Extract every URL, at most `workers` at a time.
    pub async fn extract_all(&self, urls: Vec<String>) -> ExtractionReport {
        let total = urls.len();
        let completed = Mutex::new(0usize);

        let mut outcomes: Vec<(usize, String, Result<RawItem, ExtractionError>)> =
            stream::iter(urls.into_iter().enumerate())
                .map(|(index, url)| {
                    let completed = &completed;
                    async move {
                        let result = self.extract_one(&url).await;
                        let done = match completed.lock() {
                            Ok(mut n) => {
                                *n += 1;
                                *n
                            }
                            Err(_) => 0,
                        };
                        match &result {
                            Ok(item) => info!("[{}/{}] extracted: {}", done, total, item.title),
                            Err(e) => warn!(url = %url, error = %e, "[{}/{}] extraction failed", done, total),
                        }
                        (index, url, result)
                    }
                })
                .buffer_unordered(self.workers)
                .collect()
                .await;

        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut report = ExtractionReport::default();
        for (_, url, result) in outcomes {
            match result {
                Ok(item) => report.items.push(item),
                Err(e) => report.errors.push((url, e)),
            }
        }
        info!(
            extracted = report.items.len(),
            failed = report.errors.len(),
            "extraction finished"
        );
        report
    }

    /// Waiting for a session does not count against the item timeout; the
    /// clock starts once a lease is held.
    async fn extract_one(&self, url: &str) -> Result<RawItem, ExtractionError> {
        let mut lease = self
            .pool
            .acquire()
            .await
            .map_err(|e| ExtractionError::Unreachable(e.to_string()))?;

        let work = async {
            let html = lease
                .load(url)
                .await
                .map_err(|e| ExtractionError::Unreachable(e.to_string()))?;
            parse_product(&html, url, &self.base)
        };

        let outcome = tokio::time::timeout(self.item_timeout, work).await;
        match outcome {
            Ok(Ok(item)) => {
                lease.recycle();
                Ok(item)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                debug!(url, "item timed out, discarding session");
                Err(ExtractionError::Timeout(self.item_timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FetchSession, SessionFactory};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a detail page for every URL, except that URLs containing
    /// "slow" hang and URLs containing "blank" have no title.
    struct StubSession;

    #[async_trait]
    impl FetchSession for StubSession {
        async fn load(&mut self, url: &str) -> Result<String> {
            if url.contains("slow") {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if url.contains("steady") {
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
            if url.contains("down") {
                anyhow::bail!("connection refused");
            }
            if url.contains("blank") {
                return Ok("<html><body><p>nothing</p></body></html>".into());
            }
            Ok(format!(
                r#"<h1 data-testid="lblPDPDetailProductName">Item {}</h1>
                   <div data-testid="lblPDPDetailProductPrice">Rp10.000</div>"#,
                url.rsplit('/').next().unwrap_or_default()
            ))
        }
    }

    struct StubFactory(AtomicUsize);

    #[async_trait]
    impl SessionFactory for StubFactory {
        async fn create(&self) -> Result<Box<dyn FetchSession>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubSession))
        }
    }

    fn engine(factory: Arc<StubFactory>, workers: usize) -> (ExtractionEngine, Arc<SessionPool>) {
        let pool = Arc::new(SessionPool::new(factory, workers));
        let engine = ExtractionEngine::new(
            pool.clone(),
            Url::parse("https://shop.example").unwrap(),
            workers,
            Duration::from_millis(200),
        );
        (engine, pool)
    }

    fn urls(slugs: &[&str]) -> Vec<String> {
        slugs
            .iter()
            .map(|s| format!("https://shop.example/store/{}", s))
            .collect()
    }

    #[tokio::test]
    async fn one_timeout_out_of_five() {
        let factory = Arc::new(StubFactory(AtomicUsize::new(0)));
        let (engine, pool) = engine(factory, 5);

        let report = engine
            .extract_all(urls(&["a", "b", "slow", "c", "d"]))
            .await;

        assert_eq!(report.items.len(), 4);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].0.ends_with("/slow"));
        assert!(matches!(report.errors[0].1, ExtractionError::Timeout(_)));
        let titles: Vec<_> = report.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Item a", "Item b", "Item c", "Item d"]);
        // the timed-out session is not returned to the pool
        assert_eq!(pool.idle_count(), 4);
    }

    #[tokio::test]
    async fn failures_are_fenced_per_item() {
        let factory = Arc::new(StubFactory(AtomicUsize::new(0)));
        let (engine, _pool) = engine(factory, 2);

        let report = engine.extract_all(urls(&["a", "blank", "down", "b"])).await;

        assert_eq!(report.attempted(), 4);
        assert_eq!(report.items.len(), 2);
        assert!(report
            .errors
            .iter()
            .any(|(u, e)| u.ends_with("/blank") && matches!(e, ExtractionError::MissingTitle)));
        assert!(report
            .errors
            .iter()
            .any(|(u, e)| u.ends_with("/down") && matches!(e, ExtractionError::Unreachable(_))));
    }

    #[tokio::test]
    async fn sessions_are_bounded_by_worker_count() {
        let factory = Arc::new(StubFactory(AtomicUsize::new(0)));
        let (engine, _pool) = engine(factory.clone(), 2);

        let slugs: Vec<String> = (0..10).map(|i| format!("p{}", i)).collect();
        let slugs: Vec<&str> = slugs.iter().map(String::as_str).collect();
        let report = engine.extract_all(urls(&slugs)).await;

        assert_eq!(report.items.len(), 10);
        assert!(factory.0.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_for_a_session_does_not_use_up_the_timeout() {
        let factory = Arc::new(StubFactory(AtomicUsize::new(0)));
        // Three workers share one session; each load takes 150ms of a
        // 200ms budget, so the last item waits 300ms for its lease.
        let pool = Arc::new(SessionPool::new(factory.clone(), 1));
        let engine = ExtractionEngine::new(
            pool,
            Url::parse("https://shop.example").unwrap(),
            3,
            Duration::from_millis(200),
        );

        let report = engine
            .extract_all(urls(&["steady-1", "steady-2", "steady-3"]))
            .await;

        assert_eq!(report.items.len(), 3, "errors: {:?}", report.errors);
        assert_eq!(factory.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_work_list() {
        let factory = Arc::new(StubFactory(AtomicUsize::new(0)));
        let (engine, _pool) = engine(factory, 3);
        let report = engine.extract_all(Vec::new()).await;
        assert_eq!(report.attempted(), 0);
    }
}
