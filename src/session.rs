//! Fetch sessions and the session pool used by page-driven plugins.
//!
//! A [`FetchSession`] is one isolated browsing context: it loads a page and
//! hands back rendered HTML. Sessions are expensive, so extraction workers
//! borrow them from a [`SessionPool`] through a [`SessionLease`]. The lease
//! returns its session to the pool on drop only if the worker marked it
//! healthy with [`SessionLease::recycle`]; a lease dropped by a timeout or a
//! panic tears its session down instead.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::config::ExtractionConfig;

/// One isolated page-loading context.
#[async_trait]
pub trait FetchSession: Send {
    /// Navigate to `url` and return the page HTML.
    async fn load(&mut self, url: &str) -> Result<String>;
}

/// Creates new sessions when the pool has none idle.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn FetchSession>>;
}

// ═══════════════════════════════════════════════════════════════════════
// HTTP session
// ═══════════════════════════════════════════════════════════════════════

/// Session backed by a dedicated `reqwest` client with its own cookie-less
/// connection pool.
pub struct HttpSession {
    client: reqwest::Client,
}

impl HttpSession {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("building HTTP session")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FetchSession for HttpSession {
    async fn load(&mut self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{} returned HTTP {}", url, status);
        }
        Ok(response.text().await?)
    }
}

pub struct HttpSessionFactory {
    config: ExtractionConfig,
}

impl HttpSessionFactory {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn create(&self) -> Result<Box<dyn FetchSession>> {
        Ok(Box::new(HttpSession::new(&self.config)?))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Pool
// ═══════════════════════════════════════════════════════════════════════

/// Bounded pool of reusable sessions.
///
/// At most `capacity` sessions exist at once; `acquire` waits for a free
/// slot.
pub struct SessionPool {
    factory: Arc<dyn SessionFactory>,
    idle: Arc<Mutex<Vec<Box<dyn FetchSession>>>>,
    slots: Arc<Semaphore>,
}

impl SessionPool {
    pub fn new(factory: Arc<dyn SessionFactory>, capacity: usize) -> Self {
        Self {
            factory,
            idle: Arc::new(Mutex::new(Vec::new())),
            slots: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    /// Borrow a session, reusing an idle one when available.
    pub async fn acquire(&self) -> Result<SessionLease> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| anyhow!("session pool closed"))?;

        let reused = self
            .idle
            .lock()
            .map_err(|_| anyhow!("session pool lock poisoned"))?
            .pop();

        let session = match reused {
            Some(s) => s,
            None => {
                debug!("creating fetch session");
                self.factory.create().await?
            }
        };

        Ok(SessionLease {
            session: Some(session),
            idle: self.idle.clone(),
            healthy: false,
            _permit: permit,
        })
    }

    /// Sessions currently parked for reuse.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|v| v.len()).unwrap_or(0)
    }
}

/// Scoped ownership of one pooled session.
pub struct SessionLease {
    session: Option<Box<dyn FetchSession>>,
    idle: Arc<Mutex<Vec<Box<dyn FetchSession>>>>,
    healthy: bool,
    _permit: OwnedSemaphorePermit,
}

impl SessionLease {
    pub async fn load(&mut self, url: &str) -> Result<String> {
        match self.session.as_mut() {
            Some(s) => s.load(url).await,
            None => Err(anyhow!("session already released")),
        }
    }

    /// Mark the session as fit for reuse once this lease drops.
    pub fn recycle(&mut self) {
        self.healthy = true;
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if !self.healthy {
            debug!("tearing down fetch session");
            return;
        }
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(session);
        }
    }
}
