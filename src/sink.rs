//! Where scraped items go.
//!
//! The orchestrator and expander only need four store operations. They talk
//! to an [`ItemSink`], which is either a local [`Store`] (every store is a
//! sink) or the remote Store service through [`crate::client::StoreClient`].

use anyhow::Result;
use async_trait::async_trait;

use scrapqt_core::models::{CanonicalItem, Query, QueryLink, SaveOutcome};
use scrapqt_core::store::Store;

#[async_trait]
pub trait ItemSink: Send + Sync {
    /// Resolve-or-create the query with this text.
    async fn resolve_query(&self, text: &str) -> Result<i64>;

    async fn lookup_query(&self, id: i64) -> Result<Option<Query>>;

    /// Save a batch atomically; duplicates are linked, not re-inserted.
    async fn persist_items(&self, items: &[CanonicalItem]) -> Result<SaveOutcome>;

    async fn query_links(&self, primary_query_id: i64) -> Result<Vec<QueryLink>>;
}

#[async_trait]
impl<S: Store + ?Sized> ItemSink for S {
    async fn resolve_query(&self, text: &str) -> Result<i64> {
        self.save_query(text).await
    }

    async fn lookup_query(&self, id: i64) -> Result<Option<Query>> {
        self.get_query(id).await
    }

    async fn persist_items(&self, items: &[CanonicalItem]) -> Result<SaveOutcome> {
        self.save_items(items).await
    }

    async fn query_links(&self, primary_query_id: i64) -> Result<Vec<QueryLink>> {
        self.linked_queries(primary_query_id).await
    }
}
