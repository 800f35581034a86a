//! Storage abstraction for products, queries, and their linkage.
//!
//! The [`Store`] trait is the deduplication and linkage contract shared by
//! the SQLite backend and the in-memory [`memory::MemoryStore`]:
//!
//! - at most one [`Product`] per content hash;
//! - a product may be linked to any number of queries, each pair once;
//! - query text is unique and case-sensitive.
//!
//! Implementations must be `Send + Sync` to be shared across service
//! handlers and extraction workers.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    CanonicalItem, Product, ProductStats, Query, QueryLink, RecentQuery, SaveOutcome,
};

/// Relationship label used when none is given.
pub const DEFAULT_RELATIONSHIP: &str = "related";

/// Lookup failures that callers map to a "not found" answer.
///
/// Store implementations raise these through `anyhow`; recover them with
/// [`StoreError::find`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("query not found: {0}")]
    QueryNotFound(i64),
    #[error("product not found: {0}")]
    ProductNotFound(i64),
}

impl StoreError {
    /// The `StoreError` inside `err`, if it carries one.
    pub fn find(err: &anyhow::Error) -> Option<&StoreError> {
        err.downcast_ref::<StoreError>()
    }
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save_query`](Store::save_query) | Resolve-or-create a query by text |
/// | [`save_items`](Store::save_items) | Insert new products, link duplicates, atomically |
/// | [`link_product`](Store::link_product) | Idempotent product/query association |
/// | [`link_queries`](Store::link_queries) | Record a directed query relationship |
/// | [`linked_queries`](Store::linked_queries) | Outgoing links of a query |
/// | [`search_products`](Store::search_products) | Products linked to queries matching a term |
/// | [`unscored_products`](Store::unscored_products) | Products awaiting enrichment |
/// | [`set_sentiment`](Store::set_sentiment) | Persist a normalized score |
/// | [`stats`](Store::stats) | Aggregate counts |
/// | [`delete_product`](Store::delete_product) | Remove one product and its links |
/// | [`clear_all`](Store::clear_all) | Empty every table |
#[async_trait]
pub trait Store: Send + Sync {
    /// Return the id of the query with exactly this text, creating it if
    /// absent.
    async fn save_query(&self, text: &str) -> Result<i64>;

    async fn get_query(&self, id: i64) -> Result<Option<Query>>;

    async fn find_query(&self, text: &str) -> Result<Option<Query>>;

    /// Persist a batch of items in one transaction.
    ///
    /// An item whose content hash is already stored is linked to its
    /// `query_id` instead of inserted. An item with no link is counted in
    /// [`SaveOutcome::skipped`] and the rest of the batch proceeds. On
    /// error nothing from the batch is kept.
    async fn save_items(&self, items: &[CanonicalItem]) -> Result<SaveOutcome>;

    /// Associate a product with a query. Returns `false` when the pair was
    /// already present.
    async fn link_product(&self, product_id: i64, query_id: i64) -> Result<bool>;

    /// Record a directed link between two existing queries and return its id.
    async fn link_queries(
        &self,
        primary_query_id: i64,
        linked_query_id: i64,
        relationship_type: &str,
    ) -> Result<i64>;

    async fn linked_queries(&self, primary_query_id: i64) -> Result<Vec<QueryLink>>;

    async fn get_product(&self, id: i64) -> Result<Option<Product>>;

    /// Every query a product is associated with, oldest link first.
    async fn product_queries(&self, product_id: i64) -> Result<Vec<Query>>;

    /// Products linked to any query whose text contains `term`, ignoring
    /// case.
    ///
    /// Falls back to the products' own `query_id` column only when the
    /// junction yields nothing.
    async fn search_products(&self, term: &str) -> Result<Vec<Product>>;

    async fn products_by_platform(&self, platform: &str) -> Result<Vec<Product>>;

    async fn all_products(&self) -> Result<Vec<Product>>;

    /// Products whose sentiment score is unset, in id order.
    async fn unscored_products(&self) -> Result<Vec<Product>>;

    /// Overwrite a product's score. Fails with
    /// [`StoreError::ProductNotFound`] for an unknown id and rejects scores
    /// outside `-1.0..=1.0`.
    async fn set_sentiment(&self, product_id: i64, score: f64) -> Result<()>;

    /// Query texts resembling `term`: substring matches first, then word
    /// prefix matches.
    async fn query_suggestions(&self, term: &str, limit: usize) -> Result<Vec<String>>;

    async fn recent_queries(&self, limit: usize) -> Result<Vec<RecentQuery>>;

    async fn stats(&self) -> Result<ProductStats>;

    /// Distinct platform names of stored products, sorted.
    async fn platforms(&self) -> Result<Vec<String>>;

    /// Remove a product together with its query associations. Returns
    /// `false` when no such product exists.
    async fn delete_product(&self, product_id: i64) -> Result<bool>;

    /// Remove every product, query, and link.
    async fn clear_all(&self) -> Result<()>;
}

/// Whether `text` has a word starting with any word of `term`.
///
/// Shared by store implementations for the second tier of query
/// suggestions.
pub fn word_prefix_match(text: &str, term: &str) -> bool {
    let text = text.to_lowercase();
    let term = term.to_lowercase();
    term.split_whitespace()
        .any(|needle| text.split_whitespace().any(|word| word.starts_with(needle)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_survives_context() {
        use anyhow::Context;
        let err: Result<()> = Err(anyhow::Error::from(StoreError::QueryNotFound(7)));
        let err = err.context("linking queries").unwrap_err();
        assert!(matches!(
            StoreError::find(&err),
            Some(StoreError::QueryNotFound(7))
        ));
        assert!(StoreError::find(&anyhow::anyhow!("query not found: 7")).is_none());
    }

    #[test]
    fn word_prefix_matches_any_word() {
        assert!(word_prefix_match("gaming mouse wireless", "wire"));
        assert!(word_prefix_match("Gaming Mouse", "gam"));
        assert!(!word_prefix_match("gaming mouse", "ouse"));
        assert!(!word_prefix_match("gaming mouse", ""));
    }
}
