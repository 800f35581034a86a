//! In-memory [`Store`] implementation for tests and dry runs.
//!
//! All state lives in one struct behind a `std::sync::RwLock`. `save_items`
//! works on a copy and swaps it in only when the whole batch succeeded,
//! which gives the same all-or-nothing behavior as the SQLite transaction.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::hash::content_hash;
use crate::score::is_normalized;
use crate::models::{
    CanonicalItem, PlatformCount, Product, ProductStats, Query, QueryLink, RecentQuery,
    SaveOutcome,
};

use super::{word_prefix_match, Store, StoreError};

#[derive(Clone, Default)]
struct Inner {
    products: Vec<Product>,
    by_hash: HashMap<String, i64>,
    queries: Vec<Query>,
    /// (product_id, query_id, created_at)
    product_queries: Vec<(i64, i64, i64)>,
    links: Vec<QueryLink>,
    next_product_id: i64,
    next_query_id: i64,
    next_link_id: i64,
}

impl Inner {
    fn link(&mut self, product_id: i64, query_id: i64) -> bool {
        if self
            .product_queries
            .iter()
            .any(|(p, q, _)| *p == product_id && *q == query_id)
        {
            return false;
        }
        self.product_queries.push((product_id, query_id, now()));
        true
    }

    fn query(&self, id: i64) -> Option<&Query> {
        self.queries.iter().find(|q| q.id == id)
    }

    fn product(&self, id: i64) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }
}

/// In-memory store.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_product_id: 1,
                next_query_id: 1,
                next_link_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Number of (product, query) associations.
    pub fn link_count(&self) -> usize {
        self.read().map(|i| i.product_queries.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn newest_first(mut products: Vec<Product>) -> Vec<Product> {
    products.sort_by(|a, b| b.captured_at.cmp(&a.captured_at).then(b.id.cmp(&a.id)));
    products
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_query(&self, text: &str) -> Result<i64> {
        let mut inner = self.write()?;
        if let Some(q) = inner.queries.iter().find(|q| q.text == text) {
            return Ok(q.id);
        }
        let id = inner.next_query_id;
        inner.next_query_id += 1;
        inner.queries.push(Query {
            id,
            text: text.to_string(),
            created_at: now(),
        });
        Ok(id)
    }

    async fn get_query(&self, id: i64) -> Result<Option<Query>> {
        Ok(self.read()?.query(id).cloned())
    }

    async fn find_query(&self, text: &str) -> Result<Option<Query>> {
        Ok(self.read()?.queries.iter().find(|q| q.text == text).cloned())
    }

    async fn save_items(&self, items: &[CanonicalItem]) -> Result<SaveOutcome> {
        let mut guard = self.write()?;
        let mut work = guard.clone();
        let mut outcome = SaveOutcome::default();

        for item in items {
            let hash = content_hash(&item.link);
            if hash.is_empty() {
                warn!(title = %item.title, "item has no link, skipping");
                outcome.skipped += 1;
                continue;
            }
            let product_id = match work.by_hash.get(&hash).copied() {
                Some(id) => {
                    outcome.linked += 1;
                    id
                }
                None => {
                    let id = work.next_product_id;
                    work.next_product_id += 1;
                    work.products.push(Product {
                        id,
                        title: item.title.clone(),
                        price: Some(item.price),
                        rating: Some(item.rating),
                        rating_count: Some(item.rating_count),
                        link: item.link.clone(),
                        platform: item.platform.clone(),
                        is_used: item.is_used,
                        captured_at: now(),
                        sentiment_score: item.sentiment_score.filter(|s| *s != 0.0),
                        description: item.description.clone(),
                        image_url: item.image_url.clone(),
                        query_id: Some(item.query_id),
                        content_hash: hash.clone(),
                    });
                    work.by_hash.insert(hash, id);
                    outcome.inserted += 1;
                    id
                }
            };
            work.link(product_id, item.query_id);
        }

        *guard = work;
        Ok(outcome)
    }

    async fn link_product(&self, product_id: i64, query_id: i64) -> Result<bool> {
        Ok(self.write()?.link(product_id, query_id))
    }

    async fn link_queries(
        &self,
        primary_query_id: i64,
        linked_query_id: i64,
        relationship_type: &str,
    ) -> Result<i64> {
        let mut inner = self.write()?;
        for id in [primary_query_id, linked_query_id] {
            if inner.query(id).is_none() {
                bail!(StoreError::QueryNotFound(id));
            }
        }
        let id = inner.next_link_id;
        inner.next_link_id += 1;
        inner.links.push(QueryLink {
            id,
            primary_query_id,
            linked_query_id,
            relationship_type: relationship_type.to_string(),
            created_at: now(),
        });
        Ok(id)
    }

    async fn linked_queries(&self, primary_query_id: i64) -> Result<Vec<QueryLink>> {
        Ok(self
            .read()?
            .links
            .iter()
            .filter(|l| l.primary_query_id == primary_query_id)
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        Ok(self.read()?.product(id).cloned())
    }

    async fn product_queries(&self, product_id: i64) -> Result<Vec<Query>> {
        let inner = self.read()?;
        let mut rows: Vec<&(i64, i64, i64)> = inner
            .product_queries
            .iter()
            .filter(|(p, _, _)| *p == product_id)
            .collect();
        rows.sort_by_key(|(_, _, ts)| *ts);
        Ok(rows
            .into_iter()
            .filter_map(|(_, q, _)| inner.query(*q).cloned())
            .collect())
    }

    async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        let inner = self.read()?;
        let needle = term.to_lowercase();
        let query_ids: Vec<i64> = inner
            .queries
            .iter()
            .filter(|q| q.text.to_lowercase().contains(&needle))
            .map(|q| q.id)
            .collect();

        let mut linked: Vec<Product> = inner
            .products
            .iter()
            .filter(|p| {
                inner
                    .product_queries
                    .iter()
                    .any(|(pid, qid, _)| *pid == p.id && query_ids.contains(qid))
            })
            .cloned()
            .collect();

        if linked.is_empty() {
            linked = inner
                .products
                .iter()
                .filter(|p| p.query_id.is_some_and(|q| query_ids.contains(&q)))
                .cloned()
                .collect();
        }
        Ok(newest_first(linked))
    }

    async fn products_by_platform(&self, platform: &str) -> Result<Vec<Product>> {
        let inner = self.read()?;
        Ok(newest_first(
            inner
                .products
                .iter()
                .filter(|p| p.platform == platform)
                .cloned()
                .collect(),
        ))
    }

    async fn all_products(&self) -> Result<Vec<Product>> {
        Ok(self.read()?.products.clone())
    }

    async fn unscored_products(&self) -> Result<Vec<Product>> {
        Ok(self
            .read()?
            .products
            .iter()
            .filter(|p| p.sentiment_score.is_none())
            .cloned()
            .collect())
    }

    async fn set_sentiment(&self, product_id: i64, score: f64) -> Result<()> {
        if !is_normalized(score) {
            bail!("sentiment {} outside -1.0..=1.0", score);
        }
        let mut inner = self.write()?;
        let product = inner
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        product.sentiment_score = Some(score);
        Ok(())
    }

    async fn query_suggestions(&self, term: &str, limit: usize) -> Result<Vec<String>> {
        let inner = self.read()?;
        let needle = term.to_lowercase();
        let mut by_recency: Vec<&Query> = inner.queries.iter().collect();
        by_recency.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let mut out: Vec<String> = Vec::new();
        for q in &by_recency {
            if q.text.to_lowercase().contains(&needle) && !out.contains(&q.text) {
                out.push(q.text.clone());
            }
        }
        for q in &by_recency {
            if word_prefix_match(&q.text, term) && !out.contains(&q.text) {
                out.push(q.text.clone());
            }
        }
        out.truncate(limit);
        Ok(out)
    }

    async fn recent_queries(&self, limit: usize) -> Result<Vec<RecentQuery>> {
        let inner = self.read()?;
        let mut rows: Vec<RecentQuery> = inner
            .queries
            .iter()
            .map(|q| RecentQuery {
                id: q.id,
                text: q.text.clone(),
                created_at: q.created_at,
                product_count: inner
                    .product_queries
                    .iter()
                    .filter(|(_, qid, _)| *qid == q.id)
                    .count() as i64,
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn stats(&self) -> Result<ProductStats> {
        let inner = self.read()?;

        let mut by_platform: HashMap<&str, i64> = HashMap::new();
        for p in &inner.products {
            *by_platform.entry(p.platform.as_str()).or_default() += 1;
        }
        let mut by_platform: Vec<PlatformCount> = by_platform
            .into_iter()
            .map(|(platform, count)| PlatformCount {
                platform: platform.to_string(),
                count,
            })
            .collect();
        by_platform.sort_by(|a, b| b.count.cmp(&a.count).then(a.platform.cmp(&b.platform)));

        let prices: Vec<f64> = inner
            .products
            .iter()
            .filter_map(|p| p.price.filter(|v| *v > 0.0))
            .collect();
        let scores: Vec<f64> = inner
            .products
            .iter()
            .filter_map(|p| p.sentiment_score)
            .collect();

        let mut per_product: HashMap<i64, i64> = HashMap::new();
        for (pid, _, _) in &inner.product_queries {
            *per_product.entry(*pid).or_default() += 1;
        }

        Ok(ProductStats {
            total_products: inner.products.len() as i64,
            total_queries: inner.queries.len() as i64,
            by_platform,
            avg_price: mean(&prices),
            avg_sentiment: mean(&scores),
            scored_products: scores.len() as i64,
            multi_query_products: per_product.values().filter(|n| **n > 1).count() as i64,
            total_links: inner.product_queries.len() as i64,
        })
    }

    async fn platforms(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .read()?
            .products
            .iter()
            .map(|p| p.platform.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn delete_product(&self, product_id: i64) -> Result<bool> {
        let mut inner = self.write()?;
        let Some(pos) = inner.products.iter().position(|p| p.id == product_id) else {
            return Ok(false);
        };
        let removed = inner.products.remove(pos);
        inner.by_hash.remove(&removed.content_hash);
        inner.product_queries.retain(|(p, _, _)| *p != product_id);
        Ok(true)
    }

    async fn clear_all(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.products.clear();
        inner.by_hash.clear();
        inner.queries.clear();
        inner.product_queries.clear();
        inner.links.clear();
        Ok(())
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
