//! Data models shared by the scraping pipeline, the store, and the RPC
//! services.
//!
//! [`RawItem`] is what a source plugin returns; [`CanonicalItem`] is the
//! normalized, platform-tagged shape that travels to the store; [`Product`]
//! and [`Query`] are the persisted records.

use serde::{Deserialize, Serialize};

/// Listing produced by a source plugin before normalization.
///
/// Only `title` and `link` are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub is_used: Option<bool>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl RawItem {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            ..Default::default()
        }
    }
}

/// Normalized listing ready for persistence.
///
/// `sentiment_score` is `None` until enrichment has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalItem {
    pub title: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub rating_count: i64,
    pub link: String,
    pub platform: String,
    #[serde(default)]
    pub is_used: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    pub query_id: i64,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
}

impl CanonicalItem {
    /// Normalize a plugin item: missing numbers become 0, missing text
    /// becomes empty, and an absent description gets a short generated
    /// blurb so enrichment always has something to score.
    pub fn from_raw(raw: RawItem, platform: &str, query_id: i64) -> Self {
        let description = match raw.description {
            Some(d) if !d.trim().is_empty() => d,
            _ => format!("High-quality {} available on {}", raw.title, platform),
        };
        Self {
            title: raw.title,
            price: raw.price.unwrap_or(0.0),
            rating: raw.rating.unwrap_or(0.0),
            rating_count: raw.rating_count.unwrap_or(0),
            link: raw.link,
            platform: platform.to_string(),
            is_used: raw.is_used.unwrap_or(false),
            description,
            image_url: raw.image_url.unwrap_or_default(),
            query_id,
            sentiment_score: None,
        }
    }
}

/// Canonical product record, one per content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub link: String,
    pub platform: String,
    pub is_used: bool,
    /// Unix seconds.
    pub captured_at: i64,
    pub sentiment_score: Option<f64>,
    pub description: String,
    pub image_url: String,
    /// Query that first discovered this product.
    pub query_id: Option<i64>,
    pub content_hash: String,
}

impl Product {
    /// Text submitted to the scoring oracle.
    pub fn scoring_text(&self) -> String {
        format!("{} {}", self.title, self.description).trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: i64,
    pub text: String,
    pub created_at: i64,
}

/// Directed relationship from a primary query to a linked query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLink {
    pub id: i64,
    pub primary_query_id: i64,
    pub linked_query_id: i64,
    pub relationship_type: String,
    pub created_at: i64,
}

/// Result of one save-items call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// New products written.
    pub inserted: u64,
    /// Items whose content hash already existed and were only linked.
    pub linked: u64,
    /// Items with no link, left out of the batch.
    #[serde(default)]
    pub skipped: u64,
}

impl SaveOutcome {
    pub fn saved(&self) -> u64 {
        self.inserted + self.linked
    }
}

/// A recently issued query with how many products it is linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentQuery {
    pub id: i64,
    pub text: String,
    pub created_at: i64,
    pub product_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCount {
    pub platform: String,
    pub count: i64,
}

/// Aggregate view of the product table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductStats {
    pub total_products: i64,
    pub total_queries: i64,
    pub by_platform: Vec<PlatformCount>,
    /// Average over products with a positive price.
    pub avg_price: Option<f64>,
    pub avg_sentiment: Option<f64>,
    pub scored_products: i64,
    /// Products linked to more than one query.
    pub multi_query_products: i64,
    pub total_links: i64,
}

/// Format a Unix timestamp as ISO 8601 / RFC 3339 UTC.
pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
