//! Request and response bodies shared by the HTTP services and
//! [`crate::client::StoreClient`].
//!
//! All error responses use one shape:
//!
//! ```json
//! { "error": { "code": "failed_precondition", "message": "GEMINI_API_KEY is not set" } }
//! ```

use serde::{Deserialize, Serialize};

use scrapqt_core::models::CanonicalItem;
use scrapqt_core::store::DEFAULT_RELATIONSHIP;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. `"bad_request"`, `"not_found"`).
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ── Scraper service ──────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PluginInfo {
    pub platform: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PluginsResponse {
    pub plugins: Vec<PluginInfo>,
}

// ── Store service ────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Raw oracle score, 1..=10.
    pub score: i64,
    /// Score mapped onto -1.0..=1.0.
    pub normalized: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeDatabaseResponse {
    pub items_analyzed: u64,
    pub items_failed: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveItemsRequest {
    pub items: Vec<CanonicalItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveItemsResponse {
    pub success: bool,
    pub items_saved: u64,
    #[serde(default)]
    pub inserted: u64,
    #[serde(default)]
    pub linked: u64,
    /// Items left out for having no link.
    #[serde(default)]
    pub skipped: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveQueryRequest {
    pub query_text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveQueryResponse {
    pub query_id: i64,
}

fn default_relationship() -> String {
    DEFAULT_RELATIONSHIP.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkQueriesRequest {
    pub primary_query_id: i64,
    pub linked_query_id: i64,
    #[serde(default = "default_relationship")]
    pub relationship_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkQueriesResponse {
    pub success: bool,
    pub link_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchParams {
    pub term: String,
}
