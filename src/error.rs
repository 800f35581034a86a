//! Error taxonomy for the scraping pipeline.
//!
//! Failures local to one unit of work (an item, a plugin, a linked query)
//! are absorbed into report counters by their callers. Failures affecting a
//! whole request ([`PipelineError::StoreTransaction`], a missing oracle
//! credential) surface to the RPC caller.
//!
//! A content-hash collision is not represented here: the store handles it
//! by linking the existing product.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while producing one item on the extraction path.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("page unreachable: {0}")]
    Unreachable(String),
    #[error("no title found on page")]
    MissingTitle,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors from the external scoring oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("GEMINI_API_KEY is not set")]
    MissingCredential,
    #[error("scoring oracle rejected the request: {0}")]
    Rejected(String),
    #[error("scoring oracle returned an unusable score: {0:?}")]
    InvalidScore(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl OracleError {
    /// Whether the failure means no call can ever succeed until
    /// configuration changes.
    pub fn is_precondition(&self) -> bool {
        matches!(self, OracleError::MissingCredential)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("plugin {platform} failed: {source}")]
    PluginFailure {
        platform: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("extraction failed for {url}: {source}")]
    Extraction {
        url: String,
        #[source]
        source: ExtractionError,
    },
    #[error("store transaction failed: {0}")]
    StoreTransaction(#[source] anyhow::Error),
    #[error(transparent)]
    OracleUnavailable(#[from] OracleError),
    #[error("query {query_id} could not be resolved")]
    LinkResolution { query_id: i64 },
}
