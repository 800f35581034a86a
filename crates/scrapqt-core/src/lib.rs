//! # scrapqt core
//!
//! Backend-independent logic shared by the scraping services: product and
//! query models, the content hash used as the deduplication key, sentiment
//! score normalization, and the [`store::Store`] abstraction with an
//! in-memory implementation.
//!
//! This crate carries no tokio, sqlx, HTTP, or HTML parsing dependencies.

pub mod hash;
pub mod models;
pub mod score;
pub mod store;

pub use hash::content_hash;
pub use score::normalize_score;
