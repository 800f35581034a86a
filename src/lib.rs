//! # scrapqt
//!
//! Plugin-driven product scraping with content-addressed deduplication,
//! query linkage, and batched sentiment enrichment.
//!
//! A query fans out to every enabled source plugin. Each plugin turns the
//! query into raw product records; the orchestrator canonicalizes them and
//! hands the batch to a store that inserts new products and links known
//! ones to the query. A separate enrichment pass scores unscored products
//! with an external model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │   Plugins   │──▶│ Orchestrator │──▶│  SQLite   │
//! │ catalog/web │   │ dedup + link │   │ products  │
//! └─────────────┘   └──────────────┘   └─────┬─────┘
//!                                            │
//!                      ┌─────────────────────┤
//!                      ▼                     ▼
//!                 ┌──────────┐         ┌──────────┐
//!                 │   CLI    │         │   HTTP   │
//!                 │(scrapqt) │         │ services │
//!                 └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scrapqt init                          # create database
//! scrapqt scrape "gaming mouse"         # run every plugin
//! scrapqt link "gaming mouse" "mousepad"
//! scrapqt expand "gaming mouse"         # scrape linked queries too
//! scrapqt enrich                        # score unscored products
//! scrapqt search mouse
//! scrapqt serve store                   # start the Store service
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`plugins`] | Source plugin trait and registry |
//! | [`plugin_catalog`] | Built-in catalog plugins |
//! | [`plugin_marketplace`] | Two-phase web marketplace plugin |
//! | [`session`] | Bounded pool of page sessions |
//! | [`discovery`] | Product link discovery |
//! | [`extract`] | Product page parsing |
//! | [`engine`] | Parallel per-item extraction |
//! | [`ingest`] | Scrape orchestration |
//! | [`expand`] | Linked-query expansion |
//! | [`oracle`] | Scoring oracle (Gemini) |
//! | [`enrich`] | Batched sentiment enrichment |
//! | [`sqlite_store`] | SQLite store backend |
//! | [`maintenance`] | Product deletion and database wipe |
//! | [`server`] | Store and Scraper HTTP services |
//! | [`client`] | Store service client |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod api;
pub mod cancel;
pub mod client;
pub mod config;
pub mod db;
pub mod discovery;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod expand;
pub mod export;
pub mod extract;
pub mod get;
pub mod ingest;
pub mod maintenance;
pub mod migrate;
pub mod oracle;
pub mod plugin_catalog;
pub mod plugin_marketplace;
pub mod plugins;
pub mod progress;
pub mod search;
pub mod server;
pub mod session;
pub mod sink;
pub mod sources;
pub mod sqlite_store;
pub mod stats;
