//! Store and Scraper services exercised over real HTTP on local ports.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use scrapqt::api::{ErrorBody, HealthResponse, PluginsResponse, SaveItemsResponse};
use scrapqt::client::StoreClient;
use scrapqt::config::{Config, EnrichmentConfig};
use scrapqt::error::OracleError;
use scrapqt::expand::ExpansionReport;
use scrapqt::ingest::{ScrapeOrchestrator, ScrapeReport};
use scrapqt::oracle::{GeminiOracle, ScoringOracle};
use scrapqt::plugins::{PluginRegistry, SourcePlugin};
use scrapqt::server::{scraper_router, spawn_local, store_router, ScraperState, StoreState};
use scrapqt::sqlite_store::SqliteStore;
use scrapqt_core::models::{CanonicalItem, RawItem};
use scrapqt_core::store::Store;

/// Scores every text 10.
struct Enthusiast;

#[async_trait]
impl ScoringOracle for Enthusiast {
    fn check_ready(&self) -> Result<(), OracleError> {
        Ok(())
    }

    async fn score(&self, _text: &str) -> Result<i64, OracleError> {
        Ok(10)
    }
}

struct PerQueryPlugin;

#[async_trait]
impl SourcePlugin for PerQueryPlugin {
    fn platform_name(&self) -> &str {
        "PerQuery"
    }

    fn description(&self) -> &str {
        "one listing per query"
    }

    async fn scrape(&self, query: &str) -> Result<Vec<RawItem>> {
        let slug = query.replace(' ', "-");
        Ok(vec![RawItem::new(
            format!("Best {}", query),
            format!("https://shop.example/p/{}", slug),
        )])
    }
}

fn fast_enrichment() -> EnrichmentConfig {
    EnrichmentConfig {
        batch_delay_ms: 0,
        ..EnrichmentConfig::default()
    }
}

async fn start_store(tmp: &TempDir, oracle: Arc<dyn ScoringOracle>) -> (Arc<SqliteStore>, String) {
    let config = Config::with_db(tmp.path().join("data/scrapqt.sqlite"));
    let store = Arc::new(SqliteStore::open(&config).await.unwrap());
    let state = StoreState {
        store: store.clone(),
        oracle,
        enrichment: fast_enrichment(),
    };
    let url = spawn_local(store_router(state)).await.unwrap();
    (store, url)
}

fn item(link: &str, query_id: i64) -> CanonicalItem {
    CanonicalItem::from_raw(RawItem::new(format!("Item {}", link), link), "Shop", query_id)
}

#[tokio::test]
async fn store_service_round_trip() {
    let tmp = TempDir::new().unwrap();
    let (_store, url) = start_store(&tmp, Arc::new(Enthusiast)).await;
    let client = StoreClient::new(&url).unwrap();

    let health: HealthResponse = reqwest::get(format!("{}/health", url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.status, "ok");

    let laptop = client.save_query("laptop").await.unwrap();
    assert_eq!(client.save_query("laptop").await.unwrap(), laptop);
    assert_eq!(client.get_query(laptop).await.unwrap().unwrap().text, "laptop");
    assert!(client.get_query(9_999).await.unwrap().is_none());

    let first = client
        .save_items(&[item("https://shop.example/a", laptop), item("https://shop.example/b", laptop)])
        .await
        .unwrap();
    assert_eq!((first.inserted, first.linked), (2, 0));
    let again = client
        .save_items(&[item("https://shop.example/a", laptop)])
        .await
        .unwrap();
    assert_eq!((again.inserted, again.linked), (0, 1));

    let mouse = client.save_query("mouse").await.unwrap();
    let link_id = client.link_queries(laptop, mouse, "accessory").await.unwrap();
    let links = client.linked_queries(laptop).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].id, link_id);
    assert_eq!(links[0].linked_query_id, mouse);

    let found = client.search_products("lapt").await.unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn failed_item_save_reports_zero_saved() {
    let tmp = TempDir::new().unwrap();
    let (store, url) = start_store(&tmp, Arc::new(Enthusiast)).await;
    let client = StoreClient::new(&url).unwrap();
    let laptop = client.save_query("laptop").await.unwrap();

    // Query 404 does not exist, so the second insert breaks the foreign key.
    let items = vec![item("https://shop.example/a", laptop), item("https://shop.example/b", 404)];
    let response = reqwest::Client::new()
        .post(format!("{}/items", url))
        .json(&serde_json::json!({ "items": items }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: SaveItemsResponse = response.json().await.unwrap();
    assert!(!body.success);
    assert_eq!(body.items_saved, 0);

    let err = client.save_items(&items).await.unwrap_err();
    assert!(err.to_string().contains("500"), "got: {}", err);
    assert_eq!(store.stats().await.unwrap().total_products, 0);
}

#[tokio::test]
async fn linkless_item_is_skipped_over_rpc() {
    let tmp = TempDir::new().unwrap();
    let (store, url) = start_store(&tmp, Arc::new(Enthusiast)).await;
    let client = StoreClient::new(&url).unwrap();
    let laptop = client.save_query("laptop").await.unwrap();

    let outcome = client
        .save_items(&[item("https://shop.example/a", laptop), item("", laptop)])
        .await
        .unwrap();
    assert_eq!((outcome.inserted, outcome.skipped), (1, 1));
    assert_eq!(store.stats().await.unwrap().total_products, 1);
}

#[tokio::test]
async fn linking_unknown_query_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let (_store, url) = start_store(&tmp, Arc::new(Enthusiast)).await;
    let client = StoreClient::new(&url).unwrap();
    let laptop = client.save_query("laptop").await.unwrap();

    let response = reqwest::Client::new()
        .post(format!("{}/queries/link", url))
        .json(&serde_json::json!({
            "primary_query_id": laptop,
            "linked_query_id": 404
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error.code, "not_found");
}

#[tokio::test]
async fn analyze_scores_and_normalizes() {
    let tmp = TempDir::new().unwrap();
    let (store, url) = start_store(&tmp, Arc::new(Enthusiast)).await;
    let client = StoreClient::new(&url).unwrap();

    let scored = client.analyze("Fast shipping, works great").await.unwrap();
    assert_eq!(scored.score, 10);
    assert!((scored.normalized - 1.0).abs() < 1e-9);

    let q = store.save_query("headset").await.unwrap();
    store
        .save_items(&[item("https://shop.example/h1", q), item("https://shop.example/h2", q)])
        .await
        .unwrap();
    let batch = client.analyze_database().await.unwrap();
    assert_eq!(batch.items_analyzed, 2);
    assert_eq!(batch.items_failed, 0);
    assert!(store.unscored_products().await.unwrap().is_empty());
}

#[tokio::test]
async fn analyze_without_key_is_a_failed_precondition() {
    let tmp = TempDir::new().unwrap();
    let oracle = GeminiOracle::with_key(&fast_enrichment(), None).unwrap();
    let (_store, url) = start_store(&tmp, Arc::new(oracle)).await;

    let response = reqwest::Client::new()
        .post(format!("{}/analyze", url))
        .json(&serde_json::json!({ "text": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::PRECONDITION_FAILED);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error.code, "failed_precondition");

    let err = StoreClient::new(&url)
        .unwrap()
        .analyze_database()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed_precondition"));
}

#[tokio::test]
async fn scraper_service_saves_through_store_service() {
    let tmp = TempDir::new().unwrap();
    let (store, store_url) = start_store(&tmp, Arc::new(Enthusiast)).await;

    let mut plugins = PluginRegistry::new();
    plugins.register(Arc::new(PerQueryPlugin));
    let sink = Arc::new(StoreClient::new(&store_url).unwrap());
    let state = ScraperState {
        orchestrator: Arc::new(ScrapeOrchestrator::new(plugins.clone(), sink)),
        plugins,
    };
    let scraper_url = spawn_local(scraper_router(state)).await.unwrap();
    let http = reqwest::Client::new();

    let listed: PluginsResponse = http
        .get(format!("{}/plugins", scraper_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.plugins.len(), 1);
    assert_eq!(listed.plugins[0].platform, "PerQuery");

    let report: ScrapeReport = http
        .post(format!("{}/scrape", scraper_url))
        .json(&serde_json::json!({ "query": "laptop" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(report.success);
    assert_eq!(report.items_scraped, 1);
    assert_eq!(store.stats().await.unwrap().total_products, 1);

    let mouse = store.save_query("mouse").await.unwrap();
    store
        .link_queries(report.query_id, mouse, "accessory")
        .await
        .unwrap();
    let expanded: ExpansionReport = http
        .post(format!("{}/expand", scraper_url))
        .json(&serde_json::json!({ "query": "laptop" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(expanded.linked.len(), 1);
    assert_eq!(expanded.linked[0].report.query_id, mouse);
    assert_eq!(store.stats().await.unwrap().total_products, 2);

    let empty = http
        .post(format!("{}/scrape", scraper_url))
        .json(&serde_json::json!({ "query": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), reqwest::StatusCode::BAD_REQUEST);
}
