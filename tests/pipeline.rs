//! End-to-end scrape, link, and expand flows against a real SQLite file.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use scrapqt::config::Config;
use scrapqt::expand::LinkedQueryExpander;
use scrapqt::ingest::ScrapeOrchestrator;
use scrapqt::plugins::{PluginRegistry, SourcePlugin};
use scrapqt::progress::NoProgress;
use scrapqt::sqlite_store::SqliteStore;
use scrapqt_core::models::{CanonicalItem, RawItem};
use scrapqt_core::store::Store;

/// Returns a fixed list of links, whatever the query.
struct ListingPlugin {
    name: &'static str,
    links: Vec<&'static str>,
}

#[async_trait]
impl SourcePlugin for ListingPlugin {
    fn platform_name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "fixed listings"
    }

    async fn scrape(&self, _query: &str) -> Result<Vec<RawItem>> {
        Ok(self
            .links
            .iter()
            .map(|link| {
                let mut item = RawItem::new(format!("Item {}", link), *link);
                item.price = Some(199_000.0);
                item
            })
            .collect())
    }
}

/// One listing per query, keyed by the query text.
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

async fn open_store(tmp: &TempDir) -> Arc<SqliteStore> {
    let config = Config::with_db(tmp.path().join("data/scrapqt.sqlite"));
    Arc::new(SqliteStore::open(&config).await.unwrap())
}

fn registry(plugins: Vec<Arc<dyn SourcePlugin>>) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    for plugin in plugins {
        registry.register(plugin);
    }
    registry
}

async fn junction_rows(store: &SqliteStore, query_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM product_queries WHERE query_id = ?")
        .bind(query_id)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn two_plugins_without_overlap_store_every_item() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let plugins = registry(vec![
        Arc::new(ListingPlugin {
            name: "ShopA",
            links: vec![
                "https://a.example/p/1",
                "https://a.example/p/2",
                "https://a.example/p/3",
            ],
        }),
        Arc::new(ListingPlugin {
            name: "ShopB",
            links: vec!["https://b.example/p/1", "https://b.example/p/2"],
        }),
    ]);
    let orchestrator = ScrapeOrchestrator::new(plugins, store.clone());

    let report = orchestrator.run("gaming mouse").await.unwrap();

    assert!(report.success);
    assert_eq!(report.items_scraped, 5);
    assert_eq!(report.inserted, 5);
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_products, 5);
    assert_eq!(junction_rows(&store, report.query_id).await, 5);
}

#[tokio::test]
async fn repeated_link_is_linked_not_duplicated() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let first = ScrapeOrchestrator::new(
        registry(vec![Arc::new(ListingPlugin {
            name: "ShopA",
            links: vec!["https://a.example/p/1", "https://a.example/p/2"],
        })]),
        store.clone(),
    );
    let report = first.run("gaming mouse").await.unwrap();
    assert_eq!(report.inserted, 2);

    let second = ScrapeOrchestrator::new(
        registry(vec![Arc::new(ListingPlugin {
            name: "ShopA",
            links: vec!["https://a.example/p/1"],
        })]),
        store.clone(),
    );
    let again = second.run("gaming mouse").await.unwrap();

    assert!(again.success);
    assert_eq!(again.query_id, report.query_id);
    assert_eq!(again.items_scraped, 1);
    assert_eq!(again.inserted, 0);
    assert_eq!(again.linked, 1);
    assert_eq!(store.stats().await.unwrap().total_products, 2);
    assert_eq!(junction_rows(&store, report.query_id).await, 2);

    // Same link under another query adds an association, not a product.
    let other = second.run("wireless mouse").await.unwrap();
    assert_eq!(other.linked, 1);
    assert_eq!(store.stats().await.unwrap().total_products, 2);
    let product = store.search_products("wireless").await.unwrap();
    assert_eq!(product.len(), 1);
    let queries = store.product_queries(product[0].id).await.unwrap();
    assert_eq!(queries.len(), 2);
}

#[tokio::test]
async fn expansion_attributes_items_to_linked_query() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let laptop = store.save_query("laptop").await.unwrap();
    let mouse = store.save_query("mouse").await.unwrap();
    store.link_queries(laptop, mouse, "accessory").await.unwrap();

    let orchestrator = Arc::new(ScrapeOrchestrator::new(
        registry(vec![Arc::new(PerQueryPlugin)]),
        store.clone(),
    ));
    let expander = LinkedQueryExpander::new(orchestrator);
    let report = expander
        .scrape_with_links("laptop", &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.primary_query_id, laptop);
    assert_eq!(report.linked.len(), 1);
    assert_eq!(report.linked[0].report.query_id, mouse);
    assert_eq!(report.linked[0].relationship_type, "accessory");
    assert_eq!(report.items_scraped(), 2);

    let mouse_products = store.search_products("mouse").await.unwrap();
    assert_eq!(mouse_products.len(), 1);
    assert_eq!(mouse_products[0].title, "Best mouse");
    assert_eq!(mouse_products[0].query_id, Some(mouse));
    assert_eq!(junction_rows(&store, laptop).await, 1);
}

#[tokio::test]
async fn cyclic_links_terminate() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let a = store.save_query("keyboard").await.unwrap();
    let b = store.save_query("keycaps").await.unwrap();
    store.link_queries(a, b, "related").await.unwrap();
    store.link_queries(b, a, "related").await.unwrap();

    let orchestrator = Arc::new(ScrapeOrchestrator::new(
        registry(vec![Arc::new(PerQueryPlugin)]),
        store.clone(),
    ));
    let report = LinkedQueryExpander::new(orchestrator)
        .expand(a)
        .await
        .unwrap();

    assert_eq!(report.linked.len(), 1);
    assert_eq!(report.linked[0].report.query_id, b);
    assert_eq!(report.skipped, vec![a]);
}

#[tokio::test]
async fn linkless_item_does_not_sink_the_batch() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let q = store.save_query("usb hub").await.unwrap();

    let mut items: Vec<CanonicalItem> = (0..9)
        .map(|i| {
            CanonicalItem::from_raw(
                RawItem::new(format!("Hub {}", i), format!("https://shop.example/hub/{}", i)),
                "Shop",
                q,
            )
        })
        .collect();
    items.insert(4, CanonicalItem::from_raw(RawItem::new("t ", ""), "Shop", q));

    let outcome = store.save_items(&items).await.unwrap();

    assert_eq!(outcome.inserted, 9);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.saved(), 9);
    assert_eq!(store.stats().await.unwrap().total_products, 9);
    assert_eq!(junction_rows(&store, q).await, 9);
}
