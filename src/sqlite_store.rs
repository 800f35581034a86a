//! SQLite-backed [`Store`] implementation.
//!
//! Content-hash uniqueness is enforced by the `products.content_hash`
//! UNIQUE constraint, not by a lookup in application code: an insert that
//! conflicts falls through to the link-only path, so two writers racing on
//! the same URL still converge on one product row.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use scrapqt_core::content_hash;
use scrapqt_core::models::{
    CanonicalItem, PlatformCount, Product, ProductStats, Query, QueryLink, RecentQuery,
    SaveOutcome,
};
use scrapqt_core::score::is_normalized;
use scrapqt_core::store::{word_prefix_match, Store, StoreError};

use crate::config::Config;
use crate::{db, migrate};

const PRODUCT_COLUMNS: &str = "p.id, p.title, p.price, p.rating, p.rating_count, p.link, \
     p.platform, p.is_used, p.captured_at, p.sentiment_score, p.description, p.image_url, \
     p.query_id, p.content_hash";

/// SQLite implementation of the [`Store`] trait over an owned pool.
///
/// Cloning shares the pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and bring its schema up to date.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool)
            .await
            .context("migrating product database")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_products(&self, sql: &str, term: Option<&str>) -> Result<Vec<Product>> {
        let mut query = sqlx::query(sql);
        if let Some(term) = term {
            query = query.bind(term);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(product_from_row).collect())
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn product_from_row(row: &SqliteRow) -> Product {
    Product {
        id: row.get("id"),
        title: row.get("title"),
        price: row.get("price"),
        rating: row.get("rating"),
        rating_count: row.get("rating_count"),
        link: row.get("link"),
        platform: row.get("platform"),
        is_used: row.get("is_used"),
        captured_at: row.get("captured_at"),
        sentiment_score: row.get("sentiment_score"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        query_id: row.get("query_id"),
        content_hash: row
            .get::<Option<String>, _>("content_hash")
            .unwrap_or_default(),
    }
}

fn query_from_row(row: &SqliteRow) -> Query {
    Query {
        id: row.get("id"),
        text: row.get("text"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn save_query(&self, text: &str) -> Result<i64> {
        sqlx::query("INSERT OR IGNORE INTO queries (text, created_at) VALUES (?, ?)")
            .bind(text)
            .bind(now())
            .execute(&self.pool)
            .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM queries WHERE text = ?")
            .bind(text)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn get_query(&self, id: i64) -> Result<Option<Query>> {
        let row = sqlx::query("SELECT id, text, created_at FROM queries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(query_from_row))
    }

    async fn find_query(&self, text: &str) -> Result<Option<Query>> {
        let row = sqlx::query("SELECT id, text, created_at FROM queries WHERE text = ?")
            .bind(text)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(query_from_row))
    }

    async fn save_items(&self, items: &[CanonicalItem]) -> Result<SaveOutcome> {
        let mut outcome = SaveOutcome::default();
        let mut tx = self.pool.begin().await?;
        let ts = now();

        for item in items {
            let hash = content_hash(&item.link);
            if hash.is_empty() {
                warn!(title = %item.title, "item has no link, skipping");
                outcome.skipped += 1;
                continue;
            }

            // Unset and 0.0 are both stored as "not yet analyzed".
            let sentiment = item.sentiment_score.filter(|s| *s != 0.0);

            let inserted = sqlx::query(
                r#"
                INSERT INTO products (title, price, rating, rating_count, link, platform,
                                      is_used, captured_at, sentiment_score, description,
                                      query_id, image_url, content_hash)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(content_hash) DO NOTHING
                "#,
            )
            .bind(&item.title)
            .bind(item.price)
            .bind(item.rating)
            .bind(item.rating_count)
            .bind(&item.link)
            .bind(&item.platform)
            .bind(item.is_used)
            .bind(ts)
            .bind(sentiment)
            .bind(&item.description)
            .bind(item.query_id)
            .bind(&item.image_url)
            .bind(&hash)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting product {}", item.link))?;

            let product_id = if inserted.rows_affected() == 1 {
                outcome.inserted += 1;
                inserted.last_insert_rowid()
            } else {
                outcome.linked += 1;
                debug!(link = %item.link, "content hash exists, linking only");
                sqlx::query_scalar("SELECT id FROM products WHERE content_hash = ?")
                    .bind(&hash)
                    .fetch_one(&mut *tx)
                    .await?
            };

            sqlx::query(
                "INSERT OR IGNORE INTO product_queries (product_id, query_id, created_at) \
                 VALUES (?, ?, ?)",
            )
            .bind(product_id)
            .bind(item.query_id)
            .bind(ts)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn link_product(&self, product_id: i64, query_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO product_queries (product_id, query_id, created_at) \
             VALUES (?, ?, ?)",
        )
        .bind(product_id)
        .bind(query_id)
        .bind(now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn link_queries(
        &self,
        primary_query_id: i64,
        linked_query_id: i64,
        relationship_type: &str,
    ) -> Result<i64> {
        for id in [primary_query_id, linked_query_id] {
            if self.get_query(id).await?.is_none() {
                bail!(StoreError::QueryNotFound(id));
            }
        }

        let result = sqlx::query(
            "INSERT INTO query_links (primary_query_id, linked_query_id, relationship_type, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(primary_query_id)
        .bind(linked_query_id)
        .bind(relationship_type)
        .bind(now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn linked_queries(&self, primary_query_id: i64) -> Result<Vec<QueryLink>> {
        let rows = sqlx::query(
            "SELECT id, primary_query_id, linked_query_id, relationship_type, created_at \
             FROM query_links WHERE primary_query_id = ? ORDER BY id",
        )
        .bind(primary_query_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| QueryLink {
                id: row.get("id"),
                primary_query_id: row.get("primary_query_id"),
                linked_query_id: row.get("linked_query_id"),
                relationship_type: row.get("relationship_type"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {} FROM products p WHERE p.id = ?", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(product_from_row))
    }

    async fn product_queries(&self, product_id: i64) -> Result<Vec<Query>> {
        let rows = sqlx::query(
            "SELECT q.id, q.text, q.created_at FROM product_queries pq \
             JOIN queries q ON q.id = pq.query_id \
             WHERE pq.product_id = ? ORDER BY pq.created_at, pq.id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(query_from_row).collect())
    }

    async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        let via_junction = format!(
            "SELECT DISTINCT {} FROM products p \
             JOIN product_queries pq ON pq.product_id = p.id \
             JOIN queries q ON q.id = pq.query_id \
             WHERE instr(lower(q.text), lower(?)) > 0 \
             ORDER BY p.captured_at DESC, p.id DESC",
            PRODUCT_COLUMNS
        );
        let products = self.fetch_products(&via_junction, Some(term)).await?;
        if !products.is_empty() {
            return Ok(products);
        }

        // Rows captured before the junction table existed only carry the
        // discovering query on the product itself.
        let via_column = format!(
            "SELECT {} FROM products p \
             JOIN queries q ON q.id = p.query_id \
             WHERE instr(lower(q.text), lower(?)) > 0 \
             ORDER BY p.captured_at DESC, p.id DESC",
            PRODUCT_COLUMNS
        );
        self.fetch_products(&via_column, Some(term)).await
    }

    async fn products_by_platform(&self, platform: &str) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products p WHERE p.platform = ? ORDER BY p.captured_at DESC, p.id DESC",
            PRODUCT_COLUMNS
        );
        self.fetch_products(&sql, Some(platform)).await
    }

    async fn all_products(&self) -> Result<Vec<Product>> {
        let sql = format!("SELECT {} FROM products p ORDER BY p.id", PRODUCT_COLUMNS);
        self.fetch_products(&sql, None).await
    }

    async fn unscored_products(&self) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products p WHERE p.sentiment_score IS NULL ORDER BY p.id",
            PRODUCT_COLUMNS
        );
        self.fetch_products(&sql, None).await
    }

    async fn set_sentiment(&self, product_id: i64, score: f64) -> Result<()> {
        if !is_normalized(score) {
            bail!("sentiment {} outside -1.0..=1.0", score);
        }
        let result = sqlx::query("UPDATE products SET sentiment_score = ? WHERE id = ?")
            .bind(score)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            bail!(StoreError::ProductNotFound(product_id));
        }
        Ok(())
    }

    async fn query_suggestions(&self, term: &str, limit: usize) -> Result<Vec<String>> {
        let substring: Vec<String> = sqlx::query_scalar(
            "SELECT text FROM queries WHERE instr(lower(text), lower(?)) > 0 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(term)
        .fetch_all(&self.pool)
        .await?;

        let all: Vec<String> =
            sqlx::query_scalar("SELECT text FROM queries ORDER BY created_at DESC, id DESC")
                .fetch_all(&self.pool)
                .await?;

        let mut out = substring;
        for text in all {
            if out.len() >= limit {
                break;
            }
            if word_prefix_match(&text, term) && !out.contains(&text) {
                out.push(text);
            }
        }
        out.truncate(limit);
        Ok(out)
    }

    async fn recent_queries(&self, limit: usize) -> Result<Vec<RecentQuery>> {
        let rows = sqlx::query(
            r#"
            SELECT q.id, q.text, q.created_at, COUNT(pq.id) AS product_count
            FROM queries q
            LEFT JOIN product_queries pq ON pq.query_id = q.id
            GROUP BY q.id
            ORDER BY q.created_at DESC, q.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| RecentQuery {
                id: row.get("id"),
                text: row.get("text"),
                created_at: row.get("created_at"),
                product_count: row.get("product_count"),
            })
            .collect())
    }

    async fn stats(&self) -> Result<ProductStats> {
        let total_products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        let total_queries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queries")
            .fetch_one(&self.pool)
            .await?;

        let platform_rows = sqlx::query(
            "SELECT platform, COUNT(*) AS count FROM products \
             GROUP BY platform ORDER BY count DESC, platform ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        let by_platform = platform_rows
            .iter()
            .map(|row| PlatformCount {
                platform: row.get("platform"),
                count: row.get("count"),
            })
            .collect();

        let avg_price: Option<f64> =
            sqlx::query_scalar("SELECT AVG(price) FROM products WHERE price > 0")
                .fetch_one(&self.pool)
                .await?;
        let avg_sentiment: Option<f64> = sqlx::query_scalar(
            "SELECT AVG(sentiment_score) FROM products WHERE sentiment_score IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        let scored_products: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE sentiment_score IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        let multi_query_products: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM (SELECT product_id FROM product_queries \
             GROUP BY product_id HAVING COUNT(*) > 1)",
        )
        .fetch_one(&self.pool)
        .await?;
        let total_links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_queries")
            .fetch_one(&self.pool)
            .await?;

        Ok(ProductStats {
            total_products,
            total_queries,
            by_platform,
            avg_price,
            avg_sentiment,
            scored_products,
            multi_query_products,
            total_links,
        })
    }

    async fn platforms(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar("SELECT DISTINCT platform FROM products ORDER BY platform")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn delete_product(&self, product_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM product_queries WHERE product_id = ?")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    async fn clear_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["product_queries", "query_links", "products", "queries"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("clearing {}", table))?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open(tmp: &TempDir) -> SqliteStore {
        let config = Config::with_db(tmp.path().join("data/scrapqt.sqlite"));
        SqliteStore::open(&config).await.unwrap()
    }

    fn item(link: &str, query_id: i64) -> CanonicalItem {
        CanonicalItem {
            title: format!("Product at {}", link),
            price: 150_000.0,
            rating: 4.7,
            rating_count: 12,
            link: link.to_string(),
            platform: "Tokopedia".to_string(),
            is_used: false,
            description: "desc".to_string(),
            image_url: String::new(),
            query_id,
            sentiment_score: None,
        }
    }

    async fn count(store: &SqliteStore, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(store.pool()).await.unwrap()
    }

    #[tokio::test]
    async fn query_text_is_unique_and_case_sensitive() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let a = store.save_query("gaming mouse").await.unwrap();
        let b = store.save_query("gaming mouse").await.unwrap();
        let c = store.save_query("Gaming Mouse").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM queries").await, 2);
    }

    #[tokio::test]
    async fn repeated_url_keeps_one_product_and_one_link_per_query() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let q1 = store.save_query("mouse").await.unwrap();
        let q2 = store.save_query("gaming mouse").await.unwrap();
        let url = "https://www.tokopedia.com/shop/logitech-g102";

        for _ in 0..3 {
            store.save_items(&[item(url, q1)]).await.unwrap();
        }
        let out = store.save_items(&[item(url, q2)]).await.unwrap();
        assert_eq!(out, SaveOutcome { inserted: 0, linked: 1, skipped: 0 });

        assert_eq!(count(&store, "SELECT COUNT(*) FROM products").await, 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM product_queries").await, 2);
    }

    #[tokio::test]
    async fn duplicate_within_one_batch_is_linked() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let q = store.save_query("keyboard").await.unwrap();
        let url = "https://shop.example/kb/k1";
        let out = store.save_items(&[item(url, q), item(url, q)]).await.unwrap();
        assert_eq!(out, SaveOutcome { inserted: 1, linked: 1, skipped: 0 });
        assert_eq!(out.saved(), 2);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM product_queries").await, 1);
    }

    #[tokio::test]
    async fn junction_insert_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let q = store.save_query("headset").await.unwrap();
        store.save_items(&[item("https://shop.example/h/1", q)]).await.unwrap();
        let pid: i64 = count(&store, "SELECT id FROM products").await;

        assert!(!store.link_product(pid, q).await.unwrap());
        let other = store.save_query("wireless headset").await.unwrap();
        assert!(store.link_product(pid, other).await.unwrap());
        assert!(!store.link_product(pid, other).await.unwrap());
        assert_eq!(count(&store, "SELECT COUNT(*) FROM product_queries").await, 2);
    }

    #[tokio::test]
    async fn failing_batch_rolls_back() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let q = store.save_query("laptop").await.unwrap();
        // The second item points at a query that does not exist.
        let result = store
            .save_items(&[item("https://shop.example/l/1", q), item("https://shop.example/l/2", 404)])
            .await;
        assert!(result.is_err());
        assert_eq!(count(&store, "SELECT COUNT(*) FROM products").await, 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM product_queries").await, 0);
    }

    #[tokio::test]
    async fn linkless_item_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let q = store.save_query("laptop").await.unwrap();
        let out = store
            .save_items(&[item("https://shop.example/l/1", q), item("", q)])
            .await
            .unwrap();
        assert_eq!(out, SaveOutcome { inserted: 1, linked: 0, skipped: 1 });
        assert_eq!(count(&store, "SELECT COUNT(*) FROM products").await, 1);
    }

    #[tokio::test]
    async fn delete_product_removes_its_links() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let q = store.save_query("tablet").await.unwrap();
        store
            .save_items(&[item("https://shop.example/t/1", q), item("https://shop.example/t/2", q)])
            .await
            .unwrap();
        let pid = store.all_products().await.unwrap()[0].id;

        assert!(store.delete_product(pid).await.unwrap());
        assert!(!store.delete_product(pid).await.unwrap());
        assert_eq!(count(&store, "SELECT COUNT(*) FROM products").await, 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM product_queries").await, 1);
        assert_eq!(store.platforms().await.unwrap(), vec!["Tokopedia".to_string()]);

        store.link_queries(q, q, "self").await.unwrap();
        store.clear_all().await.unwrap();
        for table in ["products", "queries", "product_queries", "query_links"] {
            let sql = format!("SELECT COUNT(*) FROM {}", table);
            assert_eq!(count(&store, &sql).await, 0, "{} not empty", table);
        }
    }

    #[tokio::test]
    async fn zero_sentiment_is_stored_as_unscored() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let q = store.save_query("monitor").await.unwrap();
        let mut zero = item("https://shop.example/m/1", q);
        zero.sentiment_score = Some(0.0);
        let mut scored = item("https://shop.example/m/2", q);
        scored.sentiment_score = Some(0.5);
        store.save_items(&[zero, scored]).await.unwrap();

        let unscored = store.unscored_products().await.unwrap();
        assert_eq!(unscored.len(), 1);
        assert_eq!(unscored[0].link, "https://shop.example/m/1");

        assert!(store.set_sentiment(unscored[0].id, -1.5).await.is_err());
        store.set_sentiment(unscored[0].id, -1.0).await.unwrap();
        assert!(store.unscored_products().await.unwrap().is_empty());
        assert!(store.set_sentiment(9999, 0.1).await.is_err());
    }

    #[tokio::test]
    async fn search_goes_through_junction_then_falls_back() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let q = store.save_query("Gaming Mouse").await.unwrap();
        store.save_items(&[item("https://shop.example/g/1", q)]).await.unwrap();

        let found = store.search_products("gaming").await.unwrap();
        assert_eq!(found.len(), 1);

        // A legacy row with only the direct column set.
        let legacy_q = store.save_query("old webcam").await.unwrap();
        sqlx::query(
            "INSERT INTO products (title, link, platform, captured_at, query_id) \
             VALUES ('Webcam', 'https://shop.example/w/1', 'Legacy', 0, ?)",
        )
        .bind(legacy_q)
        .execute(store.pool())
        .await
        .unwrap();

        let found = store.search_products("webcam").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].platform, "Legacy");
        assert!(store.search_products("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn legacy_rows_are_backfilled_on_migrate() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        sqlx::query(
            "INSERT INTO products (title, link, platform, captured_at) \
             VALUES ('Old', 'https://shop.example/o/1', 'Legacy', 0)",
        )
        .execute(store.pool())
        .await
        .unwrap();

        migrate::migrate_pool(store.pool()).await.unwrap();

        let hash: Option<String> = sqlx::query_scalar("SELECT content_hash FROM products")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(hash.as_deref(), Some(content_hash("https://shop.example/o/1").as_str()));
    }

    #[tokio::test]
    async fn link_queries_and_stats() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let laptop = store.save_query("laptop").await.unwrap();
        let mouse = store.save_query("mouse").await.unwrap();
        let err = store.link_queries(laptop, 404, "related").await.unwrap_err();
        assert!(matches!(
            StoreError::find(&err),
            Some(StoreError::QueryNotFound(404))
        ));
        store.link_queries(laptop, mouse, "related").await.unwrap();

        let links = store.linked_queries(laptop).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].linked_query_id, mouse);
        assert!(store.linked_queries(mouse).await.unwrap().is_empty());

        let shared = "https://shop.example/s/1";
        store.save_items(&[item(shared, laptop)]).await.unwrap();
        store.save_items(&[item(shared, mouse)]).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_products, 1);
        assert_eq!(stats.total_queries, 2);
        assert_eq!(stats.multi_query_products, 1);
        assert_eq!(stats.total_links, 2);
        assert_eq!(stats.scored_products, 0);
        assert_eq!(stats.avg_sentiment, None);
        assert_eq!(stats.by_platform[0].platform, "Tokopedia");

        let pid = store.all_products().await.unwrap()[0].id;
        let queries = store.product_queries(pid).await.unwrap();
        assert_eq!(queries.len(), 2);

        let recent = store.recent_queries(10).await.unwrap();
        assert!(recent.iter().all(|r| r.product_count == 1));
    }
}
