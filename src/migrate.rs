use anyhow::Result;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use scrapqt_core::content_hash;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index on an open pool. Idempotent.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // content_hash stays nullable so rows written before hashing existed can
    // be backfilled below; UNIQUE still allows many NULLs.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            price REAL,
            rating REAL,
            rating_count INTEGER,
            link TEXT NOT NULL,
            platform TEXT NOT NULL,
            is_used INTEGER NOT NULL DEFAULT 0,
            captured_at INTEGER NOT NULL,
            sentiment_score REAL,
            description TEXT NOT NULL DEFAULT '',
            query_id INTEGER,
            image_url TEXT NOT NULL DEFAULT '',
            content_hash TEXT UNIQUE,
            FOREIGN KEY (query_id) REFERENCES queries(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_queries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL,
            query_id INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(product_id, query_id),
            FOREIGN KEY (product_id) REFERENCES products(id),
            FOREIGN KEY (query_id) REFERENCES queries(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS query_links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            primary_query_id INTEGER NOT NULL,
            linked_query_id INTEGER NOT NULL,
            relationship_type TEXT NOT NULL DEFAULT 'related',
            created_at INTEGER NOT NULL,
            FOREIGN KEY (primary_query_id) REFERENCES queries(id),
            FOREIGN KEY (linked_query_id) REFERENCES queries(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_products_query_id ON products(query_id)",
        "CREATE INDEX IF NOT EXISTS idx_products_platform ON products(platform)",
        "CREATE INDEX IF NOT EXISTS idx_products_content_hash ON products(content_hash)",
        "CREATE INDEX IF NOT EXISTS idx_products_captured_at ON products(captured_at)",
        "CREATE INDEX IF NOT EXISTS idx_product_queries_product_id ON product_queries(product_id)",
        "CREATE INDEX IF NOT EXISTS idx_product_queries_query_id ON product_queries(query_id)",
        "CREATE INDEX IF NOT EXISTS idx_query_links_primary ON query_links(primary_query_id)",
    ];
    for sql in indexes {
        sqlx::query(sql).execute(pool).await?;
    }

    let backfilled = backfill_content_hashes(pool).await?;
    if backfilled > 0 {
        info!(rows = backfilled, "backfilled content hashes");
    }

    Ok(())
}

/// Assign a content hash to rows that predate hashing.
///
/// A legacy row whose link hashes to a value already taken keeps a NULL
/// hash; it is logged and left for manual cleanup.
async fn backfill_content_hashes(pool: &SqlitePool) -> Result<u64> {
    let rows = sqlx::query("SELECT id, link FROM products WHERE content_hash IS NULL")
        .fetch_all(pool)
        .await?;

    let mut updated = 0u64;
    for row in &rows {
        let id: i64 = row.get("id");
        let link: String = row.get("link");
        let hash = content_hash(&link);
        if hash.is_empty() {
            continue;
        }
        let result = sqlx::query(
            "UPDATE products SET content_hash = ? WHERE id = ? \
             AND NOT EXISTS (SELECT 1 FROM products WHERE content_hash = ?)",
        )
        .bind(&hash)
        .bind(id)
        .bind(&hash)
        .execute(pool)
        .await?;

        if result.rows_affected() == 1 {
            updated += 1;
        } else {
            warn!(product_id = id, %link, "legacy row duplicates an existing content hash");
        }
    }
    Ok(updated)
}
