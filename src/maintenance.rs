//! Store maintenance: removing one product or wiping the database.
//!
//! Neither operation is part of a scrape; products are only ever removed
//! here.

use anyhow::{bail, Result};
use tracing::info;

use scrapqt_core::store::{Store, StoreError};

/// `scrapqt delete <id>`.
pub async fn run_delete(store: &dyn Store, id: i64) -> Result<()> {
    if !store.delete_product(id).await? {
        bail!(StoreError::ProductNotFound(id));
    }
    info!(product_id = id, "product deleted");
    println!("Deleted product {}", id);
    Ok(())
}

/// `scrapqt clear --yes`.
pub async fn run_clear(store: &dyn Store, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("refusing to clear the database without --yes");
    }
    let before = store.stats().await?;
    store.clear_all().await?;
    info!(
        products = before.total_products,
        queries = before.total_queries,
        "database cleared"
    );
    println!(
        "Cleared {} products and {} queries",
        before.total_products, before.total_queries
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapqt_core::models::{CanonicalItem, RawItem};
    use scrapqt_core::store::memory::MemoryStore;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let q = store.save_query("speaker").await.unwrap();
        let item = CanonicalItem::from_raw(
            RawItem::new("JBL Go", "https://shop.example/sp/go"),
            "Shop",
            q,
        );
        store.save_items(&[item]).await.unwrap();
        store
    }

    #[tokio::test]
    async fn delete_unknown_product_fails() {
        let store = seeded().await;
        let err = run_delete(&store, 42).await.unwrap_err();
        assert!(matches!(
            StoreError::find(&err),
            Some(StoreError::ProductNotFound(42))
        ));
        run_delete(&store, 1).await.unwrap();
        assert!(store.all_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_needs_confirmation() {
        let store = seeded().await;
        assert!(run_clear(&store, false).await.is_err());
        assert_eq!(store.all_products().await.unwrap().len(), 1);

        run_clear(&store, true).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_products, 0);
        assert_eq!(stats.total_queries, 0);
    }
}
