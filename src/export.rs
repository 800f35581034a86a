//! Export collected products as JSON.
//!
//! Writes every product, or one platform's products, with the ids of the
//! queries that found it, for downstream analysis outside the database.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;

use scrapqt_core::models::{format_ts_iso, Product};
use scrapqt_core::store::Store;

#[derive(Serialize)]
struct ExportData {
    exported_at: String,
    products: Vec<ExportProduct>,
}

#[derive(Serialize)]
struct ExportProduct {
    #[serde(flatten)]
    product: Product,
    query_ids: Vec<i64>,
}

/// Export products as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping. `platform` restricts the export to one platform
/// and must name a platform that has products.
pub async fn run_export(
    store: &dyn Store,
    output: Option<&Path>,
    platform: Option<&str>,
) -> Result<()> {
    let json = export_json(store, platform).await?;
    let count = json.products.len();
    let text = serde_json::to_string_pretty(&json)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &text)?;
            eprintln!("Exported {} products to {}", count, path.display());
        }
        None => {
            println!("{}", text);
        }
    }
    Ok(())
}

async fn export_json(store: &dyn Store, platform: Option<&str>) -> Result<ExportData> {
    let selected = match platform {
        Some(name) => {
            let known = store.platforms().await?;
            if !known.iter().any(|p| p == name) {
                bail!("unknown platform '{}' (known: {})", name, known.join(", "));
            }
            store.products_by_platform(name).await?
        }
        None => store.all_products().await?,
    };

    let mut products = Vec::new();
    for product in selected {
        let query_ids = store
            .product_queries(product.id)
            .await?
            .into_iter()
            .map(|q| q.id)
            .collect();
        products.push(ExportProduct { product, query_ids });
    }
    Ok(ExportData {
        exported_at: format_ts_iso(chrono::Utc::now().timestamp()),
        products,
    })
}
