//! Product retrieval by ID.
//!
//! Fetches a product together with every query that discovered it. Used by
//! the `scrapqt get` CLI command.

use anyhow::{bail, Result};
use serde::Serialize;

use scrapqt_core::models::{format_ts_iso, Product, Query};
use scrapqt_core::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub captured_at_iso: String,
    pub queries: Vec<Query>,
}

pub async fn get_product(store: &dyn Store, id: i64) -> Result<ProductDetail> {
    let product = match store.get_product(id).await? {
        Some(p) => p,
        None => bail!(StoreError::ProductNotFound(id)),
    };
    let queries = store.product_queries(id).await?;
    Ok(ProductDetail {
        captured_at_iso: format_ts_iso(product.captured_at),
        product,
        queries,
    })
}

/// `scrapqt get <id>`.
pub async fn run_get(store: &dyn Store, id: i64, json: bool) -> Result<()> {
    let detail = get_product(store, id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let p = &detail.product;
    println!("--- Product {} ---", p.id);
    println!("title:       {}", p.title);
    println!("platform:    {}", p.platform);
    println!("link:        {}", p.link);
    match p.price {
        Some(price) => println!("price:       {:.2}", price),
        None => println!("price:       -"),
    }
    match (p.rating, p.rating_count) {
        (Some(r), Some(n)) => println!("rating:      {:.1} ({} reviews)", r, n),
        (Some(r), None) => println!("rating:      {:.1}", r),
        _ => println!("rating:      -"),
    }
    println!("condition:   {}", if p.is_used { "used" } else { "new" });
    match p.sentiment_score {
        Some(s) => println!("sentiment:   {:+.3}", s),
        None => println!("sentiment:   not analyzed"),
    }
    if !p.image_url.is_empty() {
        println!("image:       {}", p.image_url);
    }
    println!("captured:    {}", detail.captured_at_iso);
    println!("hash:        {}", p.content_hash);
    println!("--- Queries ({}) ---", detail.queries.len());
    for q in &detail.queries {
        println!("  [{}] {}", q.id, q.text);
    }
    if !p.description.is_empty() {
        println!("--- Description ---");
        println!("{}", p.description);
    }
    Ok(())
}
