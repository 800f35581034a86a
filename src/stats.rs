//! Database statistics and health overview.
//!
//! Summarizes what has been collected: product and query counts, query
//! link coverage, enrichment progress, and a per-platform breakdown. Used by
//! `scrapqt stats` to confirm that scrapes and enrichment runs are landing.

use anyhow::Result;

use scrapqt_core::models::ProductStats;
use scrapqt_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Run the stats command: open the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let stats = store.stats().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("scrapqt Database Stats");
    println!("======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    print_summary(&stats);

    if !stats.by_platform.is_empty() {
        println!();
        println!("  By platform:");
        println!("  {:<24} {:>8} {:>7}", "PLATFORM", "PRODUCTS", "SHARE");
        println!("  {}", "-".repeat(41));
        for p in &stats.by_platform {
            println!(
                "  {:<24} {:>8} {:>6}%",
                p.platform,
                p.count,
                percent(p.count, stats.total_products)
            );
        }
    }

    println!();
    store.pool().close().await;
    Ok(())
}

fn print_summary(stats: &ProductStats) {
    println!("  Products:    {}", stats.total_products);
    println!("  Queries:     {}", stats.total_queries);
    println!("  Links:       {}", stats.total_links);
    println!(
        "  Shared:      {} products found by more than one query",
        stats.multi_query_products
    );
    println!(
        "  Scored:      {} / {} ({}%)",
        stats.scored_products,
        stats.total_products,
        percent(stats.scored_products, stats.total_products)
    );
    if let Some(avg) = stats.avg_price {
        println!("  Avg price:   {:.0}", avg);
    }
    if let Some(avg) = stats.avg_sentiment {
        println!("  Avg score:   {:+.3}", avg);
    }
}

fn percent(part: i64, whole: i64) -> i64 {
    if whole > 0 {
        (part * 100) / whole
    } else {
        0
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
