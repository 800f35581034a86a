//! Product search and query suggestions for the CLI.
//!
//! Search goes through query text, not product text: a product matches when
//! one of the queries that found it contains the term.

use anyhow::Result;

use scrapqt_core::models::Product;
use scrapqt_core::store::Store;

const TITLE_WIDTH: usize = 48;

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn print_products(products: &[Product]) {
    println!(
        "{:>6}  {:<width$}  {:<18} {:>12} {:>6} {:>6}",
        "ID",
        "TITLE",
        "PLATFORM",
        "PRICE",
        "RATING",
        "SENT.",
        width = TITLE_WIDTH
    );
    for p in products {
        let price = p.price.map(|v| format!("{:.0}", v)).unwrap_or_else(|| "-".into());
        let rating = p.rating.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".into());
        let sentiment = p
            .sentiment_score
            .map(|v| format!("{:+.2}", v))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:>6}  {:<width$}  {:<18} {:>12} {:>6} {:>6}",
            p.id,
            truncate(&p.title, TITLE_WIDTH),
            truncate(&p.platform, 18),
            price,
            rating,
            sentiment,
            width = TITLE_WIDTH
        );
    }
}

/// `scrapqt search <term>`.
pub async fn run_search(store: &dyn Store, term: &str, limit: Option<usize>) -> Result<()> {
    if term.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let mut products = store.search_products(term.trim()).await?;
    if products.is_empty() {
        println!("No results.");
        return Ok(());
    }
    let total = products.len();
    if let Some(limit) = limit {
        products.truncate(limit);
    }

    print_products(&products);
    println!();
    if products.len() < total {
        println!("{} of {} products", products.len(), total);
    } else {
        println!("{} products", total);
    }
    Ok(())
}

/// `scrapqt suggest <term>`: earlier query texts resembling `term`.
pub async fn run_suggest(store: &dyn Store, term: &str, limit: usize) -> Result<()> {
    let suggestions = store.query_suggestions(term, limit).await?;
    if suggestions.is_empty() {
        let recent = store.recent_queries(limit).await?;
        if recent.is_empty() {
            println!("No queries yet.");
            return Ok(());
        }
        println!("No matches. Recent queries:");
        for q in recent {
            println!("  {:<40} {} products", q.text, q.product_count);
        }
        return Ok(());
    }
    for s in suggestions {
        println!("{}", s);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_is_char_aware() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Kursi gaming ergonomis", 10), "Kursi gam…");
        assert_eq!(truncate("ñññññ", 3), "ññ…");
    }
}
