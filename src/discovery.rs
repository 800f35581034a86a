//! URL discovery: the first phase of a page-driven scrape.
//!
//! One session issues the search (through the site's search form when the
//! homepage exposes one, otherwise a direct `search?q=` URL) and then keeps
//! advancing through result pages, harvesting anchors that look like
//! product detail pages, until enough links are collected or the scroll
//! budget runs out.

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::session::SessionLease;

/// Path fragments that never lead to a product page.
const BLOCKED_PATH_PATTERNS: &[&str] = &["/help/", "/blog/", "/ta/", "/edu/", "/discovery/"];

/// Subdomains of the marketplace that host non-product content or ads.
const BLOCKED_SUBDOMAINS: &[&str] = &["seller", "help", "blog", "ta"];

const SEARCH_INPUT_SELECTORS: &[&str] = &[
    r#"input[aria-label="Cari di Tokopedia"]"#,
    r#"input[placeholder="Cari di Tokopedia"]"#,
    r#"input[type="search"]"#,
];

/// Host without a leading `www.`.
fn site_domain(base: &Url) -> String {
    let host = base.host_str().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Drop the query string and fragment.
pub fn normalize_url(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.set_fragment(None);
    clean.to_string()
}

/// Resolve `href` against `base` and return it if it points at a product
/// detail page on the same marketplace.
pub fn detail_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let site = site_domain(base);
    let host = url.host_str()?;
    let on_site = host == site || host.ends_with(&format!(".{}", site));
    if !on_site {
        return None;
    }
    if let Some(sub) = host.strip_suffix(&format!(".{}", site)) {
        if BLOCKED_SUBDOMAINS.contains(&sub) {
            return None;
        }
    }

    let path = url.path();
    if path.starts_with("/search") {
        return None;
    }
    let with_slash = format!("{}/", path);
    if BLOCKED_PATH_PATTERNS
        .iter()
        .any(|p| with_slash.contains(p))
    {
        return None;
    }

    // store-name/product-name
    let depth = path.split('/').filter(|s| !s.is_empty()).count();
    if depth < 2 {
        return None;
    }
    Some(url)
}

/// Normalized detail links found in `html`, in document order, without
/// duplicates.
pub fn harvest_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for element in document.select(&anchors) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if let Some(url) = detail_link(href, base) {
            let normalized = normalize_url(&url);
            if seen.insert(normalized.clone()) {
                out.push(normalized);
            }
        }
    }
    out
}

/// Direct search URL for `query`.
pub fn search_url(base: &Url, query: &str) -> Result<Url> {
    let mut url = base.join("/search")?;
    url.query_pairs_mut().append_pair("q", query);
    Ok(url)
}

/// Build the search URL the homepage's search form would submit.
///
/// Returns `None` when no recognizable search input is present.
pub fn form_search_url(html: &str, base: &Url, query: &str) -> Option<Url> {
    let document = Html::parse_document(html);
    let input = SEARCH_INPUT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| document.select(&sel).next())?;

    let param = input.value().attr("name").unwrap_or("q");
    let action = input
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "form")
        .and_then(|form| form.value().attr("action"))
        .unwrap_or("/search");

    let mut url = base.join(action).ok()?;
    url.set_query(None);
    url.query_pairs_mut().append_pair(param, query);
    Some(url)
}

/// Result page `n` (1-based) of a search URL.
fn page_url(search: &Url, page: usize) -> Url {
    if page <= 1 {
        return search.clone();
    }
    let mut url = search.clone();
    url.query_pairs_mut().append_pair("page", &page.to_string());
    url
}

/// Collect up to `target` detail links for `query`.
///
/// Each "scroll" loads the next result page. Stops after
/// `max_scroll_attempts` scrolls even if fewer than `target` links were
/// found.
pub async fn discover(
    session: &mut SessionLease,
    base: &Url,
    query: &str,
    target: usize,
    max_scroll_attempts: usize,
) -> Result<Vec<String>> {
    let search = match session.load(base.as_str()).await {
        Ok(home) => form_search_url(&home, base, query),
        Err(e) => {
            warn!(error = %e, "homepage unavailable");
            None
        }
    };
    let search = match search {
        Some(url) => url,
        None => {
            let url = search_url(base, query)?;
            info!(%url, "falling back to direct search");
            url
        }
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut urls: Vec<String> = Vec::new();
    let mut attempts = 0;
    let mut page = 1;

    loop {
        match session.load(page_url(&search, page).as_str()).await {
            Ok(html) => {
                for link in harvest_links(&html, base) {
                    if seen.insert(link.clone()) {
                        urls.push(link);
                    }
                }
            }
            Err(e) => debug!(page, error = %e, "result page failed"),
        }

        if urls.len() >= target || attempts >= max_scroll_attempts {
            break;
        }
        attempts += 1;
        page += 1;
    }

    urls.truncate(target);
    info!(query, found = urls.len(), pages = page, "discovery finished");
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FetchSession, SessionFactory, SessionPool};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn base() -> Url {
        Url::parse("https://www.tokopedia.com").unwrap()
    }

    #[test]
    fn detail_links_need_two_path_segments() {
        let b = base();
        assert!(detail_link("/shop-a/logitech-g102", &b).is_some());
        assert!(detail_link("https://www.tokopedia.com/shop-a/logitech-g102?extParam=1", &b).is_some());
        assert!(detail_link("/shop-a", &b).is_none());
        assert!(detail_link("/", &b).is_none());
    }

    #[test]
    fn blocked_sections_and_hosts_are_rejected() {
        let b = base();
        assert!(detail_link("/search?q=mouse", &b).is_none());
        assert!(detail_link("/help/article/123", &b).is_none());
        assert!(detail_link("/blog/post/abc", &b).is_none());
        assert!(detail_link("/discovery/promo/x", &b).is_none());
        assert!(detail_link("https://seller.tokopedia.com/edu/x", &b).is_none());
        assert!(detail_link("https://ta.tokopedia.com/promo/click", &b).is_none());
        assert!(detail_link("https://other.example/shop/item", &b).is_none());
        assert!(detail_link("javascript:void(0)", &b).is_none());
        assert!(detail_link("mailto:a@b.c", &b).is_none());
    }

    #[test]
    fn normalization_strips_query_and_fragment() {
        let url = Url::parse("https://www.tokopedia.com/s/p?whid=1&ref=x#reviews").unwrap();
        assert_eq!(normalize_url(&url), "https://www.tokopedia.com/s/p");
    }

    #[test]
    fn harvest_dedups_by_normalized_url() {
        let html = r#"
            <a href="/shop/mouse-1?src=a">1</a>
            <a href="/shop/mouse-1?src=b">1 again</a>
            <a href="/shop/mouse-2">2</a>
            <a href="/help/faq/x">help</a>
        "#;
        let links = harvest_links(html, &base());
        assert_eq!(
            links,
            vec![
                "https://www.tokopedia.com/shop/mouse-1",
                "https://www.tokopedia.com/shop/mouse-2"
            ]
        );
    }

    #[test]
    fn form_search_uses_input_name_and_action() {
        let html = r#"<form action="/find"><input type="search" name="st" /></form>"#;
        let url = form_search_url(html, &base(), "gaming mouse").unwrap();
        assert_eq!(url.as_str(), "https://www.tokopedia.com/find?st=gaming+mouse");
        assert!(form_search_url("<p>no form</p>", &base(), "x").is_none());
    }

    struct Pages(HashMap<String, String>);

    #[async_trait]
    impl FetchSession for Pages {
        async fn load(&mut self, url: &str) -> anyhow::Result<String> {
            Ok(self.0.get(url).cloned().unwrap_or_default())
        }
    }

    struct PagesFactory(HashMap<String, String>);

    #[async_trait]
    impl SessionFactory for PagesFactory {
        async fn create(&self) -> anyhow::Result<Box<dyn FetchSession>> {
            Ok(Box::new(Pages(self.0.clone())))
        }
    }

    fn result_page(range: std::ops::Range<usize>) -> String {
        range
            .map(|i| format!(r#"<a href="/shop/item-{}?r=1">x</a>"#, i))
            .collect()
    }

    #[tokio::test]
    async fn discovery_scrolls_until_target() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://www.tokopedia.com/search?q=mouse".to_string(),
            result_page(0..4),
        );
        pages.insert(
            "https://www.tokopedia.com/search?q=mouse&page=2".to_string(),
            result_page(2..8),
        );
        let pool = SessionPool::new(Arc::new(PagesFactory(pages)), 1);
        let mut lease = pool.acquire().await.unwrap();

        let urls = discover(&mut lease, &base(), "mouse", 6, 10).await.unwrap();
        assert_eq!(urls.len(), 6);
        assert_eq!(urls[0], "https://www.tokopedia.com/shop/item-0");
        assert_eq!(urls[5], "https://www.tokopedia.com/shop/item-5");
    }

    #[tokio::test]
    async fn discovery_stops_when_scroll_budget_runs_out() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://www.tokopedia.com/search?q=mouse".to_string(),
            result_page(0..2),
        );
        let pool = SessionPool::new(Arc::new(PagesFactory(pages)), 1);
        let mut lease = pool.acquire().await.unwrap();

        let urls = discover(&mut lease, &base(), "mouse", 50, 3).await.unwrap();
        assert_eq!(urls.len(), 2);
    }
}
