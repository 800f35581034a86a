//! Product detail page extraction.
//!
//! Turns the HTML of one marketplace detail page into a [`RawItem`]. Each
//! field is looked up through an ordered selector list; the first selector
//! yielding non-empty text wins. Only the title is mandatory.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use scrapqt_core::models::RawItem;

use crate::error::ExtractionError;

const TITLE_SELECTORS: &[&str] = &[
    r#"[data-testid="lblPDPDetailProductName"]"#,
    r#"h1[data-testid*="product"]"#,
    "h1",
];

const PRICE_SELECTORS: &[&str] = &[
    r#"[data-testid="lblPDPDetailProductPrice"]"#,
    ".price",
    r#"[data-testid*="price"]"#,
];

const RATING_SELECTORS: &[&str] = &[
    r#"[data-testid="lblPDPDetailProductRatingNumber"]"#,
    r#"[data-testid*="rating"]"#,
];

const RATING_COUNT_SELECTORS: &[&str] = &[
    r#"[data-testid="lblPDPDetailProductRatingCounter"]"#,
    r#"[data-testid*="counter"]"#,
];

const DESCRIPTION_SELECTORS: &[&str] = &[r#"[data-testid="lblPDPDescriptionProduk"]"#, ".description"];

const IMAGE_SELECTORS: &[&str] = &[
    r#"img[data-testid*="PDPMainImage"]"#,
    r#"img[src*="images.tokopedia.net"]"#,
];

const MAX_DESCRIPTION_CHARS: usize = 500;

/// Label next to the condition field on a detail page.
const CONDITION_LABELS: &[&str] = &["kondisi", "condition"];
const USED_WORDS: &[&str] = &["bekas", "second", "preloved", "used", "refurbished"];
const NEW_WORDS: &[&str] = &["baru", "new"];
/// Words in a title or description that mark an item as pre-owned when
/// the page has no condition field.
const USED_HINTS: &[&str] = &["bekas", "second", "preloved", "used", "seken", "refurbished"];

const PLACEHOLDER_TITLE: &str = "Unknown Product";

static RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[.,]\d+|\d+)").expect("valid regex"));

static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)*)\s*(?:(rb|ribu|k|juta)\b)?").expect("valid regex")
});

/// Parse one detail page.
pub fn parse_product(html: &str, page_url: &str, base: &Url) -> Result<RawItem, ExtractionError> {
    let document = Html::parse_document(html);

    let title = first_text(&document, TITLE_SELECTORS)
        .filter(|t| t != PLACEHOLDER_TITLE)
        .ok_or(ExtractionError::MissingTitle)?;

    let mut item = RawItem::new(title, page_url);
    item.price = first_text(&document, PRICE_SELECTORS).and_then(|t| clean_price(&t));
    item.rating = first_text(&document, RATING_SELECTORS).and_then(|t| parse_rating(&t));
    item.rating_count =
        first_text(&document, RATING_COUNT_SELECTORS).and_then(|t| parse_rating_count(&t));
    item.description = first_text(&document, DESCRIPTION_SELECTORS)
        .map(|d| d.chars().take(MAX_DESCRIPTION_CHARS).collect());
    item.image_url = first_image(&document, base);
    item.is_used = Some(detect_used(
        &document,
        &item.title,
        item.description.as_deref().unwrap_or(""),
    ));

    Ok(item)
}

/// Collapsed text of the first element matching any selector, in order.
fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            document
                .select(&sel)
                .map(element_text)
                .find(|t| !t.is_empty())
        })
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_image(document: &Html, base: &Url) -> Option<String> {
    IMAGE_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            document
                .select(&sel)
                .filter_map(|img| img.value().attr("src"))
                .find(|src| !src.trim().is_empty())
                .map(|src| normalize_image_url(src.trim(), base))
        })
}

/// Make an image `src` absolute.
pub fn normalize_image_url(src: &str, base: &Url) -> String {
    if let Some(rest) = src.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    if src.starts_with('/') {
        return base.join(src).map(|u| u.to_string()).unwrap_or_else(|_| src.to_string());
    }
    src.to_string()
}

/// Keep only the digits of a displayed price: `Rp1.250.000` → `1250000`.
pub fn clean_price(text: &str) -> Option<f64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// First number in the text, accepting a comma as the decimal separator.
pub fn parse_rating(text: &str) -> Option<f64> {
    let m = RATING_RE.find(text)?;
    m.as_str().replace(',', ".").parse().ok()
}

/// Review counts as displayed: `(1.234 rating)`, `2,5 rb ulasan`, `1 juta`.
///
/// Without a magnitude suffix separators are thousands separators; with one
/// they are decimal points.
pub fn parse_rating_count(text: &str) -> Option<i64> {
    let caps = COUNT_RE.captures(text)?;
    let number = caps.get(1)?.as_str();

    match caps.get(2).map(|m| m.as_str().to_lowercase()) {
        Some(suffix) => {
            let value: f64 = number.replace(',', ".").parse().ok()?;
            let factor = if suffix == "juta" { 1_000_000.0 } else { 1_000.0 };
            Some((value * factor).round() as i64)
        }
        None => {
            let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
    }
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn has_any_word(text: &str, vocabulary: &[&str]) -> bool {
    words(text).iter().any(|w| vocabulary.contains(&w.as_str()))
}

/// Whether the listing is for a pre-owned item.
///
/// Reads the labelled condition field when the page has one, otherwise
/// falls back to keywords in the title and description.
pub fn detect_used(document: &Html, title: &str, description: &str) -> bool {
    if let Some(used) = condition_field(document) {
        return used;
    }
    has_any_word(&format!("{} {}", title, description), USED_HINTS)
}

/// Value of the "Kondisi: ..." field, if present and recognizable.
fn condition_field(document: &Html) -> Option<bool> {
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let lower = text.to_lowercase();
        if !CONDITION_LABELS.iter().any(|l| lower.contains(l)) {
            continue;
        }

        // The label and its value are usually siblings inside a small
        // container, so widen the window a few ancestors at a time.
        for ancestor in node.ancestors().take(3) {
            let Some(element) = ElementRef::wrap(ancestor) else {
                continue;
            };
            let name = element.value().name();
            if name == "script" || name == "style" {
                break;
            }
            let context = element_text(element);
            if has_any_word(&context, USED_WORDS) {
                return Some(true);
            }
            if has_any_word(&context, NEW_WORDS) {
                return Some(false);
            }
        }
    }
    None
}
