use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::models::ProductEntry;

// ── Constants ────────────────────────────────────────────────────────────────

pub const MAX_PRODUCTS: usize = 5;

/// Listing cards rendered by the catalog page.
pub const PRODUCT_CARD: &str = "li.product-base";
const PRODUCT_NAME: &str = ".product-product";

// ── Lazy static selectors ────────────────────────────────────────────────────

static CARD_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(PRODUCT_CARD).unwrap());

static NAME_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(PRODUCT_NAME).unwrap());

static ANCHOR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

// ── Public API ───────────────────────────────────────────────────────────────

/// Pull up to [`MAX_PRODUCTS`] entries out of a rendered listing page.
///
/// Only the first five cards are considered. Cards without a name or a
/// link are skipped rather than padded, so fewer than five entries may come
/// back even when more cards exist.
pub fn extract_products(html: &str, origin: &str) -> Vec<ProductEntry> {
    let document = Html::parse_document(html);

    document
        .select(&CARD_SEL)
        .take(MAX_PRODUCTS)
        .filter_map(|card| extract_card(card, origin))
        .collect()
}

fn extract_card(card: ElementRef<'_>, origin: &str) -> Option<ProductEntry> {
    let title = card
        .select(&NAME_SEL)
        .next()
        .map(|el| normalize_text(collect_text(el)))
        .filter(|s| !s.is_empty())?;

    let href = card
        .select(&ANCHOR_SEL)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    Some(ProductEntry {
        title,
        url: absolute_link(origin, href),
    })
}

/// Prefix a card's relative link with the site origin. Hrefs that are
/// already absolute are kept.
fn absolute_link(origin: &str, href: &str) -> String {
    if href.starts_with("https://") || href.starts_with("http://") {
        return href.to_string();
    }
    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        href.trim_start_matches('/')
    )
}

// ── DOM utility helpers ──────────────────────────────────────────────────────

/// Recursively collect all text from an element and its descendants.
fn collect_text(el: ElementRef<'_>) -> String {
    use scraper::node::Node;
    let mut parts = Vec::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => parts.push((&*text.text).to_string()),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    parts.push(collect_text(child_el));
                }
            }
            _ => {}
        }
    }
    parts.join("")
}

fn normalize_text(text: String) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
