pub mod brands;
pub mod categories;
pub mod details;
pub mod models;
pub mod products;

use scraper::ElementRef;
use url::Url;

/// Collapse runs of whitespace and trim; empty text maps to None.
pub(crate) fn clean_text(raw: &str) -> Option<String> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub(crate) fn element_text(element: ElementRef<'_>) -> Option<String> {
    clean_text(&element.text().collect::<String>())
}

/// Strip everything but digits, comma and dot, normalize the comma to a
/// decimal point and parse. An unparseable or non-finite result is None,
/// never zero. The site groups thousands with spaces; a dot-grouped
/// price like "1.234,56" cleans to two decimal points and is rejected
/// rather than guessed at.
pub(crate) fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    cleaned
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite())
}

/// Resolve an href against the page URL, yielding an absolute URL string.
pub(crate) fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href).ok().map(|u| u.to_string())
}

/// First value of a query parameter, ignoring empty values.
pub(crate) fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}
