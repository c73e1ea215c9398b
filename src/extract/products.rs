use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use super::{element_text, parse_price, resolve};
use crate::records::Product;

/// Parse a category page into product records. Product cells live in
/// `tr.viewItemList__row` rows; only cells carrying a `data-pdt-id`
/// attribute are considered at all, and that attribute is the identity
/// key. Price and stock markers are optional per cell.
pub fn extract(html: &str, base: &Url) -> Vec<Product> {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse("tr.viewItemList__row").unwrap();
    let cell_sel = Selector::parse("td.oxcell:not(.oxfirstcol)").unwrap();
    let link_sel = Selector::parse("a.PBLink").unwrap();
    let name_sel = Selector::parse("h3.PBMainTxt").unwrap();
    let img_sel = Selector::parse("img.imgthumbnail").unwrap();
    let price_sel = Selector::parse("span.PBSalesPrice").unwrap();
    let stock_sel = Selector::parse("span.PBMsgInStock").unwrap();
    let qty_re = Regex::new(r"\((\d+)").unwrap();

    let mut products = Vec::new();
    let mut seen = HashSet::new();

    for row in document.select(&row_sel) {
        for cell in row.select(&cell_sel) {
            let Some(id) = cell
                .value()
                .attr("data-pdt-id")
                .map(str::trim)
                .filter(|v| !v.is_empty())
            else {
                continue;
            };
            if !seen.insert(id.to_string()) {
                continue;
            }

            let sku = cell
                .value()
                .attr("data-pdt-sku")
                .map(|v| v.trim().to_string())
                .unwrap_or_default();
            let name = cell
                .select(&name_sel)
                .next()
                .and_then(element_text)
                .unwrap_or_else(|| "Unnamed Product".to_string());
            let url = cell
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve(base, href));
            let image_url = cell
                .select(&img_sel)
                .next()
                .and_then(|img| img.value().attr("src"))
                .and_then(|src| resolve(base, src));
            let price = cell
                .select(&price_sel)
                .next()
                .and_then(element_text)
                .and_then(|text| parse_price(&text));

            // No stock marker means not purchasable, not "unknown".
            let mut stock_status = "Out of Stock".to_string();
            let mut stock_quantity = 0u32;
            if let Some(status) = cell.select(&stock_sel).next().and_then(element_text) {
                stock_status = status;
                let cell_text = cell.text().collect::<String>();
                stock_quantity = qty_re
                    .captures(&cell_text)
                    .and_then(|caps| caps[1].parse().ok())
                    .unwrap_or(0);
            }

            products.push(Product {
                id: id.to_string(),
                sku,
                name,
                url,
                image_url,
                price,
                stock_status,
                stock_quantity,
                category_id: String::new(),
                category_name: String::new(),
                model_id: String::new(),
                model_name: String::new(),
                brand_id: String::new(),
                brand_name: String::new(),
            });
        }
    }

    products
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_fixture() -> Vec<Product> {
        let html = std::fs::read_to_string("tests/fixtures/products.html").unwrap();
        let base = Url::parse("https://www.pieces-quad-dole.fr/PBSCCatalog.asp?PBCATID=9").unwrap();
        extract(&html, &base)
    }

    #[test]
    fn extracts_products_with_price_and_stock() {
        let products = parse_fixture();
        assert_eq!(products.len(), 3);

        let pad = &products[0];
        assert_eq!(pad.id, "5001");
        assert_eq!(pad.sku, "44 210 50ADLY");
        assert_eq!(pad.name, "Brake Pad Set");
        assert_eq!(pad.price, Some(1234.50));
        assert_eq!(pad.stock_status, "In Stock (3 available)");
        assert_eq!(pad.stock_quantity, 3);
        assert_eq!(
            pad.url.as_deref(),
            Some("https://www.pieces-quad-dole.fr/PBSCProduct.asp?ItmID=5001")
        );
    }

    #[test]
    fn missing_price_is_none_and_missing_stock_defaults() {
        let products = parse_fixture();
        let bare = products.iter().find(|p| p.id == "5002").unwrap();
        assert_eq!(bare.price, None);
        assert_eq!(bare.stock_status, "Out of Stock");
        assert_eq!(bare.stock_quantity, 0);
    }

    #[test]
    fn cells_without_product_attribute_are_ignored() {
        let products = parse_fixture();
        // The fixture has a filler cell without data-pdt-id and a
        // duplicate of product 5001; neither produces a record.
        assert_eq!(products.iter().filter(|p| p.id == "5001").count(), 1);
    }

    #[test]
    fn unnamed_product_placeholder() {
        let products = parse_fixture();
        let unnamed = products.iter().find(|p| p.id == "5003").unwrap();
        assert_eq!(unnamed.name, "Unnamed Product");
        assert_eq!(unnamed.sku, "");
    }
}
