use std::collections::HashSet;

use scraper::{Html, Selector};
use serde_json::{Map, Value};
use url::Url;

use super::{clean_text, element_text, resolve};

/// Site-wide root for images referenced by bare filename in `data-image`
/// attributes.
const ASSET_ROOT: &str = "https://www.pieces-quad-dole.fr/";

/// Per-product detail scraped from the product page, merged into an
/// existing product record by the enrichment engine.
#[derive(Debug, Default, Clone)]
pub struct Detail {
    pub extra_images: Vec<String>,
    pub product_code: Option<String>,
    pub description: Option<String>,
    pub specifications: Map<String, Value>,
}

impl Detail {
    /// Merge the detail fields into a product object. All four keys are
    /// always written; `extra_images` becoming present is what flips the
    /// record from Pending to Enriched.
    pub fn merge_into(&self, record: &mut Map<String, Value>) {
        record.insert(
            "extra_images".to_string(),
            Value::Array(
                self.extra_images
                    .iter()
                    .map(|u| Value::String(u.clone()))
                    .collect(),
            ),
        );
        record.insert(
            "product_code".to_string(),
            self.product_code
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        record.insert(
            "description".to_string(),
            self.description
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        record.insert(
            "specifications".to_string(),
            Value::Object(self.specifications.clone()),
        );
    }
}

/// Parse a product page. Three image sources merge into one deduplicated,
/// order-preserving list: the main zoom image first, then carousel
/// thumbnails upgraded via the `-small.` to `-big.` naming convention
/// (falling back to the thumbnail URL when the convention does not
/// apply), then any element exposing a raw `data-image` filename under
/// the fixed asset root.
pub fn extract(html: &str, base: &Url) -> Detail {
    let document = Html::parse_document(html);
    let sku_sel = Selector::parse("div.PBItemSku").unwrap();
    let desc_sel = Selector::parse("div.PBItemDescription").unwrap();
    let zoom_sel = Selector::parse("div.c-ox-imgzoom__main img").unwrap();
    let thumb_sel = Selector::parse("div.mcs-item img").unwrap();
    let data_img_sel = Selector::parse("[data-image]").unwrap();
    let table_sel = Selector::parse("table.PBSpecTbl").unwrap();
    let tr_sel = Selector::parse("tr").unwrap();
    let td_sel = Selector::parse("td").unwrap();

    let mut detail = Detail::default();
    let mut seen = HashSet::new();

    if let Some(sku) = document.select(&sku_sel).next() {
        let text = sku.text().collect::<String>();
        detail.product_code = clean_text(&text.replace("(Code:", "").replace(')', ""));
    }

    if let Some(desc) = document.select(&desc_sel).next() {
        detail.description = element_text(desc);
    }

    if let Some(src) = document
        .select(&zoom_sel)
        .next()
        .and_then(|img| img.value().attr("src"))
    {
        if let Some(url) = resolve(base, src) {
            push_image(&mut detail.extra_images, &mut seen, url);
        }
    }

    for thumb in document.select(&thumb_sel) {
        if let Some(src) = thumb.value().attr("src") {
            if let Some(url) = resolve(base, src) {
                push_image(&mut detail.extra_images, &mut seen, url.replace("-small.", "-big."));
            }
        }
    }

    for element in document.select(&data_img_sel) {
        if let Some(filename) = element.value().attr("data-image").filter(|f| !f.is_empty()) {
            push_image(
                &mut detail.extra_images,
                &mut seen,
                format!("{ASSET_ROOT}{filename}"),
            );
        }
    }

    for table in document.select(&table_sel) {
        for row in table.select(&tr_sel) {
            let cells: Vec<_> = row.select(&td_sel).collect();
            // Spec tables are strictly two-column; anything else is layout.
            if cells.len() != 2 {
                continue;
            }
            if let (Some(key), Some(value)) = (element_text(cells[0]), element_text(cells[1])) {
                detail.specifications.insert(key, Value::String(value));
            }
        }
    }

    detail
}

fn push_image(images: &mut Vec<String>, seen: &mut HashSet<String>, url: String) {
    if seen.insert(url.clone()) {
        images.push(url);
    }
}
