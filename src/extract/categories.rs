use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

use super::{element_text, query_param, resolve};
use crate::records::Category;

/// Parse a model page into part-category records. Identical grid shape to
/// the model listing; the category image is optional on this template.
pub fn extract(html: &str, base: &Url) -> Vec<Category> {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse("tr.viewCatList__row").unwrap();
    let cell_sel = Selector::parse("td.oxcell").unwrap();
    let link_sel = Selector::parse("a.PBLink").unwrap();
    let title_sel = Selector::parse("h3.PBCatSubTitle").unwrap();
    let img_sel = Selector::parse("img.imgcat").unwrap();

    let mut categories = Vec::new();
    let mut seen = HashSet::new();

    for row in document.select(&row_sel) {
        for cell in row.select(&cell_sel) {
            let Some(href) = cell
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
            else {
                continue;
            };
            let Ok(url) = base.join(href) else { continue };
            let Some(id) = query_param(&url, "PBCATID") else {
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }

            let name = cell
                .select(&title_sel)
                .next()
                .and_then(element_text)
                .unwrap_or_else(|| "Unnamed Category".to_string());
            let image_url = cell
                .select(&img_sel)
                .next()
                .and_then(|img| img.value().attr("src"))
                .and_then(|src| resolve(base, src));

            categories.push(Category {
                id,
                name,
                url: url.to_string(),
                image_url,
                model_id: String::new(),
                model_name: String::new(),
                brand_id: String::new(),
                brand_name: String::new(),
            });
        }
    }

    categories
}
