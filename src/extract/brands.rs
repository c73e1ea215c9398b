use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

use super::{element_text, query_param, resolve};
use crate::records::Brand;

/// Parse the root catalog page into brand records. The page lists brands
/// as a grid of cells inside `tr.viewCatList__row`; the cell link carries
/// the brand ID in its `PBCATID` query parameter. A missing grid is a
/// normal "no rows" outcome, not an error.
pub fn extract(html: &str, base: &Url) -> Vec<Brand> {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse("tr.viewCatList__row").unwrap();
    let cell_sel = Selector::parse("td").unwrap();
    let link_sel = Selector::parse("a.PBLink").unwrap();
    let title_sel = Selector::parse("h3.PBCatSubTitle").unwrap();
    let img_sel = Selector::parse("img.imgcat").unwrap();

    let mut brands = Vec::new();
    let mut seen = HashSet::new();

    for row in document.select(&row_sel) {
        for cell in row.select(&cell_sel) {
            let Some(href) = cell
                .select(&link_sel)
                .filter_map(|a| a.value().attr("href"))
                .find(|h| h.contains("PBCATID="))
            else {
                continue;
            };
            let Ok(url) = base.join(href) else { continue };

            let id = query_param(&url, "PBCATID").unwrap_or_else(|| "N/A".to_string());
            if !seen.insert(id.clone()) {
                continue;
            }

            let name = cell
                .select(&title_sel)
                .next()
                .and_then(element_text)
                .or_else(|| query_param(&url, "PBCATName"));

            let image_url = cell
                .select(&img_sel)
                .next()
                .and_then(|img| img.value().attr("src"))
                .and_then(|src| resolve(base, src));

            // A cell with neither a real ID nor a name carries nothing usable.
            if id == "N/A" && name.is_none() {
                continue;
            }

            let name = name.unwrap_or_else(|| format!("Unnamed Brand {}", brands.len() + 1));
            brands.push(Brand {
                id,
                name,
                url: url.to_string(),
                image_url,
            });
        }
    }

    brands
}
