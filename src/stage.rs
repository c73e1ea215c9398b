use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use url::Url;

use crate::fetch::Fetcher;
use crate::pacer::Pacer;
use crate::records::{Parent, Stamp};

/// Drive one pipeline stage: fetch each parent's page, extract child
/// records, stamp them with the parent's identity and accumulate. One bad
/// parent never aborts the run; it just contributes zero children. The
/// caller persists the accumulated result once, at the end.
pub async fn run_stage<P, C, F>(
    fetcher: &Fetcher,
    pacer: &mut Pacer,
    parents: &[P],
    extract: F,
) -> Vec<C>
where
    P: Parent,
    C: Stamp<P>,
    F: Fn(&str, &Url) -> Vec<C>,
{
    let pb = ProgressBar::new(parents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .unwrap()
            .progress_chars("=> "),
    );

    let mut children = Vec::new();

    for parent in parents {
        let label = parent.label();
        let Some(url) = parent.url() else {
            pb.println(format!("Skipping {label}: no URL"));
            pb.inc(1);
            continue;
        };
        let Ok(base) = Url::parse(url) else {
            warn!("Invalid URL for {}: {}", label, url);
            pb.inc(1);
            continue;
        };

        pacer.wait().await;
        match fetcher.get(url).await {
            Ok(html) => {
                let mut batch = extract(&html, &base);
                if batch.is_empty() {
                    info!("No rows found at {}", url);
                }
                for child in &mut batch {
                    child.stamp(parent);
                }
                pb.println(format!("Found {} records for {label}", batch.len()));
                children.append(&mut batch);
            }
            Err(e) => {
                warn!("Fetch failed for {}: {}", label, e);
                pb.println(format!("Error scraping {label}: {e}"));
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Brand, Model};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Minimal HTTP server answering every request with the same body.
    async fn serve_html(body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{addr}/")
    }

    fn brand(id: &str, name: &str, url: String) -> Brand {
        Brand {
            id: id.into(),
            name: name.into(),
            url,
            image_url: None,
        }
    }

    fn stub_model(id: String) -> Model {
        Model {
            id,
            name: "stub".into(),
            url: "https://site/m".into(),
            image_url: None,
            brand_id: String::new(),
            brand_name: String::new(),
        }
    }

    #[tokio::test]
    async fn one_bad_parent_contributes_zero_children_and_run_continues() {
        let root = serve_html("<html></html>").await;
        let parents = vec![
            brand("1", "Unreachable", "http://127.0.0.1:1/dead".into()),
            brand("2", "Reachable", root),
        ];

        let fetcher = Fetcher::new().unwrap();
        let mut pacer = Pacer::new(Duration::ZERO);
        let children: Vec<Model> =
            run_stage(&fetcher, &mut pacer, &parents, |_html, _base| {
                vec![stub_model("m1".into())]
            })
            .await;

        // The dead parent is skipped, the run reaches the live one.
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].brand_id, "2");
        assert_eq!(children[0].brand_name, "Reachable");
    }

    #[tokio::test]
    async fn children_keep_encounter_order_and_parent_identity() {
        let root = serve_html("<html></html>").await;
        let parents = vec![
            brand("7", "Honda", format!("{root}honda")),
            brand("8", "Adly", format!("{root}adly")),
        ];

        let fetcher = Fetcher::new().unwrap();
        let mut pacer = Pacer::new(Duration::ZERO);
        let children: Vec<Model> =
            run_stage(&fetcher, &mut pacer, &parents, |_html, base| {
                let page = base.path().trim_start_matches('/').to_string();
                vec![
                    stub_model(format!("{page}-1")),
                    stub_model(format!("{page}-2")),
                ]
            })
            .await;

        let ids: Vec<&str> = children.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["honda-1", "honda-2", "adly-1", "adly-2"]);
        assert!(children[..2].iter().all(|m| m.brand_id == "7"));
        assert!(children[2..].iter().all(|m| m.brand_name == "Adly"));
    }
}
