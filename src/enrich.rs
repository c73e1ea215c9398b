use std::path::Path;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

use crate::dataset::{ArrayStream, ArrayWriter};
use crate::extract::details;
use crate::fetch::Fetcher;
use crate::pacer::Pacer;

/// Durability checkpoint: fsync the output after this many newly enriched
/// records, so a crash costs at most one batch of network calls.
const FLUSH_EVERY: usize = 10;

#[derive(Debug, Default)]
pub struct EnrichStats {
    pub total: usize,
    pub enriched: usize,
    pub passthrough: usize,
    pub failed: usize,
}

/// Resumability state of a product record, decided once at load time.
/// The `extra_images` key is the sole marker: present means a previous
/// run already enriched this record, whatever the value.
enum RecordState {
    Pending,
    Enriched,
}

fn state_of(record: &Map<String, Value>) -> RecordState {
    if record.contains_key("extra_images") {
        RecordState::Enriched
    } else {
        RecordState::Pending
    }
}

/// Stream the product dataset from `input`, enrich Pending records with
/// product-page detail and write everything to `target` through a
/// crash-safe temp-then-rename replacement.
///
/// Enriched records pass through unchanged. A failed detail fetch is
/// logged and the record is written through still Pending, so it stays
/// eligible next run; only filesystem errors abort. `limit` caps the
/// number of detail fetches for this run; records beyond it also pass
/// through Pending.
pub async fn run(
    fetcher: &Fetcher,
    pacer: &mut Pacer,
    input: &Path,
    target: &Path,
    limit: Option<usize>,
) -> Result<EnrichStats> {
    let stream = ArrayStream::open(input)?;
    let mut writer = ArrayWriter::create(target)?;
    let mut stats = EnrichStats::default();
    let mut since_sync = 0usize;
    let mut budget = limit;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {pos} records ({msg})")
            .unwrap(),
    );

    for item in stream {
        // A malformed or truncated input is fatal: abort, drop the temp
        // file and leave the previous dataset intact for a retry.
        let value = item?;
        let Value::Object(mut record) = value else {
            bail!("expected object records in {}", input.display());
        };
        stats.total += 1;
        pb.inc(1);

        if let RecordState::Enriched = state_of(&record) {
            stats.passthrough += 1;
            writer.push(&Value::Object(record))?;
            continue;
        }

        let enriched_before = stats.enriched;
        let fetched = match budget {
            Some(0) => false,
            _ => enrich_one(fetcher, pacer, &pb, &mut record, &mut stats).await,
        };
        if fetched {
            if let Some(n) = budget.as_mut() {
                *n -= 1;
            }
        }
        if stats.enriched > enriched_before {
            since_sync += 1;
        }

        writer.push(&Value::Object(record))?;

        if since_sync >= FLUSH_EVERY {
            writer.sync()?;
            since_sync = 0;
            pb.set_message(format!("checkpoint at {} enriched", stats.enriched));
        }
    }

    writer.commit()?;
    pb.finish_and_clear();
    Ok(stats)
}

/// Fetch and merge detail for one Pending record. Returns whether a
/// network request was actually made; on failure the record is left
/// unchanged (still Pending) and the run continues.
async fn enrich_one(
    fetcher: &Fetcher,
    pacer: &mut Pacer,
    pb: &ProgressBar,
    record: &mut Map<String, Value>,
    stats: &mut EnrichStats,
) -> bool {
    let name = record
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("<unnamed>")
        .to_string();
    let Some(url) = record
        .get("url")
        .and_then(|v| v.as_str())
        .map(str::to_string)
    else {
        pb.println(format!("Skipping {name}: no URL"));
        stats.failed += 1;
        return false;
    };
    let Ok(base) = Url::parse(&url) else {
        warn!("Invalid product URL for {}: {}", name, url);
        stats.failed += 1;
        return false;
    };

    pacer.wait().await;
    match fetcher.get(&url).await {
        Ok(html) => {
            let detail = details::extract(&html, &base);
            pb.println(format!(
                "Enriched {name}: {} images, {} spec rows",
                detail.extra_images.len(),
                detail.specifications.len()
            ));
            detail.merge_into(record);
            stats.enriched += 1;
            true
        }
        Err(e) => {
            warn!("Detail fetch failed for {}: {}", name, e);
            pb.println(format!("Error enriching {name}: {e}"));
            stats.failed += 1;
            true
        }
    }
}
