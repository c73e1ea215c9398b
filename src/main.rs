mod dataset;
mod enrich;
mod extract;
mod fetch;
mod pacer;
mod records;
mod stage;

use std::path::Path;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::fetch::Fetcher;
use crate::pacer::Pacer;
use crate::records::{Brand, Category, Model, Parent, Product, Stamp};

/// Root catalog page listing every brand.
const CATALOG_URL: &str = "https://www.pieces-quad-dole.fr/PBSCCatalog.asp?CatID=4260325";

/// Inter-request politeness delays per stage.
const STAGE_DELAY: Duration = Duration::from_secs(2);
const CATEGORY_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "quad_scraper", about = "Catalog hierarchy scraper for pieces-quad-dole.fr")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the root catalog page into brands.json
    Brands,
    /// Scrape each brand page for models into brand_models.json
    Models,
    /// Scrape each model page for part categories into model_categories.json
    Categories,
    /// Scrape each category page for products into products.json
    Products,
    /// Fetch per-product detail and merge into products_enhanced.json
    Enrich {
        /// Max detail fetches this run (default: all pending)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show dataset record counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Brands => scrape_brands().await,
        Commands::Models => {
            scrape_stage::<Brand, Model, _>(
                dataset::BRANDS,
                dataset::MODELS,
                "brands",
                STAGE_DELAY,
                extract::models::extract,
            )
            .await
        }
        Commands::Categories => {
            scrape_stage::<Model, Category, _>(
                dataset::MODELS,
                dataset::CATEGORIES,
                "models",
                CATEGORY_DELAY,
                extract::categories::extract,
            )
            .await
        }
        Commands::Products => {
            scrape_stage::<Category, Product, _>(
                dataset::CATEGORIES,
                dataset::PRODUCTS,
                "categories",
                STAGE_DELAY,
                extract::products::extract,
            )
            .await
        }
        Commands::Enrich { limit } => enrich_products(limit).await,
        Commands::Stats => print_stats(),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// First stage: one fetch of the fixed catalog page, no input dataset.
async fn scrape_brands() -> anyhow::Result<()> {
    println!("Scraping brands from {CATALOG_URL}");
    let fetcher = Fetcher::new()?;
    let base = Url::parse(CATALOG_URL)?;
    let html = match fetcher.get(CATALOG_URL).await {
        Ok(html) => html,
        Err(e) => {
            println!("Error fetching catalog page: {e}");
            return Ok(());
        }
    };

    let brands = extract::brands::extract(&html, &base);
    if brands.is_empty() {
        println!("No brands found!");
        return Ok(());
    }

    println!("\nSuccessfully scraped {} brands:", brands.len());
    for brand in &brands {
        println!("- {} (ID: {})", brand.name, brand.id);
    }
    dataset::write_array(dataset::BRANDS, &brands)?;
    println!("\nBrands saved to {}", dataset::BRANDS);
    Ok(())
}

/// Shared driver for the models, categories and products stages: load the
/// parent dataset, run the stage, write the child dataset once at the end.
async fn scrape_stage<P, C, F>(
    input: &str,
    output: &str,
    prev_stage: &str,
    delay: Duration,
    extract: F,
) -> anyhow::Result<()>
where
    P: Parent + DeserializeOwned,
    C: Stamp<P> + Serialize,
    F: Fn(&str, &Url) -> Vec<C>,
{
    if !Path::new(input).exists() {
        println!("Error: {input} not found. Run the '{prev_stage}' stage first.");
        return Ok(());
    }
    let parents: Vec<P> = dataset::read_array(input)?;
    println!("Processing {} records from {input}", parents.len());

    let fetcher = Fetcher::new()?;
    let mut pacer = Pacer::new(delay);
    let children = stage::run_stage(&fetcher, &mut pacer, &parents, extract).await;

    dataset::write_array(output, &children)?;
    println!(
        "\nScraping complete! Found {} records across {} parents.",
        children.len(),
        parents.len()
    );
    println!("Results saved to {output}");
    Ok(())
}

async fn enrich_products(limit: Option<usize>) -> anyhow::Result<()> {
    // Resume from the previous enriched dataset when one exists, so
    // records enriched by earlier runs are not fetched again.
    let input = if Path::new(dataset::ENHANCED).exists() {
        dataset::ENHANCED
    } else if Path::new(dataset::PRODUCTS).exists() {
        dataset::PRODUCTS
    } else {
        println!(
            "Error: {} not found. Run the 'products' stage first.",
            dataset::PRODUCTS
        );
        return Ok(());
    };
    println!("Enriching products from {input} (streaming)...");

    let fetcher = Fetcher::new()?;
    let mut pacer = Pacer::new(STAGE_DELAY);
    let stats = enrich::run(
        &fetcher,
        &mut pacer,
        Path::new(input),
        Path::new(dataset::ENHANCED),
        limit,
    )
    .await?;

    println!(
        "\nDone: {} records ({} enriched, {} already done, {} failed and still pending).",
        stats.total, stats.enriched, stats.passthrough, stats.failed
    );
    println!("Enhanced product data saved to {}", dataset::ENHANCED);
    Ok(())
}

fn print_stats() -> anyhow::Result<()> {
    for (label, path) in [
        ("Brands", dataset::BRANDS),
        ("Models", dataset::MODELS),
        ("Categories", dataset::CATEGORIES),
        ("Products", dataset::PRODUCTS),
    ] {
        match count_records(path)? {
            Some((total, _)) => println!("{label:<10} {total:>6}  ({path})"),
            None => println!("{label:<10}      -  ({path} missing)"),
        }
    }
    match count_records(dataset::ENHANCED)? {
        Some((total, enriched)) => {
            println!(
                "Enhanced   {total:>6}  ({} enriched, {} pending)",
                enriched,
                total - enriched
            );
        }
        None => println!("Enhanced        -  ({} missing)", dataset::ENHANCED),
    }
    Ok(())
}

/// Count records in a dataset file, and how many carry the enrichment
/// marker, without loading the whole array.
fn count_records(path: &str) -> anyhow::Result<Option<(usize, usize)>> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let mut total = 0usize;
    let mut enriched = 0usize;
    for item in dataset::ArrayStream::open(path)? {
        let value = item?;
        total += 1;
        if value
            .as_object()
            .is_some_and(|o| o.contains_key("extra_images"))
        {
            enriched += 1;
        }
    }
    Ok(Some((total, enriched)))
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
