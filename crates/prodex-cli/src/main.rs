use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use prodex_core::load_app_config;
use prodex_crawler::{FetcherConfig, PageFetcher};
use prodex_dedup::{Deduplicator, MergeStrategy};
use prodex_extract::{HybridConfig, HybridExtractor, SchemaGenerator, Strategy};
use prodex_store::{JsonStorage, ListQuery};

#[derive(Debug, Parser)]
#[command(name = "prodex")]
#[command(about = "Extract structured product data from e-commerce pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract a product page and save the result
    Extract {
        /// Product page URL
        url: String,

        /// Extraction strategies, in order (auto, css, xpath, llm)
        #[arg(long, value_delimiter = ',', default_values = ["auto", "css", "xpath", "llm"])]
        strategy: Vec<String>,

        /// Return the first successful strategy instead of merging
        #[arg(long)]
        no_merge: bool,

        /// Force JS rendering for this extraction
        #[arg(long)]
        js: bool,

        /// Storage directory (defaults to PRODEX_STORAGE_DIR)
        #[arg(long)]
        storage_dir: Option<PathBuf>,

        /// Print the extracted product without saving it
        #[arg(long)]
        dry_run: bool,
    },
    /// List stored products
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 20)]
        page_size: usize,

        #[arg(long)]
        storage_dir: Option<PathBuf>,
    },
    /// Show one stored product
    Show {
        /// Product id
        id: String,

        /// Show a specific version instead of the current record
        #[arg(long)]
        version: Option<u32>,

        #[arg(long)]
        storage_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| {
        let level = std::env::var("PRODEX_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(level)
    })?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let config = load_app_config().context("failed to load configuration")?;

    match cli.command {
        Commands::Extract {
            url,
            strategy,
            no_merge,
            js,
            storage_dir,
            dry_run,
        } => {
            let extraction_order: Vec<Strategy> = strategy
                .iter()
                .map(|s| s.parse::<Strategy>().map_err(anyhow::Error::msg))
                .collect::<anyhow::Result<_>>()?;

            let mut fetcher_config = FetcherConfig::from_app_config(&config);
            fetcher_config.js_enabled = fetcher_config.js_enabled || js;
            let fetcher =
                PageFetcher::new(fetcher_config).context("failed to build fetcher")?;

            let generator =
                Arc::new(SchemaGenerator::new().with_cache_dir(&config.schema_cache_dir));
            let extractor = HybridExtractor::new(fetcher, generator);

            let hybrid_config = HybridConfig {
                extraction_order,
                merge_results: !no_merge,
                ..HybridConfig::default()
            };
            let product = extractor.extract(&url, &hybrid_config, &[]).await;
            if !product.extraction_success {
                tracing::error!(url, "extraction failed");
            }

            if dry_run {
                println!("{}", serde_json::to_string_pretty(&product)?);
                return Ok(());
            }

            let storage = JsonStorage::open(storage_dir.unwrap_or(config.storage_dir))
                .await
                .context("failed to open storage")?
                .with_versioning(true);

            // Deduplicate against what is already stored before saving.
            let deduplicator = Deduplicator::default();
            let existing = storage.list_products(&ListQuery::default()).await?;
            let duplicate = existing.products.iter().find(|stored| {
                deduplicator.is_duplicate_by_id(&stored.product, &product)
                    || deduplicator.is_duplicate_by_similarity(&stored.product, &product)
            });

            match duplicate {
                Some(stored) => {
                    let merged = deduplicator.merge_products(
                        &[stored.product.clone(), product],
                        MergeStrategy::Combine,
                    )?;
                    let updated = storage.update_product(&stored.id, &merged).await?;
                    println!(
                        "updated {} (version {})",
                        updated.id,
                        updated.product.version
                    );
                }
                None => {
                    let id = storage.save_product(&product).await?;
                    println!("saved {id}");
                }
            }
        }
        Commands::List {
            page,
            page_size,
            storage_dir,
        } => {
            let storage = JsonStorage::open(storage_dir.unwrap_or(config.storage_dir)).await?;
            let result = storage
                .list_products(&ListQuery {
                    page,
                    page_size,
                    sort_by: Some("metadata.updated_at".to_owned()),
                    ..ListQuery::default()
                })
                .await?;
            for stored in &result.products {
                println!(
                    "{}\t{}\tv{}\t{} {}",
                    stored.id,
                    stored.product.title,
                    stored.product.version,
                    stored.product.price.current_price,
                    stored.product.price.currency,
                );
            }
            println!(
                "page {}/{} ({} products)",
                result.page, result.total_pages, result.total
            );
        }
        Commands::Show {
            id,
            version,
            storage_dir,
        } => {
            let storage = JsonStorage::open(storage_dir.unwrap_or(config.storage_dir)).await?;
            let record = match version {
                Some(version) => storage.get_product_version(&id, version).await?,
                None => storage.get_product(&id).await?,
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
