use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nucleus_resolver::code::decode_base62;
use nucleus_resolver::config::{AppConfig, StoreBackend};
use nucleus_resolver::db::open_store;
use nucleus_resolver::ingest::{BatchIngestor, ErrorPolicy, IngestOptions};
use nucleus_resolver::normalize::{linkedin_company_url, linkedin_slug};
use nucleus_resolver::NucleusResolver;
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nucleus")]
#[command(about = "Resolve scraped company names to canonical company records")]
struct Args {
    /// Store URL (postgres://... or a SQLite path); overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the store schema
    Init,

    /// Resolve one or more company names
    Resolve {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Resolve every company name in a CSV file
    Ingest {
        path: PathBuf,

        /// Header of the company name column
        #[arg(long, default_value = "Company")]
        column: String,

        /// Stop at the first store error instead of skipping the row
        #[arg(long)]
        abort_on_error: bool,
    },

    /// Show a nucleus with its variants and projected companies
    Show { id: String },

    /// Decode a canonical id back into its normalized name
    Decode { code: String },

    /// List projected companies that still lack a profile url
    PendingUrls,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::load()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(url) = &args.database_url {
        config.store = StoreBackend::from_url(url, config.max_connections);
    }

    match args.command {
        Command::Decode { code } => {
            println!("{}", decode_base62(&code)?);
        }
        Command::Init => {
            open_store(&config.store).await?;
            info!("Store schema ready");
        }
        Command::Resolve { names } => {
            let store = open_store(&config.store).await?;
            let resolver = NucleusResolver::with_config(store, config.resolver)?;
            for name in names {
                match resolver.resolve(&name).await {
                    Ok(resolution) => println!(
                        "{}",
                        json!({
                            "name": name,
                            "canonical_id": resolution.canonical_id,
                            "classification": resolution.classification,
                        })
                    ),
                    Err(e) => {
                        error!("Failed to resolve '{}': {}", name, e);
                        return Err(e.into());
                    }
                }
            }
        }
        Command::Ingest {
            path,
            column,
            abort_on_error,
        } => {
            let store = open_store(&config.store).await?;
            let resolver = NucleusResolver::with_config(store, config.resolver)?;
            let options = IngestOptions {
                column,
                on_error: if abort_on_error {
                    ErrorPolicy::Abort
                } else {
                    ErrorPolicy::Skip
                },
            };
            let report = BatchIngestor::new(&resolver, options)
                .ingest_path(&path)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Show { id } => {
            let store = open_store(&config.store).await?;
            let nucleus = store
                .get_nucleus(&id)
                .await?
                .with_context(|| format!("no nucleus with id {}", id))?;
            let companies = store.companies_for(&id).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "nucleus": nucleus,
                    "companies": companies,
                }))?
            );
        }
        Command::PendingUrls => {
            let store = open_store(&config.store).await?;
            for name in store.companies_missing_url().await? {
                println!("{}\t{}", name, linkedin_company_url(&linkedin_slug(&name)));
            }
        }
    }

    Ok(())
}
