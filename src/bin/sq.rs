use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scan_quote::cache::store_from_config;
use scan_quote::config::LookupConfig;
use scan_quote::logging::init_tracing;
use scan_quote::lookup::QuotePipeline;
use scan_quote::normalization::normalize;
use scan_quote::providers::KNOWN_PROVIDERS;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sq", version, about = "scan-quote operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Classify a scanned code and print the normalized form
    Normalize { code: String },
    /// Run a full quote: provider lookup, pricing decision and cache write
    Lookup {
        code: String,
        /// Provider to use instead of LOOKUP_PROVIDER
        #[arg(long)]
        provider: Option<String>,
    },
    /// Print the cached entry for a code, if any
    CacheGet { code: String },
    /// Remove the cached entry for a code
    CachePurge { code: String },
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cache key for a code, refusing codes that can never be cached.
fn cache_key(code: &str) -> Result<String> {
    let normalized = normalize(code);
    if normalized.is_unknown() {
        bail!("{code:?} is not an ISBN, UPC or ASIN");
    }
    Ok(normalized.cache_key())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("warn")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize { code } => print_json(&normalize(&code))?,
        Commands::Lookup { code, provider } => {
            if let Some(name) = provider.as_deref() {
                if !KNOWN_PROVIDERS.contains(&name) {
                    bail!("unknown provider {name:?}; expected one of {KNOWN_PROVIDERS:?}");
                }
            }
            let config = LookupConfig::from_env()?;
            let pipeline = QuotePipeline::from_config(&config).await?;
            let quote = pipeline
                .quote(&code, provider.as_deref())
                .await
                .with_context(|| format!("lookup failed for {code:?}"))?;
            print_json(&quote)?;
        }
        Commands::CacheGet { code } => {
            let key = cache_key(&code)?;
            let config = LookupConfig::from_env()?;
            let store = store_from_config(&config.cache).await?;
            match store.get(&key).await? {
                Some(entry) => print_json(&entry)?,
                None => info!(key = %key, backend = store.backend(), "cache-get: no entry"),
            }
        }
        Commands::CachePurge { code } => {
            let key = cache_key(&code)?;
            let config = LookupConfig::from_env()?;
            let store = store_from_config(&config.cache).await?;
            let removed = store.remove(&key).await?;
            println!("{key}: {}", if removed { "removed" } else { "not cached" });
        }
    }
    Ok(())
}
