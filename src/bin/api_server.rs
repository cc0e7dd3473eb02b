// HTTP API server binary for scan-quote

use anyhow::{Context, Result};
use scan_quote::api::ApiServer;
use scan_quote::config::{LookupConfig, ProviderKind};
use scan_quote::logging::init_tracing;
use scan_quote::lookup::QuotePipeline;
use scan_quote::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    init_tracing("info,sqlx=warn")?;

    env_util::preflight_check(
        "api_server",
        &["PRICING_ENGINE_URL"],
        &[
            "LOOKUP_PROVIDER",
            "OXYLABS_USERNAME",
            "OXYLABS_PASSWORD",
            "RAINFOREST_API_KEY",
            "PRICING_ENGINE_URL",
            "CACHE_DATABASE_URL",
            "CACHE_TTL_SECS",
            "API_HOST",
            "API_PORT",
        ],
    )?;

    let config = LookupConfig::from_env().context("loading lookup configuration")?;
    if !config.is_configured(config.default_provider) {
        tracing::warn!(
            provider = %config.default_provider,
            "default lookup provider has no credentials; its route will answer 500"
        );
    }
    for kind in [ProviderKind::Oxylabs, ProviderKind::Rainforest] {
        tracing::info!(provider = %kind, configured = config.is_configured(kind), "provider credentials");
    }

    let server = ApiServer::from_env()?;
    let pipeline = QuotePipeline::from_config(&config)
        .await
        .context("building quote pipeline")?;

    server.run(pipeline).await?;

    Ok(())
}
