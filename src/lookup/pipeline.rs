use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::error::LookupError;
use super::inflight::InFlightLocks;
use super::orchestrator::LookupOrchestrator;
use super::telemetry::DebugInfo;
use crate::cache::{store_from_config, CacheEntry, ResultCache};
use crate::config::LookupConfig;
use crate::normalization::normalize;
use crate::pricing::{HttpPricingEngine, PricingDecision, PricingEngine};
use crate::product::ProductRecord;
use crate::providers::ProviderRegistry;

pub const CACHED_SUFFIX: &str = " (cached)";

/// `data` payload of a successful quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteData {
    pub product: ProductRecord,
    pub pricing: PricingDecision,
    pub message: String,
    pub debug: DebugInfo,
}

impl QuoteData {
    pub fn cache_hit(&self) -> bool {
        self.debug.telemetry.cache_hit
    }

    fn from_cache(entry: CacheEntry) -> Self {
        let telemetry = entry.debug.telemetry.as_cache_hit();
        Self {
            product: entry.product,
            pricing: entry.pricing,
            message: format!("{}{CACHED_SUFFIX}", entry.message),
            debug: DebugInfo {
                telemetry,
                ..entry.debug
            },
        }
    }
}

/// raw code -> normalize -> cache -> provider -> pricing engine -> cache write.
#[derive(Clone)]
pub struct QuotePipeline {
    registry: ProviderRegistry,
    cache: ResultCache,
    pricing: Arc<dyn PricingEngine>,
    inflight: Option<InFlightLocks>,
}

impl QuotePipeline {
    pub fn new(
        registry: ProviderRegistry,
        cache: ResultCache,
        pricing: Arc<dyn PricingEngine>,
    ) -> Self {
        Self {
            registry,
            cache,
            pricing,
            inflight: Some(InFlightLocks::new()),
        }
    }

    pub fn without_inflight_dedupe(mut self) -> Self {
        self.inflight = None;
        self
    }

    /// Wire providers, cache store and pricing engine from configuration.
    pub async fn from_config(config: &LookupConfig) -> anyhow::Result<Self> {
        let registry = ProviderRegistry::from_config(config)?;
        let store = store_from_config(&config.cache).await?;
        let pricing = Arc::new(HttpPricingEngine::new(&config.pricing)?);

        info!(
            providers = ?registry.names(),
            default_provider = registry.default_name(),
            cache_backend = store.backend(),
            cache_ttl_secs = ?config.cache.ttl.map(|t| t.as_secs()),
            dedupe_inflight = config.dedupe_inflight,
            "quote pipeline ready"
        );

        let pipeline = Self::new(registry, ResultCache::new(store, config.cache.ttl), pricing);
        Ok(if config.dedupe_inflight {
            pipeline
        } else {
            pipeline.without_inflight_dedupe()
        })
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Quote a raw code using the named provider, or the default one.
    pub async fn quote(&self, raw: &str, provider: Option<&str>) -> Result<QuoteData, LookupError> {
        let code = normalize(raw);
        if code.is_unknown() {
            warn!(raw_len = raw.len(), "rejecting unclassifiable code");
            return Err(LookupError::InvalidInput(raw.to_string()));
        }

        let provider_name = provider.unwrap_or(self.registry.default_name());
        let adapter = self
            .registry
            .get(provider_name)
            .ok_or_else(|| LookupError::ProviderNotConfigured(provider_name.to_string()))?;
        let orchestrator = LookupOrchestrator::new(adapter);

        let key = code.cache_key();
        let _inflight = match &self.inflight {
            Some(locks) => Some(locks.acquire(&key).await),
            None => None,
        };

        if let Some(entry) = self.cache.get(&code).await {
            info!(key = %key, provider = provider_name, "quote served from cache");
            return Ok(QuoteData::from_cache(entry));
        }

        let resolved = match orchestrator.resolve(&code).await {
            Ok(resolved) => resolved,
            Err(failure) => {
                let t = &failure.telemetry;
                error!(
                    key = %key,
                    provider = provider_name,
                    kind = failure.error.kind(),
                    calls = ?t.provider_call_sequence,
                    call_ms = ?t.per_call_durations_ms,
                    elapsed_ms = t.total_duration_ms,
                    error = %failure.error,
                    "lookup failed"
                );
                return Err(failure.error);
            }
        };

        if !resolved.product.has_usable_price() {
            warn!(
                key = %key,
                provider = provider_name,
                identifier = %resolved.product.identifier,
                "no usable offer price; deferring to pricing engine"
            );
        }

        let decision = match self.pricing.decide(&resolved.product).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(
                    key = %key,
                    provider = provider_name,
                    calls = ?resolved.telemetry.provider_call_sequence,
                    elapsed_ms = resolved.telemetry.total_duration_ms,
                    error = %e,
                    "pricing decision failed"
                );
                return Err(e.into());
            }
        };

        let message = decision.human_message();
        let debug_info = DebugInfo {
            normalized: code.clone(),
            price_source: resolved.price.source_description.clone(),
            price_condition: resolved.price.best_condition,
            telemetry: resolved.telemetry,
        };
        self.cache
            .put(&code, &resolved.product, &decision, &message, &debug_info)
            .await;

        info!(
            key = %key,
            provider = provider_name,
            identifier = %resolved.product.identifier,
            accepted = decision.accepted,
            calls = ?debug_info.telemetry.provider_call_sequence,
            external_calls = debug_info.telemetry.external_calls(),
            elapsed_ms = debug_info.telemetry.total_duration_ms,
            "quote computed"
        );

        Ok(QuoteData {
            product: resolved.product,
            pricing: decision,
            message,
            debug: debug_info,
        })
    }
}
