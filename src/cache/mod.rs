//! Result cache: normalized code -> previously computed quote.
//!
//! Only error-free lookups are written. There is no negative caching, so a
//! provider outage never turns into a cached "not found".

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CacheSettings;
use crate::lookup::telemetry::DebugInfo;
use crate::normalization::{CodeType, NormalizedCode};
use crate::pricing::PricingDecision;
use crate::product::ProductRecord;

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub code_type: CodeType,
    pub product: ProductRecord,
    pub pricing: PricingDecision,
    pub message: String,
    pub debug: DebugInfo,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        let Some(ttl) = ttl else {
            return false;
        };
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(self.stored_at) > ttl,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cache entry (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage backend for cache entries, keyed by [`NormalizedCode::cache_key`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Last write wins.
    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

/// Build the configured backend: sqlite when a DSN is set, memory otherwise.
pub async fn store_from_config(settings: &CacheSettings) -> anyhow::Result<Arc<dyn CacheStore>> {
    match settings.database_url.as_deref() {
        Some(url) => Ok(Arc::new(
            SqliteCacheStore::connect(url, settings.max_connections.max(1)).await?,
        )),
        None => Ok(Arc::new(MemoryCacheStore::new())),
    }
}

/// Pipeline-facing cache. Store failures never fail a lookup: reads degrade
/// to a miss and writes are logged and dropped.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    ttl: Option<Duration>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Option<Duration>) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub async fn get(&self, code: &NormalizedCode) -> Option<CacheEntry> {
        let key = code.cache_key();
        match self.store.get(&key).await {
            Ok(Some(entry)) if entry.is_expired(self.ttl, Utc::now()) => {
                debug!(key = %key, stored_at = %entry.stored_at, "cache entry expired");
                None
            }
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, backend = self.store.backend(), error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    pub async fn put(
        &self,
        code: &NormalizedCode,
        product: &ProductRecord,
        pricing: &PricingDecision,
        message: &str,
        debug: &DebugInfo,
    ) {
        let entry = CacheEntry {
            key: code.cache_key(),
            code_type: code.code_type(),
            product: product.clone(),
            pricing: pricing.clone(),
            message: message.to_string(),
            debug: debug.clone(),
            stored_at: Utc::now(),
        };
        if let Err(e) = self.store.put(&entry).await {
            warn!(key = %entry.key, backend = self.store.backend(), error = %e, "cache write failed; continuing");
        }
    }
}
