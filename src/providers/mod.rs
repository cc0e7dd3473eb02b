//! External product-data providers.
//!
//! Each adapter owns its request shape, timeout and status mapping, and hands
//! back a [`RawProductPayload`] with every field optional. Adapters never retry.

pub mod oxylabs;
pub mod rainforest;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::LookupConfig;
use crate::lookup::extract::parse_rank_text;

pub use oxylabs::OxylabsProvider;
pub use rainforest::RainforestProvider;

/// How an adapter turns a code that is not yet an identifier into a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    /// Codes that need a search go through `search_for_identifier` first.
    SearchThenDetail,
    /// The detail endpoint accepts UPC/ISBN-13 directly; no search call.
    DirectCode,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider rejected credentials")]
    Auth,
    #[error("provider quota exhausted")]
    QuotaExhausted,
    #[error("provider rate limited the request")]
    RateLimited,
    #[error("provider has no product for this identifier")]
    NotFound,
    #[error("provider call timed out")]
    Timeout,
    #[error("provider returned status {0}")]
    Unavailable(u16),
    #[error("provider transport error: {0}")]
    Transport(String),
    #[error("provider payload could not be decoded: {0}")]
    Malformed(String),
    #[error("provider is not configured")]
    NotConfigured,
}

impl ProviderError {
    /// Map a non-success HTTP status into the shared taxonomy.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        Self::from_status_code(status.as_u16())
    }

    /// Same mapping for statuses reported inside a 200 response body.
    pub fn from_status_code(status: u16) -> Self {
        match status {
            401 | 403 => ProviderError::Auth,
            402 => ProviderError::QuotaExhausted,
            429 => ProviderError::RateLimited,
            404 => ProviderError::NotFound,
            other => ProviderError::Unavailable(other),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Auth => "auth",
            ProviderError::QuotaExhausted => "quota_exhausted",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::NotFound => "not_found",
            ProviderError::Timeout => "timeout",
            ProviderError::Unavailable(_) => "unavailable",
            ProviderError::Transport(_) => "transport",
            ProviderError::Malformed(_) => "malformed",
            ProviderError::NotConfigured => "not_configured",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Malformed(err.without_url().to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_status(status)
        } else {
            ProviderError::Transport(err.without_url().to_string())
        }
    }
}

/// One entry of a provider's buy-box array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuyBoxOffer {
    pub price: Option<f64>,
    pub condition: Option<String>,
}

/// One third-party listing from a flat offer list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketOffer {
    pub price: Option<f64>,
    pub condition: Option<String>,
}

/// A sales rank and the category ladder it was reported against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub rank: Option<u64>,
    pub ladder: Vec<String>,
}

/// Provider product detail mapped into one shape; nothing here is trusted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProductPayload {
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub buybox: Vec<BuyBoxOffer>,
    pub price_buybox: Option<f64>,
    pub price: Option<f64>,
    pub offers: Vec<MarketOffer>,
    pub sales_rank: Vec<RankEntry>,
    pub sales_rank_text: Option<String>,
    pub categories: Vec<String>,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn strategy(&self) -> LookupStrategy;

    /// Resolve a UPC/ISBN-13 to the first matching product identifier.
    async fn search_for_identifier(&self, code: &str) -> Result<Option<String>, ProviderError>;

    /// Fetch product detail for an ASIN (or ASIN-equivalent ISBN-10).
    async fn lookup_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<RawProductPayload, ProviderError>;
}

/// Configured adapters by name plus the one used when a route names none.
#[derive(Clone)]
pub struct ProviderRegistry {
    adapters: BTreeMap<&'static str, Arc<dyn ProviderAdapter>>,
    default: &'static str,
}

impl ProviderRegistry {
    pub fn new(default: &'static str) -> Self {
        Self {
            adapters: BTreeMap::new(),
            default,
        }
    }

    pub fn register(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.name(), adapter);
        self
    }

    /// Build adapters for every provider whose credentials are present.
    pub fn from_config(config: &LookupConfig) -> anyhow::Result<Self> {
        let mut registry = Self::new(config.default_provider.as_str());
        if let Some(oxylabs) = config.oxylabs.as_ref() {
            registry = registry.register(Arc::new(OxylabsProvider::new(oxylabs)?));
        }
        if let Some(rainforest) = config.rainforest.as_ref() {
            registry = registry.register(Arc::new(RainforestProvider::new(rainforest)?));
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn default_provider(&self) -> Option<Arc<dyn ProviderAdapter>> {
        self.get(self.default)
    }

    pub fn default_name(&self) -> &'static str {
        self.default
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.adapters.keys().copied().collect()
    }
}

/// Known provider names, whether or not they are configured.
pub const KNOWN_PROVIDERS: [&str; 2] = [oxylabs::PROVIDER_NAME, rainforest::PROVIDER_NAME];

pub(crate) fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

/// Numbers arrive as JSON numbers, numeric strings, "$1,234.56" or "12,99 €".
pub(crate) fn value_as_f64(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    parse_price_text(v.as_str()?)
}

/// A comma is the decimal separator only when it is the last separator and
/// followed by exactly two digits. Other ambiguous groupings yield `None`.
pub(crate) fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    let negative = cleaned.starts_with('-');
    let body = cleaned.trim_start_matches('-');
    if body.is_empty() || body.contains('-') {
        return None;
    }

    let (int_part, frac_part, thousands) = match body.rfind(['.', ',']) {
        None => (body, "", ','),
        Some(i) => {
            let (head, tail) = (&body[..i], &body[i + 1..]);
            match &body[i..=i] {
                "," if tail.len() == 2 && !head.contains(',') => (head, tail, '.'),
                "." if !head.contains('.') => (head, tail, ','),
                // Only grouping separators, e.g. "1,234".
                "," if !body.contains('.') => (body, "", ','),
                "." if !body.contains(',') => (body, "", '.'),
                _ => return None,
            }
        }
    };

    let int_digits = if int_part.is_empty() && !frac_part.is_empty() {
        "0".to_string()
    } else {
        grouped_digits(int_part, thousands)?
    };
    if !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let sign = if negative { "-" } else { "" };
    let frac = if frac_part.is_empty() { "0" } else { frac_part };
    format!("{sign}{int_digits}.{frac}").parse().ok()
}

/// Digits of "1,234,567" style groups; `None` when the grouping is irregular.
fn grouped_digits(s: &str, sep: char) -> Option<String> {
    let groups: Vec<&str> = s.split(sep).collect();
    let all_digits = |g: &str| !g.is_empty() && g.chars().all(|c| c.is_ascii_digit());
    if !groups.iter().all(|g| all_digits(g)) {
        return None;
    }
    if groups.len() > 1 && (groups[0].len() > 3 || groups[1..].iter().any(|g| g.len() != 3)) {
        return None;
    }
    Some(groups.concat())
}

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(value_as_f64))
}

pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref()
        .and_then(|v| v.as_u64().or_else(|| parse_rank_text(v.as_str()?))))
}
