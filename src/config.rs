//! Lookup pipeline configuration, read from the environment (`.env` aware).

use anyhow::{anyhow, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::util::env::{env_flag, env_opt, env_parse, env_parse_opt, env_req};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Oxylabs,
    Rainforest,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Oxylabs => crate::providers::oxylabs::PROVIDER_NAME,
            ProviderKind::Rainforest => crate::providers::rainforest::PROVIDER_NAME,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oxylabs" => Ok(ProviderKind::Oxylabs),
            "rainforest" => Ok(ProviderKind::Rainforest),
            other => Err(anyhow!("unknown LOOKUP_PROVIDER {other:?}")),
        }
    }
}

/// Search-then-detail provider (basic auth).
#[derive(Clone)]
pub struct OxylabsSettings {
    pub username: String,
    pub password: String,
    pub base_url: String,
    pub timeout: Duration,
    pub domain: String,
}

/// Single-call provider (API key in the query string).
#[derive(Clone)]
pub struct RainforestSettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub amazon_domain: String,
}

// Credentials must never reach logs, so Debug is written by hand.
impl fmt::Debug for OxylabsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OxylabsSettings")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for RainforestSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RainforestSettings")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("amazon_domain", &self.amazon_domain)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct PricingSettings {
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct CacheSettings {
    /// sqlite DSN; `None` keeps entries in process memory.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// `None` means entries never expire.
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub default_provider: ProviderKind,
    pub oxylabs: Option<OxylabsSettings>,
    pub rainforest: Option<RainforestSettings>,
    pub pricing: PricingSettings,
    pub cache: CacheSettings,
    pub dedupe_inflight: bool,
}

impl LookupConfig {
    pub fn from_env() -> Result<Self> {
        let default_provider = env_opt("LOOKUP_PROVIDER")
            .map(|v| v.parse::<ProviderKind>())
            .transpose()?
            .unwrap_or(ProviderKind::Oxylabs);

        let domain = env_opt("AMAZON_DOMAIN").unwrap_or_else(|| "com".to_string());

        let oxylabs = match (env_opt("OXYLABS_USERNAME"), env_opt("OXYLABS_PASSWORD")) {
            (Some(username), Some(password)) => Some(OxylabsSettings {
                username,
                password,
                base_url: env_opt("OXYLABS_BASE_URL")
                    .unwrap_or_else(|| "https://realtime.oxylabs.io".to_string()),
                timeout: Duration::from_secs(env_parse("OXYLABS_TIMEOUT_SECS", 8u64)),
                domain: domain.clone(),
            }),
            _ => None,
        };

        let rainforest = env_opt("RAINFOREST_API_KEY").map(|api_key| RainforestSettings {
            api_key,
            base_url: env_opt("RAINFOREST_BASE_URL")
                .unwrap_or_else(|| "https://api.rainforestapi.com".to_string()),
            timeout: Duration::from_secs(env_parse("RAINFOREST_TIMEOUT_SECS", 5u64)),
            amazon_domain: format!("amazon.{domain}"),
        });

        let pricing = PricingSettings {
            url: env_req("PRICING_ENGINE_URL")?,
            timeout: Duration::from_secs(env_parse("PRICING_ENGINE_TIMEOUT_SECS", 5u64)),
        };

        let cache = CacheSettings {
            database_url: env_opt("CACHE_DATABASE_URL"),
            max_connections: env_parse("CACHE_MAX_CONNS", 5u32),
            ttl: env_parse_opt::<u64>("CACHE_TTL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        };

        Ok(Self {
            default_provider,
            oxylabs,
            rainforest,
            pricing,
            cache,
            dedupe_inflight: env_flag("LOOKUP_DEDUPE_INFLIGHT", true),
        })
    }

    /// Whether the named provider has credentials.
    pub fn is_configured(&self, provider: ProviderKind) -> bool {
        match provider {
            ProviderKind::Oxylabs => self.oxylabs.is_some(),
            ProviderKind::Rainforest => self.rainforest.is_some(),
        }
    }
}
