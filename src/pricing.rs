//! Pricing decision engine interface.
//!
//! What price to offer is decided elsewhere; this module only hands the
//! engine a [`ProductRecord`] and reads back its decision.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::PricingSettings;
use crate::product::ProductRecord;
use crate::util::env::redact_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Books,
    Music,
    Movies,
    Games,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingDecision {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub our_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub category: ItemCategory,
}

impl PricingDecision {
    /// Text shown to the person scanning the item.
    pub fn human_message(&self) -> String {
        match (self.accepted, self.our_price) {
            (true, Some(price)) => format!("We'll pay ${price:.2} for this item."),
            _ => self
                .reason
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "Sorry, we can't accept this item right now.".to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("pricing engine unreachable: {0}")]
    Unavailable(String),
    #[error("pricing engine returned status {0}")]
    Status(u16),
    #[error("pricing engine response could not be decoded: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait PricingEngine: Send + Sync {
    async fn decide(&self, product: &ProductRecord) -> Result<PricingDecision, PricingError>;
}

/// Pricing engine reached over HTTP: `POST <url>` with the product as JSON.
#[derive(Debug, Clone)]
pub struct HttpPricingEngine {
    url: Url,
    http: Client,
}

impl HttpPricingEngine {
    /// Fails at construction if the URL is unusable, not on the first quote.
    pub fn new(settings: &PricingSettings) -> anyhow::Result<Self> {
        let url = Url::parse(&settings.url).map_err(|e| {
            anyhow::anyhow!(
                "invalid PRICING_ENGINE_URL {}: {e}",
                redact_url(&settings.url)
            )
        })?;
        let http = Client::builder()
            .user_agent("ScanQuote/1.0")
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { url, http })
    }
}

#[async_trait]
impl PricingEngine for HttpPricingEngine {
    async fn decide(&self, product: &ProductRecord) -> Result<PricingDecision, PricingError> {
        let resp = self
            .http
            .post(self.url.clone())
            .json(product)
            .send()
            .await
            .map_err(|e| PricingError::Unavailable(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, identifier = %product.identifier, "pricing engine rejected request");
            return Err(PricingError::Status(status.as_u16()));
        }

        resp.json()
            .await
            .map_err(|e| PricingError::Malformed(e.without_url().to_string()))
    }
}
