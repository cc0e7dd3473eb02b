use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

use super::error::LookupError;
use super::extract::{extract, PriceAnalysis};
use super::telemetry::{LookupTelemetry, TelemetryRecorder};
use crate::normalization::{CodeType, NormalizedCode};
use crate::product::ProductRecord;
use crate::providers::{LookupStrategy, ProviderAdapter};

pub const CALL_SEARCH: &str = "search";
pub const CALL_PRODUCT: &str = "product";

const UNKNOWN_TITLE: &str = "Unknown Title";

#[derive(Debug, Clone)]
pub struct Resolved {
    pub product: ProductRecord,
    pub price: PriceAnalysis,
    pub telemetry: LookupTelemetry,
}

/// A failed resolution still carries the calls it made.
#[derive(Debug)]
pub struct ResolveFailure {
    pub error: LookupError,
    pub telemetry: LookupTelemetry,
}

/// Drives one provider from a normalized code to a product record.
///
/// Calls are strictly sequential (the detail call needs the search result),
/// each adapter error aborts the resolution, and nothing is retried.
#[derive(Clone)]
pub struct LookupOrchestrator {
    provider: Arc<dyn ProviderAdapter>,
}

impl LookupOrchestrator {
    pub fn new(provider: Arc<dyn ProviderAdapter>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn resolve(&self, code: &NormalizedCode) -> Result<Resolved, ResolveFailure> {
        let mut recorder = TelemetryRecorder::start(self.provider.name());
        let outcome = self.run(code, &mut recorder).await;
        let telemetry = recorder.finish();
        match outcome {
            Ok((product, price)) => Ok(Resolved {
                product,
                price,
                telemetry,
            }),
            Err(error) => Err(ResolveFailure { error, telemetry }),
        }
    }

    async fn run(
        &self,
        code: &NormalizedCode,
        recorder: &mut TelemetryRecorder,
    ) -> Result<(ProductRecord, PriceAnalysis), LookupError> {
        let name = self.provider.name();
        let identifier = match code.code_type() {
            CodeType::Unknown => return Err(LookupError::InvalidInput(code.raw().to_string())),
            CodeType::Asin => code.search_code().to_string(),
            // ISBN-10 is accepted by the detail endpoint as an ASIN.
            CodeType::Isbn if !code.requires_search() => code.search_code().to_string(),
            _ if self.provider.strategy() == LookupStrategy::DirectCode => {
                code.search_code().to_string()
            }
            _ => {
                let started = Instant::now();
                let found = self.provider.search_for_identifier(code.search_code()).await;
                recorder.record(CALL_SEARCH, started.elapsed());
                match found.map_err(|e| LookupError::provider(name, e))? {
                    Some(asin) => {
                        debug!(provider = name, code = code.search_code(), asin = %asin, "search resolved identifier");
                        asin
                    }
                    None => return Err(LookupError::NotFound),
                }
            }
        };

        let started = Instant::now();
        let payload = self.provider.lookup_by_identifier(&identifier).await;
        recorder.record(CALL_PRODUCT, started.elapsed());
        let payload = payload.map_err(|e| LookupError::provider(name, e))?;

        let extracted = extract(&payload);
        debug!(
            provider = name,
            identifier = %identifier,
            price = extracted.price.best_price,
            price_source = %extracted.price.source_description,
            sales_rank = extracted.sales_rank,
            category = %extracted.category,
            "extracted product attributes"
        );

        let product = ProductRecord {
            title: payload
                .title
                .clone()
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            image_url: payload.image_url.clone(),
            price: extracted.price.best_price,
            sales_rank: extracted.sales_rank,
            category: extracted.category,
            identifier: payload.identifier.clone().unwrap_or(identifier),
        };
        Ok((product, extracted.price))
    }
}
