//! In-process fakes for the provider and pricing seams.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::pricing::{ItemCategory, PricingDecision, PricingEngine, PricingError};
use crate::product::ProductRecord;
use crate::providers::{LookupStrategy, ProviderAdapter, ProviderError, RawProductPayload};

/// Scripted provider that records every call it receives.
pub struct FakeProvider {
    strategy: LookupStrategy,
    search: Result<Option<String>, ProviderError>,
    product: Result<RawProductPayload, ProviderError>,
    delay: Option<Duration>,
    searched: Mutex<Vec<String>>,
    looked_up: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub const NAME: &'static str = "fake";

    pub fn new() -> Self {
        Self {
            strategy: LookupStrategy::SearchThenDetail,
            search: Ok(None),
            product: Err(ProviderError::NotFound),
            delay: None,
            searched: Mutex::new(Vec::new()),
            looked_up: Mutex::new(Vec::new()),
        }
    }

    pub fn direct_code(mut self) -> Self {
        self.strategy = LookupStrategy::DirectCode;
        self
    }

    pub fn with_search(mut self, result: Result<Option<String>, ProviderError>) -> Self {
        self.search = result;
        self
    }

    pub fn with_product(mut self, payload: RawProductPayload) -> Self {
        self.product = Ok(payload);
        self
    }

    pub fn with_product_error(mut self, err: ProviderError) -> Self {
        self.product = Err(err);
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn searched_codes(&self) -> Vec<String> {
        self.searched.lock().unwrap().clone()
    }

    pub fn product_identifiers(&self) -> Vec<String> {
        self.looked_up.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> usize {
        self.searched.lock().unwrap().len()
    }

    pub fn total_calls(&self) -> usize {
        self.search_calls() + self.looked_up.lock().unwrap().len()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ProviderAdapter for FakeProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn strategy(&self) -> LookupStrategy {
        self.strategy
    }

    async fn search_for_identifier(&self, code: &str) -> Result<Option<String>, ProviderError> {
        self.searched.lock().unwrap().push(code.to_string());
        self.pause().await;
        self.search.clone()
    }

    async fn lookup_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<RawProductPayload, ProviderError> {
        self.looked_up.lock().unwrap().push(identifier.to_string());
        self.pause().await;
        self.product.clone()
    }
}

/// Accepts anything with a usable price at half of it, or always fails.
pub struct FakePricing {
    fail: bool,
    calls: AtomicUsize,
}

impl FakePricing {
    pub fn accepting() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PricingEngine for FakePricing {
    async fn decide(&self, product: &ProductRecord) -> Result<PricingDecision, PricingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PricingError::Status(503));
        }
        let category = if product.category == "Books" {
            ItemCategory::Books
        } else {
            ItemCategory::Other
        };
        Ok(if product.has_usable_price() {
            PricingDecision {
                accepted: true,
                our_price: Some((product.price / 2.0 * 100.0).round() / 100.0),
                reason: None,
                category,
            }
        } else {
            PricingDecision {
                accepted: false,
                our_price: None,
                reason: Some("No market price available.".into()),
                category,
            }
        })
    }
}
