use thiserror::Error;

use crate::pricing::PricingError;
use crate::providers::ProviderError;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("unrecognized product code {0:?}")]
    InvalidInput(String),

    #[error("no product found for code")]
    NotFound,

    #[error("{provider} call failed: {source}")]
    Provider {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("provider {0:?} is not configured")]
    ProviderNotConfigured(String),

    #[error("pricing decision failed: {0}")]
    Pricing(#[from] PricingError),
}

impl LookupError {
    pub fn provider(provider: &'static str, source: ProviderError) -> Self {
        match source {
            ProviderError::NotFound => LookupError::NotFound,
            ProviderError::NotConfigured => LookupError::ProviderNotConfigured(provider.into()),
            source => LookupError::Provider { provider, source },
        }
    }

    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::InvalidInput(_) => "invalid_input",
            LookupError::NotFound => "not_found",
            LookupError::Provider { source, .. } => source.kind(),
            LookupError::ProviderNotConfigured(_) => "not_configured",
            LookupError::Pricing(_) => "pricing",
        }
    }
}
