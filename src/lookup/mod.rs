//! Lookup pipeline: provider orchestration, attribute extraction, result
//! caching and the pricing handoff.

pub mod error;
pub mod extract;
pub mod inflight;
pub mod orchestrator;
pub mod pipeline;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use error::LookupError;
pub use extract::{OfferCondition, PriceAnalysis};
pub use inflight::InFlightLocks;
pub use orchestrator::{LookupOrchestrator, ResolveFailure, Resolved};
pub use pipeline::{QuoteData, QuotePipeline};
pub use telemetry::{DebugInfo, LookupTelemetry};
