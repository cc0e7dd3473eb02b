use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::extract::OfferCondition;
use crate::normalization::NormalizedCode;

/// `debug` block of a quote response; stored alongside the cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub normalized: NormalizedCode,
    pub price_source: String,
    pub price_condition: OfferCondition,
    pub telemetry: LookupTelemetry,
}

/// Provider call trace attached to every response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupTelemetry {
    pub provider: String,
    pub provider_call_sequence: Vec<String>,
    pub per_call_durations_ms: Vec<u64>,
    pub total_duration_ms: u64,
    #[serde(default)]
    pub cache_hit: bool,
}

impl LookupTelemetry {
    pub fn external_calls(&self) -> usize {
        self.provider_call_sequence.len()
    }

    /// Same trace, flagged as served from cache.
    pub fn as_cache_hit(&self) -> Self {
        Self {
            cache_hit: true,
            ..self.clone()
        }
    }
}

/// Accumulates calls while a lookup runs.
#[derive(Debug)]
pub struct TelemetryRecorder {
    started: Instant,
    telemetry: LookupTelemetry,
}

impl TelemetryRecorder {
    pub fn start(provider: &str) -> Self {
        Self {
            started: Instant::now(),
            telemetry: LookupTelemetry {
                provider: provider.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn record(&mut self, call: &str, elapsed: Duration) {
        self.telemetry.provider_call_sequence.push(call.to_string());
        self.telemetry
            .per_call_durations_ms
            .push(elapsed.as_millis() as u64);
    }

    pub fn finish(mut self) -> LookupTelemetry {
        self.telemetry.total_duration_ms = self.started.elapsed().as_millis() as u64;
        self.telemetry
    }
}
