// API request/response models (DTOs)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(Meta::now()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Some(Meta::now()),
        }
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// `POST /api/v1/lookup[/{provider}]` body.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LookupRequest {
    #[serde(default)]
    pub isbn_upc: Option<String>,
}

impl LookupRequest {
    /// The submitted code, if it has any non-whitespace content.
    pub fn code(&self) -> Option<&str> {
        self.isbn_upc
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// `GET /api/v1/lookup[/{provider}]`: presence flag only, never credentials.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfiguredResponse {
    pub provider: String,
    pub configured: bool,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub cache_backend: String,
    pub cache: String,
    pub providers: Vec<String>,
    pub default_provider: String,
    pub uptime_seconds: u64,
}
