// HTTP request handlers for API endpoints

use actix_web::{web, HttpResponse, Result};

use crate::api::models::*;
use crate::api::server::AppState;
use crate::lookup::LookupError;
use crate::providers::{ProviderError, KNOWN_PROVIDERS};

const MSG_MISSING_CODE: &str = "isbn_upc is required.";
const MSG_INVALID_CODE: &str = "Invalid ISBN, UPC, or ASIN.";
const MSG_NOT_FOUND: &str = "Product not found.";
const MSG_UNKNOWN_PROVIDER: &str = "Unknown lookup provider.";
const MSG_NOT_CONFIGURED: &str = "Lookup service is not configured.";
const MSG_CONFIG_ERROR: &str = "Lookup service configuration error.";
const MSG_BUSY: &str = "Lookup service is busy. Please try again later.";
const MSG_TIMEOUT: &str = "Lookup timed out. Please try again.";
const MSG_UNAVAILABLE: &str = "Lookup service unavailable. Please try again later.";
const MSG_PRICING: &str = "Pricing service unavailable. Please try again later.";

/// Map a lookup failure to a status and a message that is safe to show.
pub fn error_response(err: &LookupError) -> HttpResponse {
    let (mut builder, message) = match err {
        LookupError::InvalidInput(_) => (HttpResponse::BadRequest(), MSG_INVALID_CODE),
        LookupError::NotFound => (HttpResponse::NotFound(), MSG_NOT_FOUND),
        LookupError::ProviderNotConfigured(_) => {
            (HttpResponse::InternalServerError(), MSG_NOT_CONFIGURED)
        }
        LookupError::Provider { source, .. } => match source {
            ProviderError::Auth => (HttpResponse::InternalServerError(), MSG_CONFIG_ERROR),
            ProviderError::RateLimited | ProviderError::QuotaExhausted => {
                (HttpResponse::TooManyRequests(), MSG_BUSY)
            }
            ProviderError::Timeout => (HttpResponse::RequestTimeout(), MSG_TIMEOUT),
            ProviderError::NotFound => (HttpResponse::NotFound(), MSG_NOT_FOUND),
            ProviderError::NotConfigured => {
                (HttpResponse::InternalServerError(), MSG_NOT_CONFIGURED)
            }
            ProviderError::Unavailable(_)
            | ProviderError::Transport(_)
            | ProviderError::Malformed(_) => {
                (HttpResponse::InternalServerError(), MSG_UNAVAILABLE)
            }
        },
        LookupError::Pricing(_) => (HttpResponse::InternalServerError(), MSG_PRICING),
    };
    builder.json(ApiResponse::<()>::error(message))
}

/// Lookup with the default provider
pub async fn lookup_default(
    state: web::Data<AppState>,
    payload: web::Json<LookupRequest>,
) -> Result<HttpResponse> {
    Ok(run_lookup(&state, None, &payload).await)
}

/// Lookup with a provider named in the path
pub async fn lookup_with_provider(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<LookupRequest>,
) -> Result<HttpResponse> {
    let provider = path.into_inner();
    if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
        return Ok(HttpResponse::NotFound().json(ApiResponse::<()>::error(MSG_UNKNOWN_PROVIDER)));
    }
    Ok(run_lookup(&state, Some(&provider), &payload).await)
}

async fn run_lookup(state: &AppState, provider: Option<&str>, payload: &LookupRequest) -> HttpResponse {
    let Some(code) = payload.code() else {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(MSG_MISSING_CODE));
    };

    match state.pipeline.quote(code, provider).await {
        Ok(quote) => HttpResponse::Ok().json(ApiResponse::success(quote)),
        Err(e) => {
            tracing::debug!(kind = e.kind(), "lookup request failed");
            error_response(&e)
        }
    }
}

/// Whether the default provider has credentials
pub async fn lookup_info_default(state: web::Data<AppState>) -> Result<HttpResponse> {
    let name = state.pipeline.registry().default_name();
    Ok(configured_response(&state, name))
}

/// Whether a named provider has credentials
pub async fn lookup_info_with_provider(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let provider = path.into_inner();
    if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
        return Ok(HttpResponse::NotFound().json(ApiResponse::<()>::error(MSG_UNKNOWN_PROVIDER)));
    }
    Ok(configured_response(&state, &provider))
}

fn configured_response(state: &AppState, provider: &str) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(ConfiguredResponse {
        provider: provider.to_string(),
        configured: state.pipeline.registry().get(provider).is_some(),
    }))
}

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    let store = state.pipeline.cache().store();
    let (status, cache) = match store.ping().await {
        Ok(()) => ("healthy", "reachable"),
        Err(e) => {
            tracing::warn!(backend = store.backend(), error = %e, "cache store unreachable");
            ("degraded", "unreachable")
        }
    };

    let registry = state.pipeline.registry();
    let response = ApiResponse::success(HealthResponse {
        status: status.to_string(),
        cache_backend: store.backend().to_string(),
        cache: cache.to_string(),
        providers: registry.names().into_iter().map(String::from).collect(),
        default_provider: registry.default_name().to_string(),
        uptime_seconds: state.started.elapsed().as_secs(),
    });

    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::configure_routes;
    use crate::cache::{MemoryCacheStore, ResultCache};
    use crate::lookup::testing::{FakePricing, FakeProvider};
    use crate::lookup::QuotePipeline;
    use crate::providers::{BuyBoxOffer, ProviderRegistry, RawProductPayload};
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn state(provider: FakeProvider) -> web::Data<AppState> {
        let registry = ProviderRegistry::new(FakeProvider::NAME).register(Arc::new(provider));
        let pipeline = QuotePipeline::new(
            registry,
            ResultCache::new(Arc::new(MemoryCacheStore::new()), None),
            Arc::new(FakePricing::accepting()),
        );
        web::Data::new(AppState::new(pipeline))
    }

    fn gatsby() -> RawProductPayload {
        RawProductPayload {
            title: Some("The Great Gatsby".into()),
            buybox: vec![BuyBoxOffer {
                price: Some(10.0),
                condition: Some("new".into()),
            }],
            sales_rank: vec![crate::providers::RankEntry {
                rank: Some(1234),
                ladder: vec!["Books".into()],
            }],
            ..Default::default()
        }
    }

    async fn post(data: web::Data<AppState>, uri: &str, body: Value) -> (StatusCode, Value) {
        let app = test::init_service(App::new().app_data(data).configure(configure_routes)).await;
        let req = test::TestRequest::post().uri(uri).set_json(body).to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        (status, test::read_body_json(resp).await)
    }

    #[actix_web::test]
    async fn lookup_returns_quote() {
        let (status, body) = post(
            state(FakeProvider::new().with_product(gatsby())),
            "/api/v1/lookup",
            json!({"isbn_upc": "978-0-7432-7356-5"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["product"]["price"], 10.0);
        assert_eq!(body["data"]["product"]["salesRank"], 1234);
        assert_eq!(body["data"]["pricing"]["accepted"], true);
        assert_eq!(body["data"]["message"], "We'll pay $5.00 for this item.");
        assert_eq!(body["data"]["debug"]["normalized"]["searchCode"], "0743273567");
        assert_eq!(
            body["data"]["debug"]["telemetry"]["providerCallSequence"],
            json!(["product"])
        );
    }

    #[actix_web::test]
    async fn empty_code_is_bad_request() {
        for body in [json!({"isbn_upc": ""}), json!({"isbn_upc": "   "}), json!({})] {
            let (status, resp) = post(state(FakeProvider::new()), "/api/v1/lookup", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp["success"], false);
            assert_eq!(resp["error"], MSG_MISSING_CODE);
        }
    }

    #[actix_web::test]
    async fn non_json_body_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(state(FakeProvider::new()))
                .configure(configure_routes),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/v1/lookup")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"isbn_upc\": 42")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn unclassifiable_code_is_bad_request() {
        let (status, body) = post(
            state(FakeProvider::new()),
            "/api/v1/lookup",
            json!({"isbn_upc": "abc"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], MSG_INVALID_CODE);
    }

    #[actix_web::test]
    async fn empty_search_is_not_found() {
        let (status, body) = post(
            state(FakeProvider::new().with_search(Ok(None))),
            "/api/v1/lookup",
            json!({"isbn_upc": "012345678905"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], MSG_NOT_FOUND);
    }

    #[actix_web::test]
    async fn unknown_provider_route_is_not_found() {
        let (status, body) = post(
            state(FakeProvider::new()),
            "/api/v1/lookup/acme",
            json!({"isbn_upc": "B00005N5PF"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], MSG_UNKNOWN_PROVIDER);
    }

    #[actix_web::test]
    async fn unconfigured_provider_is_masked() {
        let (status, body) = post(
            state(FakeProvider::new()),
            "/api/v1/lookup/rainforest",
            json!({"isbn_upc": "B00005N5PF"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], MSG_NOT_CONFIGURED);
    }

    #[actix_web::test]
    async fn provider_errors_map_to_statuses() {
        let cases = [
            (ProviderError::Auth, StatusCode::INTERNAL_SERVER_ERROR),
            (ProviderError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (ProviderError::QuotaExhausted, StatusCode::TOO_MANY_REQUESTS),
            (ProviderError::Timeout, StatusCode::REQUEST_TIMEOUT),
            (ProviderError::Unavailable(502), StatusCode::INTERNAL_SERVER_ERROR),
            (ProviderError::Malformed("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let resp = error_response(&LookupError::Provider {
                provider: "oxylabs",
                source: err,
            });
            assert_eq!(resp.status(), expected);
        }
    }

    #[actix_web::test]
    async fn error_body_does_not_leak_details() {
        let (status, body) = post(
            state(
                FakeProvider::new()
                    .with_product_error(ProviderError::Malformed("secret-token=abc".into())),
            ),
            "/api/v1/lookup",
            json!({"isbn_upc": "B00005N5PF"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("secret-token"));
        assert_eq!(body["error"], MSG_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn info_reports_configured_flag_only() {
        let app = test::init_service(
            App::new()
                .app_data(state(FakeProvider::new()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/lookup").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["configured"], true);
        assert_eq!(body["data"]["provider"], FakeProvider::NAME);

        let req = test::TestRequest::get()
            .uri("/api/v1/lookup/oxylabs")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"], json!({"provider": "oxylabs", "configured": false}));
    }

    #[actix_web::test]
    async fn health_reports_cache() {
        let app = test::init_service(
            App::new()
                .app_data(state(FakeProvider::new()))
                .configure(configure_routes),
        )
        .await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["cache_backend"], "memory");
        assert_eq!(body["data"]["providers"], json!([FakeProvider::NAME]));
    }
}
