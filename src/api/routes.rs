// API route configuration

use crate::api::handlers;
use crate::api::models::ApiResponse;
use actix_web::{error, web, HttpResponse};

const MSG_BAD_BODY: &str = "Request body must be JSON like {\"isbn_upc\": \"...\"}.";

/// Malformed JSON bodies answer in the standard error envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(4096)
        .error_handler(|err, _req| {
            tracing::debug!(error = %err, "rejected lookup body");
            let resp = HttpResponse::BadRequest().json(ApiResponse::<()>::error(MSG_BAD_BODY));
            error::InternalError::from_response(err, resp).into()
        })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        .service(
            web::scope("/api/v1")
                .route("/lookup", web::post().to(handlers::lookup_default))
                .route("/lookup", web::get().to(handlers::lookup_info_default))
                .route(
                    "/lookup/{provider}",
                    web::post().to(handlers::lookup_with_provider),
                )
                .route(
                    "/lookup/{provider}",
                    web::get().to(handlers::lookup_info_with_provider),
                ),
        );
}
