// API server implementation using actix-web

use crate::api::{auth, middleware, routes};
use crate::lookup::QuotePipeline;
use crate::util::env::{env_opt, env_parse, init_env};
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::time::Instant;

/// Shared per-process state handed to every handler.
pub struct AppState {
    pub pipeline: QuotePipeline,
    pub started: Instant,
}

impl AppState {
    pub fn new(pipeline: QuotePipeline) -> Self {
        Self {
            pipeline,
            started: Instant::now(),
        }
    }
}

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub api_secret: Option<String>,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        init_env();

        let host = env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match env_opt("API_PORT") {
            Some(raw) => raw.parse().context("Invalid API_PORT")?,
            None => 8080,
        };
        let api_secret = env_opt("API_SECRET");
        if api_secret.is_none() {
            tracing::warn!("API_SECRET not set; lookup routes accept unauthenticated requests");
        }
        let allowed_origins = env_parse(
            "ALLOWED_ORIGINS",
            "http://localhost:3000,http://localhost:8000".to_string(),
        );

        Ok(Self {
            host,
            port,
            api_secret,
            allowed_origins,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, pipeline: QuotePipeline) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            auth = self.api_secret.is_some(),
            "Starting scan-quote API server"
        );

        let state = web::Data::new(AppState::new(pipeline));
        let api_secret = self.api_secret.clone();
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);
            let auth = auth::Auth::new(api_secret.clone());

            App::new()
                .app_data(state.clone())
                .wrap(auth)
                .wrap(cors)
                .wrap(compress)
                .wrap(logger)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
