pub mod api;
pub mod dtos;
pub mod error;
pub mod services;
pub mod utils;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{Extension, Router, http::HeaderValue, routing::get};
use once_cell::sync::Lazy;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::server::api::health_controller::health_endpoint;
use crate::server::api::playback_controller::PlaybackController;
use crate::server::api::proxy_controller::ProxyController;
use crate::server::services::edge_services::EdgeServices;

static STARTUP_TIME: Lazy<Instant> = Lazy::new(Instant::now);

pub fn get_app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn get_uptime_seconds() -> u64 {
    STARTUP_TIME.elapsed().as_secs()
}

pub struct EdgeApplicationServer;

impl EdgeApplicationServer {
    pub async fn serve(config: Arc<AppConfig>) -> anyhow::Result<()> {
        Lazy::force(&STARTUP_TIME);

        let port = config.port;
        let cors = build_cors(&config.cors_origin);
        let services = EdgeServices::new(config);

        let app = Router::new()
            .route("/health", get(health_endpoint))
            .nest(
                "/api",
                PlaybackController::app().merge(ProxyController::app()),
            )
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(Extension(services));

        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
            .await
            .context("failed to bind listener")?;

        info!("edge server listening on port {}", port);

        axum::serve(listener, app)
            .await
            .context("server stopped unexpectedly")?;

        Ok(())
    }
}

/// permissive for "*", otherwise the comma separated allow list from config. Range has to stay
/// allowed either way or seeking breaks
fn build_cors(cors_origin: &str) -> CorsLayer {
    if cors_origin.trim() == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = cors_origin
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any)
    }
}
