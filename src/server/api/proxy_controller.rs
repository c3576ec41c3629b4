use axum::{
    Extension, Router,
    extract::Query,
    http::{HeaderMap, header},
    response::Response,
    routing::get,
};
use serde::Deserialize;
use tracing::debug;

use crate::server::{
    error::{AppResult, Error},
    services::edge_services::EdgeServices,
    utils::origin_utils::resolve_public_origin,
};

#[derive(Deserialize)]
struct ProxyQuery {
    url: Option<String>,
    #[serde(rename = "isVod")]
    is_vod: Option<String>,
}

pub struct ProxyController;

impl ProxyController {
    pub fn app() -> Router {
        Router::new().route("/proxy", get(Self::proxy_get))
    }

    async fn proxy_get(
        Extension(services): Extension<EdgeServices>,
        Query(params): Query<ProxyQuery>,
        headers: HeaderMap,
    ) -> AppResult<Response> {
        let target_url = params
            .url
            .ok_or_else(|| Error::BadRequest("Missing url parameter".to_string()))?;

        if !target_url.starts_with("http://") && !target_url.starts_with("https://") {
            return Err(Error::BadRequest("Invalid URL format".to_string()));
        }

        let is_vod = params.is_vod.as_deref() == Some("true");
        let origin = resolve_public_origin(services.config.public_base_url.as_deref(), &headers);

        // the player's Range header rides along so upstream can answer with 206
        let range = headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        debug!("relaying (isVod={}, range={:?}): {}", is_vod, range, target_url);

        services.relay.relay(&target_url, range, &origin, is_vod).await
    }
}
