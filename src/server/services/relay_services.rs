// the passthrough between players and twitch's cdn. Playlists get rewritten, everything else is
// streamed byte-for-byte with the upstream status preserved so range-based seeking and airplay
// style remote playback keep working
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::Response;
use mockall::automock;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::server::error::{AppResult, Error};
use crate::server::services::playlist_services;
use crate::server::services::twitch_gql_services::{
    BROWSER_USER_AGENT, TWITCH_ORIGIN, TWITCH_REFERER,
};

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// a successfully fetched playlist body. The final url matters because redirects move playlists
/// across cdn hosts, and the status rides along so the relay can hand it back unchanged
#[derive(Debug, Clone)]
pub struct FetchedPlaylist {
    pub status: u16,
    pub final_url: String,
    pub text: String,
}

pub type DynRelayService = Arc<dyn RelayServiceTrait + Send + Sync>;

#[automock]
#[async_trait]
pub trait RelayServiceTrait {
    /// fetch a playlist as text with the impersonation headers, following redirects.
    /// Non-success responses come back as None
    async fn fetch_playlist(&self, url: &str) -> Option<FetchedPlaylist>;

    /// forward a request upstream. Playlist targets come back rewritten, anything else is
    /// streamed through with status and range headers intact
    async fn relay(
        &self,
        target_url: &str,
        range: Option<String>,
        proxy_base: &str,
        is_vod: bool,
    ) -> AppResult<Response>;
}

#[derive(Clone)]
pub struct RelayService {
    http: reqwest::Client,
}

impl RelayService {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn upstream_get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::REFERER, TWITCH_REFERER)
            .header(reqwest::header::ORIGIN, TWITCH_ORIGIN)
    }

    /// assemble the rewritten playlist response. The upstream status passes through untouched
    pub fn build_playlist_response(status: u16, body: String) -> AppResult<Response> {
        Response::builder()
            .status(StatusCode::from_u16(status).unwrap_or(StatusCode::OK))
            .header(header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .header(header::ACCESS_CONTROL_EXPOSE_HEADERS, "*")
            .body(Body::from(body))
            .map_err(|e| {
                error!("failed to build playlist response: {}", e);
                Error::InternalServerError
            })
    }

    async fn relay_playlist(
        &self,
        target_url: &str,
        proxy_base: &str,
        is_vod: bool,
    ) -> AppResult<Response> {
        let fetched = self.fetch_playlist(target_url).await.ok_or_else(|| {
            Error::NotFound("upstream playlist unavailable".to_string())
        })?;

        let rewritten = playlist_services::rewrite_manifest_body(
            &fetched.text,
            &fetched.final_url,
            proxy_base,
            is_vod,
        )?;

        debug!(
            "rewrote playlist {} ({} -> {} bytes)",
            target_url,
            fetched.text.len(),
            rewritten.len()
        );

        Self::build_playlist_response(fetched.status, rewritten)
    }

    async fn relay_segment(&self, target_url: &str, range: Option<String>) -> AppResult<Response> {
        let mut request = self.upstream_get(target_url);
        if let Some(range_value) = &range {
            request = request.header(reqwest::header::RANGE, range_value);
        }

        let upstream = request.send().await.map_err(|e| {
            warn!("segment relay failed for {}: {}", target_url, e);
            Error::NotFound("upstream segment unavailable".to_string())
        })?;

        // hand the upstream status straight back, 206 responses are what make seeking work
        let status = StatusCode::from_u16(upstream.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);

        let mut builder = Response::builder()
            .status(status)
            .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .header(header::ACCESS_CONTROL_EXPOSE_HEADERS, "*")
            .header(header::ACCEPT_RANGES, "bytes");

        // length and range headers have to survive for the player to scrub
        for name in [
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::CONTENT_RANGE,
        ] {
            if let Some(value) = upstream.headers().get(name.as_str()) {
                if let Ok(value) = value.to_str() {
                    builder = builder.header(name, value);
                }
            }
        }

        // body is streamed, never buffered; a mid-stream upstream drop just ends the stream
        builder
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|e| {
                error!("failed to build segment response: {}", e);
                Error::InternalServerError
            })
    }
}

#[async_trait]
impl RelayServiceTrait for RelayService {
    async fn fetch_playlist(&self, url: &str) -> Option<FetchedPlaylist> {
        let response = match self.upstream_get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("playlist fetch failed for {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                "playlist fetch for {} returned {}",
                url,
                response.status()
            );
            return None;
        }

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        match response.text().await {
            Ok(text) => Some(FetchedPlaylist {
                status,
                final_url,
                text,
            }),
            Err(e) => {
                warn!("failed to read playlist body from {}: {}", url, e);
                None
            }
        }
    }

    async fn relay(
        &self,
        target_url: &str,
        range: Option<String>,
        proxy_base: &str,
        is_vod: bool,
    ) -> AppResult<Response> {
        if target_url.contains(".m3u8") {
            self.relay_playlist(target_url, proxy_base, is_vod).await
        } else {
            self.relay_segment(target_url, range).await
        }
    }
}
