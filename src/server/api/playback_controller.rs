// the playback resolution routes: channel vod listings, live streams and vod playlists.
// Each one asks gql for what it needs, never trusts the answer, and falls through to 404
use axum::{
    Extension, Json, Router,
    extract::Query,
    http::HeaderMap,
    routing::get,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::server::{
    dtos::playback_dto::{ChannelVideosResponse, LivePlaybackResponse, VodPlaybackResponse},
    error::{AppResult, Error},
    services::edge_services::EdgeServices,
    services::playlist_services::{self, LinkSet},
    utils::origin_utils::resolve_public_origin,
};

#[derive(Deserialize)]
struct ChannelVideosQuery {
    name: Option<String>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct LiveQuery {
    name: Option<String>,
}

#[derive(Deserialize)]
struct VodQuery {
    id: Option<String>,
}

pub struct PlaybackController;

impl PlaybackController {
    pub fn app() -> Router {
        Router::new()
            .route("/get-channel-videos", get(Self::get_channel_videos))
            .route("/get-live", get(Self::get_live))
            .route("/get-m3u8", get(Self::get_m3u8))
    }

    async fn get_channel_videos(
        Extension(services): Extension<EdgeServices>,
        Query(params): Query<ChannelVideosQuery>,
    ) -> AppResult<Json<ChannelVideosResponse>> {
        let name = params
            .name
            .ok_or_else(|| Error::BadRequest("Missing channel name".to_string()))?;
        let login = name.trim().to_lowercase();

        info!("listing vods for channel: {}", login);

        let channel = services
            .twitch
            .channel_videos(&login, params.cursor)
            .await
            .ok_or_else(|| Error::NotFound("Channel not found or has no VODs".to_string()))?;

        if channel.videos.is_empty() {
            return Err(Error::NotFound("Channel not found or has no VODs".to_string()));
        }

        Ok(Json(ChannelVideosResponse {
            videos: channel.videos,
            pagination: channel.page_info,
            avatar: channel.avatar,
        }))
    }

    async fn get_live(
        Extension(services): Extension<EdgeServices>,
        Query(params): Query<LiveQuery>,
        headers: HeaderMap,
    ) -> AppResult<Json<LivePlaybackResponse>> {
        let name = params
            .name
            .ok_or_else(|| Error::BadRequest("Missing channel name".to_string()))?;
        let login = name.trim().to_lowercase();
        let origin = resolve_public_origin(services.config.public_base_url.as_deref(), &headers);

        info!("resolving live stream for: {}", login);

        let token = services
            .twitch
            .playback_token(&login, true)
            .await
            .ok_or_else(|| Error::NotFound("Channel is offline".to_string()))?;

        let master_url = format!(
            "https://usher.ttvnw.net/api/channel/hls/{}.m3u8?allow_source=true&allow_audio_only=true&allow_spectre=true&player=twitchweb&playlist_include_framerate=true&segment_preference=4&sig={}&token={}",
            login,
            token.signature,
            urlencoding::encode(&token.value)
        );

        let fetched = services
            .relay
            .fetch_playlist(&master_url)
            .await
            .ok_or_else(|| Error::NotFound("Stream playlist unavailable".to_string()))?;

        let links =
            playlist_services::parse_and_rewrite(&fetched.text, &fetched.final_url, &origin, false)?;
        let best = links.best().unwrap_or_default().to_string();

        // metadata is cosmetic, a failed lookup must not take the stream down with it
        let meta = services.twitch.stream_metadata(&login).await;

        let thumbnail = format!(
            "https://static-cdn.jtvnw.net/previews-ttv/live_user_{}-640x360.jpg",
            login
        );

        Ok(Json(LivePlaybackResponse {
            links,
            best,
            title: meta
                .as_ref()
                .and_then(|m| m.title.clone())
                .unwrap_or_else(|| "Live".to_string()),
            game: meta
                .as_ref()
                .and_then(|m| m.game.clone())
                .unwrap_or_default(),
            thumbnail,
            avatar: meta.and_then(|m| m.avatar).unwrap_or_default(),
        }))
    }

    async fn get_m3u8(
        Extension(services): Extension<EdgeServices>,
        Query(params): Query<VodQuery>,
        headers: HeaderMap,
    ) -> AppResult<Json<VodPlaybackResponse>> {
        let vod_id = params
            .id
            .ok_or_else(|| Error::BadRequest("Missing VOD id".to_string()))?;
        let origin = resolve_public_origin(services.config.public_base_url.as_deref(), &headers);

        info!("resolving vod: {}", vod_id);

        // plan A: signed token straight to the canonical master playlist
        if let Some(response) = Self::resolve_via_token(&services, &vod_id, &origin).await {
            return Ok(Json(response));
        }

        // plan B: reconstruct tier playlists from the storyboard storage path
        warn!("token path failed for vod {}, trying storyboard fallback", vod_id);
        if let Some(response) = Self::resolve_via_storyboard(&services, &vod_id, &origin).await {
            return Ok(Json(response));
        }

        Err(Error::NotFound("VOD not found or protected".to_string()))
    }

    async fn resolve_via_token(
        services: &EdgeServices,
        vod_id: &str,
        origin: &str,
    ) -> Option<VodPlaybackResponse> {
        let token = services.twitch.playback_token(vod_id, false).await?;

        let master_url = format!(
            "https://usher.ttvnw.net/vod/{}.m3u8?nauth={}&nauthsig={}&allow_source=true&player_backend=mediaplayer",
            vod_id,
            urlencoding::encode(&token.value),
            token.signature
        );

        let fetched = services.relay.fetch_playlist(&master_url).await?;
        let links =
            playlist_services::parse_and_rewrite(&fetched.text, &fetched.final_url, origin, true)
                .ok()?;
        let best = links.best().unwrap_or_default().to_string();

        Some(VodPlaybackResponse {
            links,
            best,
            info: None,
        })
    }

    async fn resolve_via_storyboard(
        services: &EdgeServices,
        vod_id: &str,
        origin: &str,
    ) -> Option<VodPlaybackResponse> {
        let storyboard = services.twitch.video_storyboard(vod_id).await?;
        let seek_url = storyboard.seek_previews_url?;

        let raw = services.storyboard.probe(&seek_url).await?;

        let sorted = playlist_services::sort_links(
            raw.into_iter()
                .map(|(label, url)| (playlist_services::canonical_label(&label), url))
                .collect(),
        );

        let mut links = LinkSet::new();
        // Auto mirrors the best tier that actually responded
        if let Some((_, best_target)) = sorted.first() {
            links.push("Auto", playlist_services::proxy_url(origin, best_target, true));
        }
        for (label, target) in &sorted {
            links.push(label.clone(), playlist_services::proxy_url(origin, target, true));
        }

        let best = links.best().unwrap_or_default().to_string();
        let info = match storyboard.owner_login {
            Some(owner) => format!("VOD from {} (storyboard backup)", owner),
            None => "storyboard backup".to_string(),
        };

        Some(VodPlaybackResponse {
            links,
            best,
            info: Some(info),
        })
    }
}
