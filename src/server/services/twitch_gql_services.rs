// twitch's private gql api. Every call here is a single query with the web player's embedded
// client id and browser headers, and every failure collapses to None so the handlers can fall
// through to their next strategy
use async_trait::async_trait;
use mockall::automock;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// the web player's public application identifier, required on every gql call
pub const TWITCH_CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";

pub const GQL_ENDPOINT: &str = "https://gql.twitch.tv/gql";

/// twitch rejects requests that don't look like they came out of a browser
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const TWITCH_REFERER: &str = "https://www.twitch.tv/";
pub const TWITCH_ORIGIN: &str = "https://www.twitch.tv";

/// seconds before an upstream call is written off as unavailable
pub const UPSTREAM_TIMEOUT_SECS: u64 = 5;

/// short-lived signed playback credential, re-fetched on every request
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackToken {
    pub value: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    pub title: Option<String>,
    pub published_at: Option<String>,
    pub length_seconds: Option<i64>,
    pub view_count: Option<i64>,
    #[serde(rename = "previewThumbnailURL")]
    pub preview_thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChannelVideos {
    pub videos: Vec<VideoItem>,
    pub page_info: PageInfo,
    pub avatar: Option<String>,
}

/// owner + storyboard url for a vod, the inputs the fallback prober needs
#[derive(Debug, Clone)]
pub struct VideoStoryboard {
    pub owner_login: Option<String>,
    pub seek_previews_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StreamMetadata {
    pub title: Option<String>,
    pub game: Option<String>,
    pub avatar: Option<String>,
}

pub type DynTwitchGqlService = Arc<dyn TwitchGqlServiceTrait + Send + Sync>;

#[automock]
#[async_trait]
pub trait TwitchGqlServiceTrait {
    /// signed playback token for a channel (live) or a vod id
    async fn playback_token(&self, id: &str, is_live: bool) -> Option<PlaybackToken>;

    /// latest archive vods for a channel, newest first, with pagination
    async fn channel_videos(&self, login: &str, cursor: Option<String>) -> Option<ChannelVideos>;

    /// owner login and seek-preview url for a vod
    async fn video_storyboard(&self, video_id: &str) -> Option<VideoStoryboard>;

    /// broadcast title / game / avatar for a live channel
    async fn stream_metadata(&self, login: &str) -> Option<StreamMetadata>;
}

// ---- response shapes, all fields optional so a missing piece is "not found" and not a crash ----

#[derive(Deserialize)]
struct GqlEnvelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct TokenData {
    #[serde(rename = "streamPlaybackAccessToken")]
    stream_token: Option<PlaybackToken>,
    #[serde(rename = "videoPlaybackAccessToken")]
    video_token: Option<PlaybackToken>,
}

#[derive(Deserialize)]
struct VideosData {
    user: Option<VideosUser>,
}

#[derive(Deserialize)]
struct VideosUser {
    #[serde(rename = "profileImageURL")]
    profile_image_url: Option<String>,
    videos: Option<VideoConnection>,
}

#[derive(Deserialize)]
struct VideoConnection {
    edges: Vec<VideoEdge>,
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
}

#[derive(Deserialize)]
struct VideoEdge {
    node: VideoItem,
}

#[derive(Deserialize)]
struct StoryboardData {
    video: Option<StoryboardVideo>,
}

#[derive(Deserialize)]
struct StoryboardVideo {
    #[serde(rename = "seekPreviewsURL")]
    seek_previews_url: Option<String>,
    owner: Option<StoryboardOwner>,
}

#[derive(Deserialize)]
struct StoryboardOwner {
    login: Option<String>,
}

#[derive(Deserialize)]
struct MetadataData {
    user: Option<MetadataUser>,
}

#[derive(Deserialize)]
struct MetadataUser {
    #[serde(rename = "profileImageURL")]
    profile_image_url: Option<String>,
    #[serde(rename = "broadcastSettings")]
    broadcast_settings: Option<BroadcastSettings>,
}

#[derive(Deserialize)]
struct BroadcastSettings {
    title: Option<String>,
    game: Option<BroadcastGame>,
}

#[derive(Deserialize)]
struct BroadcastGame {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

/// json-encode a value destined for inline interpolation into a query string, minus the quotes
fn gql_escape(value: &str) -> String {
    serde_json::to_string(value)
        .map(|s| s[1..s.len() - 1].to_string())
        .unwrap_or_default()
}

/// fresh pseudo device id per call, same shape the web player sends
fn device_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("MkMq8a9{}", suffix)
}

#[derive(Clone)]
pub struct TwitchGqlService {
    http: reqwest::Client,
}

impl TwitchGqlService {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// one gql round trip. Network errors, non-2xx statuses and undecodable bodies all come back
    /// as None, no retries
    async fn gql<T: serde::de::DeserializeOwned>(&self, query: String) -> Option<T> {
        let response = self
            .http
            .post(GQL_ENDPOINT)
            .header("Client-ID", TWITCH_CLIENT_ID)
            .header("Device-ID", device_id())
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::REFERER, TWITCH_REFERER)
            .header(reqwest::header::ORIGIN, TWITCH_ORIGIN)
            .json(&json!({ "query": query }))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!("gql request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("gql returned status {}", response.status());
            return None;
        }

        match response.json::<GqlEnvelope<T>>().await {
            Ok(envelope) => envelope.data,
            Err(e) => {
                warn!("failed to decode gql response: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl TwitchGqlServiceTrait for TwitchGqlService {
    async fn playback_token(&self, id: &str, is_live: bool) -> Option<PlaybackToken> {
        let id = gql_escape(id);
        let query = if is_live {
            format!(
                "query {{ streamPlaybackAccessToken(channelName: \"{}\", params: {{platform: \"web\", playerBackend: \"mediaplayer\", playerType: \"site\"}}) {{ value signature }} }}",
                id
            )
        } else {
            format!(
                "query {{ videoPlaybackAccessToken(id: \"{}\", params: {{platform: \"web\", playerBackend: \"mediaplayer\", playerType: \"site\"}}) {{ value signature }} }}",
                id
            )
        };

        let data: TokenData = self.gql(query).await?;
        let token = if is_live {
            data.stream_token
        } else {
            data.video_token
        };

        if token.is_none() {
            debug!("no playback token issued (live: {})", is_live);
        }
        token
    }

    async fn channel_videos(&self, login: &str, cursor: Option<String>) -> Option<ChannelVideos> {
        let after = cursor
            .as_deref()
            .map(|c| format!(", after: \"{}\"", gql_escape(c)))
            .unwrap_or_default();

        let query = format!(
            "query {{ user(login: \"{}\") {{ profileImageURL(width: 70) videos(first: 20, type: ARCHIVE, sort: TIME{}) {{ edges {{ node {{ id title publishedAt lengthSeconds viewCount previewThumbnailURL(height: 180, width: 320) }} }} pageInfo {{ hasNextPage endCursor }} }} }} }}",
            gql_escape(login),
            after
        );

        let data: VideosData = self.gql(query).await?;
        let user = data.user?;
        let videos = user.videos?;

        Some(ChannelVideos {
            videos: videos.edges.into_iter().map(|e| e.node).collect(),
            page_info: videos.page_info,
            avatar: user.profile_image_url,
        })
    }

    async fn video_storyboard(&self, video_id: &str) -> Option<VideoStoryboard> {
        let query = format!(
            "query {{ video(id: \"{}\") {{ seekPreviewsURL owner {{ login }} }} }}",
            gql_escape(video_id)
        );

        let data: StoryboardData = self.gql(query).await?;
        let video = data.video?;

        Some(VideoStoryboard {
            owner_login: video.owner.and_then(|o| o.login),
            seek_previews_url: video.seek_previews_url,
        })
    }

    async fn stream_metadata(&self, login: &str) -> Option<StreamMetadata> {
        let query = format!(
            "query {{ user(login: \"{}\") {{ profileImageURL(width: 70) broadcastSettings {{ title game {{ displayName }} }} }} }}",
            gql_escape(login)
        );

        let data: MetadataData = self.gql(query).await?;
        let user = data.user?;
        let settings = user.broadcast_settings;

        Some(StreamMetadata {
            title: settings.as_ref().and_then(|s| s.title.clone()),
            game: settings.and_then(|s| s.game).and_then(|g| g.display_name),
            avatar: user.profile_image_url,
        })
    }
}
