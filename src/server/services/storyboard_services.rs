// storyboard fallback: when the token path is rejected (subscriber-only or region locked vods),
// the seek-preview asset url leaks the vod's internal storage path, and the per-quality media
// playlists under that path are usually still reachable.
//
// WARNING: this whole module rides on an undocumented storage naming convention
// (https://{host}/{special_id}/{quality}/index-dvr.m3u8). It will silently return nothing the day
// twitch changes it, which is why it lives behind its own trait and nothing else knows about the
// url shape
use async_trait::async_trait;
use futures::future::join_all;
use mockall::automock;
use std::sync::Arc;
use tracing::{debug, info};

use crate::server::services::twitch_gql_services::{
    BROWSER_USER_AGENT, TWITCH_ORIGIN, TWITCH_REFERER,
};

/// raw storage tags probed on the cdn, best first. These are twitch's directory names, not
/// display labels
pub const PROBE_QUALITIES: [&str; 10] = [
    "chunked",
    "source",
    "1080p60",
    "1080p30",
    "720p60",
    "720p30",
    "480p30",
    "360p30",
    "160p30",
    "audio_only",
];

const STORYBOARD_PATH_MARKER: &str = "storyboards";

/// build the candidate playlist url for every probe tier, or None when the seek-preview url does
/// not contain the expected path marker. Pure, so the path convention is testable on its own
pub fn candidate_urls(seek_previews_url: &str) -> Option<Vec<(String, String)>> {
    let parsed = url::Url::parse(seek_previews_url).ok()?;
    let host = parsed.host_str()?;

    let segments: Vec<&str> = parsed.path().split('/').collect();
    let marker_index = segments
        .iter()
        .position(|s| s.contains(STORYBOARD_PATH_MARKER))?;
    if marker_index == 0 {
        return None;
    }

    // the segment right before "storyboards" is the vod's storage id
    let special_id = segments[marker_index - 1];
    if special_id.is_empty() {
        return None;
    }

    Some(
        PROBE_QUALITIES
            .iter()
            .map(|quality| {
                (
                    quality.to_string(),
                    format!("https://{}/{}/{}/index-dvr.m3u8", host, special_id, quality),
                )
            })
            .collect(),
    )
}

pub type DynStoryboardService = Arc<dyn StoryboardServiceTrait + Send + Sync>;

#[automock]
#[async_trait]
pub trait StoryboardServiceTrait {
    /// probe every candidate tier concurrently and return the ones that exist, best first.
    /// None when the url doesn't match the convention or no tier responds
    async fn probe(&self, seek_previews_url: &str) -> Option<Vec<(String, String)>>;
}

#[derive(Clone)]
pub struct StoryboardService {
    http: reqwest::Client,
}

impl StoryboardService {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// lightweight existence check, anything but a clean 200 counts as missing
    async fn tier_exists(&self, url: &str) -> bool {
        let result = self
            .http
            .head(url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::REFERER, TWITCH_REFERER)
            .header(reqwest::header::ORIGIN, TWITCH_ORIGIN)
            .send()
            .await;

        match result {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!("quality probe failed for {}: {}", url, e);
                false
            }
        }
    }
}

#[async_trait]
impl StoryboardServiceTrait for StoryboardService {
    async fn probe(&self, seek_previews_url: &str) -> Option<Vec<(String, String)>> {
        let candidates = candidate_urls(seek_previews_url)?;

        info!("probing {} quality tiers on storage path", candidates.len());

        // fan out all probes at once, join_all keeps the best-first ordering
        let checks = candidates.iter().map(|(_, url)| self.tier_exists(url));
        let results = join_all(checks).await;

        let found: Vec<(String, String)> = candidates
            .into_iter()
            .zip(results)
            .filter_map(|(entry, exists)| exists.then_some(entry))
            .collect();

        if found.is_empty() {
            info!("no quality tier responded on the storage path");
            return None;
        }

        info!("storyboard fallback found {} tier(s)", found.len());
        Some(found)
    }
}
