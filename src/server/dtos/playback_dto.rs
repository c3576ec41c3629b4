use serde::Serialize;

use crate::server::services::playlist_services::LinkSet;
use crate::server::services::twitch_gql_services::{PageInfo, VideoItem};

#[derive(Debug, Serialize)]
pub struct ChannelVideosResponse {
    pub videos: Vec<VideoItem>,
    pub pagination: PageInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LivePlaybackResponse {
    pub links: LinkSet,
    pub best: String,
    pub title: String,
    pub game: String,
    pub thumbnail: String,
    pub avatar: String,
}

#[derive(Debug, Serialize)]
pub struct VodPlaybackResponse {
    pub links: LinkSet,
    pub best: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}
