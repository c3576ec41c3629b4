// route-level tests with every upstream service mocked out, driven through the real router
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::{Extension, Router};
use tower::ServiceExt;

use vodedge::AppConfig;
use vodedge::server::api::health_controller::health_endpoint;
use vodedge::server::api::playback_controller::PlaybackController;
use vodedge::server::api::proxy_controller::ProxyController;
use vodedge::server::services::edge_services::EdgeServices;
use vodedge::server::services::relay_services::{FetchedPlaylist, MockRelayServiceTrait};
use vodedge::server::services::storyboard_services::MockStoryboardServiceTrait;
use vodedge::server::services::twitch_gql_services::{
    ChannelVideos, MockTwitchGqlServiceTrait, PageInfo, PlaybackToken, StreamMetadata,
    VideoStoryboard,
};

fn test_app(
    twitch: MockTwitchGqlServiceTrait,
    storyboard: MockStoryboardServiceTrait,
    relay: MockRelayServiceTrait,
) -> Router {
    let services = EdgeServices {
        twitch: Arc::new(twitch),
        storyboard: Arc::new(storyboard),
        relay: Arc::new(relay),
        http: reqwest::Client::new(),
        config: Arc::new(AppConfig::default()),
    };

    Router::new()
        .nest(
            "/api",
            PlaybackController::app().merge(ProxyController::app()),
        )
        .layer(Extension(services))
}

async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_missing_channel_name_is_a_400_with_error_body() {
    let app = test_app(
        MockTwitchGqlServiceTrait::new(),
        MockStoryboardServiceTrait::new(),
        MockRelayServiceTrait::new(),
    );

    let response = get(app, "/api/get-channel-videos").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_unknown_channel_is_a_404_with_error_body() {
    let mut twitch = MockTwitchGqlServiceTrait::new();
    twitch.expect_channel_videos().returning(|_, _| None);

    let app = test_app(
        twitch,
        MockStoryboardServiceTrait::new(),
        MockRelayServiceTrait::new(),
    );

    let response = get(app, "/api/get-channel-videos?name=foo").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_channel_with_no_vods_is_a_404_with_error_body() {
    let mut twitch = MockTwitchGqlServiceTrait::new();
    // gql knows the channel but its vod shelf is empty
    twitch.expect_channel_videos().returning(|_, _| {
        Some(ChannelVideos {
            videos: vec![],
            page_info: PageInfo {
                has_next_page: false,
                end_cursor: None,
            },
            avatar: None,
        })
    });

    let app = test_app(
        twitch,
        MockStoryboardServiceTrait::new(),
        MockRelayServiceTrait::new(),
    );

    let response = get(app, "/api/get-channel-videos?name=foo").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_vod_with_failed_token_and_unusable_seek_url_is_a_404() {
    let mut twitch = MockTwitchGqlServiceTrait::new();
    twitch.expect_playback_token().returning(|_, _| None);
    twitch.expect_video_storyboard().returning(|_| {
        Some(VideoStoryboard {
            owner_login: Some("streamer".to_string()),
            seek_previews_url: Some(
                "https://cdn.example.com/no-marker-here/1.json".to_string(),
            ),
        })
    });

    // prober sees no storyboards marker and gives up
    let mut storyboard = MockStoryboardServiceTrait::new();
    storyboard.expect_probe().returning(|_| None);

    let app = test_app(twitch, storyboard, MockRelayServiceTrait::new());

    let response = get(app, "/api/get-m3u8?id=111").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_storyboard_fallback_builds_a_ranked_proxied_link_set() {
    let mut twitch = MockTwitchGqlServiceTrait::new();
    twitch.expect_playback_token().returning(|_, _| None);
    twitch.expect_video_storyboard().returning(|_| {
        Some(VideoStoryboard {
            owner_login: Some("streamer".to_string()),
            seek_previews_url: Some(
                "https://cdn.example.com/abc_streamer/storyboards/1.json".to_string(),
            ),
        })
    });

    let mut storyboard = MockStoryboardServiceTrait::new();
    storyboard.expect_probe().returning(|_| {
        Some(vec![
            (
                "chunked".to_string(),
                "https://cdn.example.com/abc_streamer/chunked/index-dvr.m3u8".to_string(),
            ),
            (
                "720p60".to_string(),
                "https://cdn.example.com/abc_streamer/720p60/index-dvr.m3u8".to_string(),
            ),
        ])
    });

    let app = test_app(twitch, storyboard, MockRelayServiceTrait::new());

    let response = get(app, "/api/get-m3u8?id=111").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let links = json.get("links").unwrap().as_object().unwrap();

    assert!(links.contains_key("Auto"));
    let source = links.get("Source").unwrap().as_str().unwrap();
    assert!(source.contains("/api/proxy?url="));
    assert!(source.contains("chunked%2Findex-dvr.m3u8"));
    assert_eq!(json.get("best").unwrap().as_str().unwrap(), source);
    assert!(
        json.get("info")
            .unwrap()
            .as_str()
            .unwrap()
            .contains("streamer")
    );
}

#[tokio::test]
async fn test_live_resolution_parses_master_and_carries_metadata() {
    let manifest = concat!(
        "#EXTM3U\n",
        "#EXT-X-STREAM-INF:BANDWIDTH=6000000,VIDEO=\"chunked\"\n",
        "https://video-edge.ttvnw.net/hls/chunked/playlist.m3u8\n",
        "#EXT-X-STREAM-INF:BANDWIDTH=3000000,VIDEO=\"720p60\"\n",
        "https://video-edge.ttvnw.net/hls/720p60/playlist.m3u8\n",
    );

    let mut twitch = MockTwitchGqlServiceTrait::new();
    twitch.expect_playback_token().returning(|_, _| {
        Some(PlaybackToken {
            value: "{\"channel\":\"foo\"}".to_string(),
            signature: "sig".to_string(),
        })
    });
    twitch.expect_stream_metadata().returning(|_| {
        Some(StreamMetadata {
            title: Some("Speedrun".to_string()),
            game: Some("Tetris".to_string()),
            avatar: None,
        })
    });

    let mut relay = MockRelayServiceTrait::new();
    relay.expect_fetch_playlist().returning(move |_| {
        Some(FetchedPlaylist {
            status: 200,
            final_url: "https://usher.ttvnw.net/api/channel/hls/foo.m3u8".to_string(),
            text: manifest.to_string(),
        })
    });

    let app = test_app(twitch, MockStoryboardServiceTrait::new(), relay);

    let response = get(app, "/api/get-live?name=Foo").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json.get("title").unwrap().as_str().unwrap(), "Speedrun");
    assert_eq!(json.get("game").unwrap().as_str().unwrap(), "Tetris");

    let links = json.get("links").unwrap().as_object().unwrap();
    assert!(links.contains_key("Auto"));
    assert!(links.contains_key("Source"));
    assert!(links.contains_key("720p60"));
}

#[tokio::test]
async fn test_proxy_forwards_range_and_preserves_partial_content() {
    let mut relay = MockRelayServiceTrait::new();
    relay
        .expect_relay()
        .withf(|url: &str, range: &Option<String>, _origin: &str, is_vod: &bool| {
            url == "https://x/seg1.ts" && range.as_deref() == Some("bytes=100-199") && *is_vod
        })
        .returning(|_, _, _, _| {
            Ok(axum::http::Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header("Content-Range", "bytes 100-199/1000")
                .body(Body::empty())
                .unwrap())
        });

    let app = test_app(
        MockTwitchGqlServiceTrait::new(),
        MockStoryboardServiceTrait::new(),
        relay,
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/proxy?url=https%3A%2F%2Fx%2Fseg1.ts&isVod=true")
                .header("Range", "bytes=100-199")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get("Content-Range").unwrap(),
        "bytes 100-199/1000"
    );
}

#[tokio::test]
async fn test_proxy_without_url_parameter_is_a_400() {
    let app = test_app(
        MockTwitchGqlServiceTrait::new(),
        MockStoryboardServiceTrait::new(),
        MockRelayServiceTrait::new(),
    );

    let response = get(app, "/api/proxy").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_healthy_with_version_and_uptime() {
    let services = EdgeServices {
        twitch: Arc::new(MockTwitchGqlServiceTrait::new()),
        storyboard: Arc::new(MockStoryboardServiceTrait::new()),
        relay: Arc::new(MockRelayServiceTrait::new()),
        http: reqwest::Client::new(),
        config: Arc::new(AppConfig::default()),
    };
    let app = Router::new()
        .route("/health", axum::routing::get(health_endpoint))
        .layer(Extension(services));

    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json.get("status").unwrap().as_str().unwrap(), "healthy");
    assert!(json.get("version").unwrap().as_str().is_some());
    assert!(json.get("uptime_seconds").unwrap().as_u64().is_some());
}
