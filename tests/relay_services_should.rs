// response assembly for the playlist half of the relay. The network half is exercised through
// the route tests with the service mocked; this covers the pure builder directly
use axum::http::StatusCode;

use vodedge::server::services::relay_services::{PLAYLIST_CONTENT_TYPE, RelayService};

#[test]
fn test_playlist_response_carries_the_upstream_status_through() {
    let response = RelayService::build_playlist_response(200, "#EXTM3U\n".to_string()).unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // a non-200 success from upstream must not be flattened to 200
    let response = RelayService::build_playlist_response(203, "#EXTM3U\n".to_string()).unwrap();
    assert_eq!(response.status(), StatusCode::NON_AUTHORITATIVE_INFORMATION);
}

#[test]
fn test_playlist_response_has_hls_content_type_and_open_cors() {
    let response = RelayService::build_playlist_response(200, "#EXTM3U\n".to_string()).unwrap();

    assert_eq!(
        response.headers().get("Content-Type").unwrap(),
        PLAYLIST_CONTENT_TYPE
    );
    assert_eq!(
        response.headers().get("Access-Control-Allow-Origin").unwrap(),
        "*"
    );
    assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-cache");
}

#[test]
fn test_playlist_response_falls_back_to_200_on_a_status_outside_the_http_range() {
    let response = RelayService::build_playlist_response(99, String::new()).unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
