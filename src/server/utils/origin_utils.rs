use axum::http::HeaderMap;

/// the origin advertised inside rewritten playlists. Config override first, otherwise rebuilt
/// from the proxy headers the hosting platform sets
pub fn resolve_public_origin(public_base_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(configured) = public_base_url {
        return configured.trim_end_matches('/').to_string();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim())
        .unwrap_or("http");

    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}
