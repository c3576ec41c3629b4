// playlist parsing, link rewriting and quality ranking. Everything in here is pure so it can be
// hammered by the integration tests without touching the network
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, warn};

use crate::server::error::{AppResult, Error};

/// twitch's internal name for the top quality tier inside master playlists
pub const SOURCE_TIER_TOKEN: &str = "chunked";

/// canonical display name for the top tier
pub const SOURCE_LABEL: &str = "Source";

/// display ranking, best first. Matching is case-insensitive substring because upstream labels
/// carry extra decoration (embedded resolution, framerate) around the recognized token
pub const DISPLAY_ORDER: [&str; 11] = [
    SOURCE_LABEL,
    "1080p60",
    "1080p30",
    "1080p",
    "720p60",
    "720p30",
    "720p",
    "480p",
    "360p",
    "160p",
    "audio_only",
];

/// ordered label -> proxied url mapping. Priority lives in the explicit sequence, never in
/// container iteration order, and it serializes as a plain JSON object in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkSet {
    entries: Vec<(String, String)>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// first label wins, later duplicates are dropped
    pub fn push(&mut self, label: impl Into<String>, url: impl Into<String>) {
        let label = label.into();
        if self.entries.iter().any(|(l, _)| *l == label) {
            debug!("dropping duplicate quality label: {}", label);
            return;
        }
        self.entries.push((label, url.into()));
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, u)| u.as_str())
    }

    /// best playable default: Source tier when present, otherwise the Auto master entry
    pub fn best(&self) -> Option<&str> {
        self.get(SOURCE_LABEL)
            .or_else(|| self.get("Auto"))
            .or_else(|| self.entries.first().map(|(_, u)| u.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, u)| (l.as_str(), u.as_str()))
    }
}

impl Serialize for LinkSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, url) in &self.entries {
            map.serialize_entry(label, url)?;
        }
        map.end()
    }
}

/// wrap a fully resolved upstream url so the player comes back through the relay
pub fn proxy_url(proxy_base: &str, target: &str, is_vod: bool) -> String {
    format!(
        "{}/api/proxy?url={}&isVod={}",
        proxy_base.trim_end_matches('/'),
        urlencoding::encode(target),
        is_vod
    )
}

/// resolve a playlist line against the playlist's own directory. Absolute lines pass through
fn resolve_reference(fetch_url: &url::Url, line: &str) -> Option<String> {
    if line.starts_with("http://") || line.starts_with("https://") {
        return Some(line.to_string());
    }
    match fetch_url.join(line) {
        Ok(resolved) => Some(resolved.to_string()),
        Err(e) => {
            warn!("failed to resolve playlist reference {}: {}", line, e);
            None
        }
    }
}

/// normalize a raw quality tag to its display form. Only the literal internal top-tier token is
/// relabeled, a tag that merely mentions a resolution keeps its own name
pub fn canonical_label(raw: &str) -> String {
    if raw.eq_ignore_ascii_case(SOURCE_TIER_TOKEN) {
        SOURCE_LABEL.to_string()
    } else {
        raw.to_string()
    }
}

/// pull the quality label out of a variant declaration line. The VIDEO attribute is what twitch
/// keys variants on, RESOLUTION is the fallback when a playlist omits it
fn variant_label(line: &str) -> Option<String> {
    if let Some((_, rest)) = line.split_once("VIDEO=\"") {
        let raw = rest.split('"').next()?;
        if raw.is_empty() {
            return None;
        }
        return Some(canonical_label(raw));
    }

    if line.starts_with("#EXT-X-STREAM-INF") {
        if let Some((_, rest)) = line.split_once("RESOLUTION=") {
            let raw = rest.split(',').next()?.trim();
            if !raw.is_empty() {
                return Some(raw.to_string());
            }
        }
    }

    None
}

/// does this raw label belong to the given rank?
fn matches_rank(label: &str, rank: &str) -> bool {
    let label = label.to_ascii_lowercase();
    if rank == SOURCE_LABEL {
        // top tier goes by several names upstream
        return label.contains("source") || label.contains(SOURCE_TIER_TOKEN);
    }
    label.contains(&rank.to_ascii_lowercase())
}

/// order raw (label, url) pairs by the fixed display ranking. Each entry is consumed by the first
/// rank it matches; anything unrecognized trails in first-seen order
pub fn sort_links(unsorted: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut remaining = unsorted;
    let mut sorted = Vec::with_capacity(remaining.len());

    for rank in DISPLAY_ORDER {
        let mut i = 0;
        while i < remaining.len() {
            if matches_rank(&remaining[i].0, rank) {
                sorted.push(remaining.remove(i));
            } else {
                i += 1;
            }
        }
    }

    sorted.append(&mut remaining);
    sorted
}

/// parse a master playlist and produce the sorted, proxy-wrapped link set. The synthetic Auto
/// entry always comes first and points back at the master playlist itself
pub fn parse_and_rewrite(
    text: &str,
    fetch_url: &str,
    proxy_base: &str,
    is_vod: bool,
) -> AppResult<LinkSet> {
    if !text.contains("#EXTM3U") {
        return Err(Error::NotFound("unrecognized playlist format".to_string()));
    }

    let base = url::Url::parse(fetch_url)
        .map_err(|e| Error::NotFound(format!("invalid playlist url: {}", e)))?;

    let mut pending: Option<String> = None;
    let mut collected: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with('#') {
            if let Some(label) = variant_label(trimmed) {
                pending = Some(label);
            }
            continue;
        }

        // a bare line right after a variant declaration is that variant's url
        if let Some(label) = pending.take() {
            if let Some(resolved) = resolve_reference(&base, trimmed) {
                collected.push((label, resolved));
            }
        }
    }

    debug!(
        "parsed {} variant(s) from playlist at {}",
        collected.len(),
        fetch_url
    );

    let mut links = LinkSet::new();
    links.push("Auto", proxy_url(proxy_base, fetch_url, is_vod));
    for (label, target) in sort_links(collected) {
        let wrapped = proxy_url(proxy_base, &target, is_vod);
        links.push(label, wrapped);
    }

    Ok(links)
}

/// relay-side rewrite of a whole playlist body. Comments and blank lines pass through untouched,
/// every reference line is resolved to an absolute url and wrapped in a proxy link so segments
/// also flow back through us (players can't send the spoofed headers themselves)
pub fn rewrite_manifest_body(
    text: &str,
    fetch_url: &str,
    proxy_base: &str,
    is_vod: bool,
) -> AppResult<String> {
    let base = url::Url::parse(fetch_url).map_err(|e| {
        Error::InternalServerErrorWithContext(format!("invalid base url for rewrite: {}", e))
    })?;

    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                return line.to_string();
            }

            match resolve_reference(&base, trimmed) {
                Some(resolved) => proxy_url(proxy_base, &resolved, is_vod),
                // leave unresolvable lines alone rather than breaking the playlist shape
                None => line.to_string(),
            }
        })
        .collect();

    Ok(lines.join("\n"))
}
