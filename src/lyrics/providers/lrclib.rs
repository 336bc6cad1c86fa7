use serde::Deserialize;

use super::{LyricSource, TrackQuery};
use crate::lyrics::parse::parse_synced_lyrics;
use crate::lyrics::types::{LyricTrack, LyricsError, PLAIN_LINE_SPACING, http_client};

const LRCLIB_BASE: &str = "https://lrclib.net/api/get";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrcLibResponse {
    synced_lyrics: Option<String>,
    plain_lyrics: Option<String>,
}

/// lrclib.net: community-sourced synced lyrics. Falls back to the plain
/// transcript when no synced version exists.
#[derive(Debug, Clone, Default)]
pub struct LrclibSource;

impl LrclibSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl LyricSource for LrclibSource {
    fn name(&self) -> &str {
        "lrclib"
    }

    async fn resolve(&self, query: &TrackQuery) -> Result<LyricTrack, LyricsError> {
        let url = build_lrclib_url(query);
        let resp = http_client().get(&url).send().await?;

        // 404 means no lyrics found - not an error
        if resp.status().as_u16() == 404 {
            return Err(query.not_found());
        }
        if !resp.status().is_success() {
            return Err(LyricsError::Api(format!("lrclib: HTTP {}", resp.status())));
        }

        let body = resp.text().await?;
        let track = decode_body(&body)?;
        track.ok_or_else(|| query.not_found())
    }
}

fn decode_body(body: &str) -> Result<Option<LyricTrack>, LyricsError> {
    let response: LrcLibResponse = serde_json::from_str(body)?;
    Ok(track_from_response(response))
}

fn track_from_response(response: LrcLibResponse) -> Option<LyricTrack> {
    if let Some(synced) = response.synced_lyrics.filter(|s| !s.trim().is_empty()) {
        let events = parse_synced_lyrics(&synced);
        if !events.is_empty() {
            return Some(LyricTrack::timed(events));
        }
    }
    response
        .plain_lyrics
        .map(|plain| LyricTrack::plain(&plain, PLAIN_LINE_SPACING))
        .filter(|track| !track.is_empty())
}

/// Build lrclib API URL with query parameters.
fn build_lrclib_url(query: &TrackQuery) -> String {
    let mut params = vec![
        format!("artist_name={}", urlencoding::encode(&query.artist)),
        format!("track_name={}", urlencoding::encode(&query.title)),
    ];

    if !query.album.is_empty() {
        params.push(format!("album_name={}", urlencoding::encode(&query.album)));
    }

    if let Some(d) = query.duration.filter(|d| d.is_finite() && *d > 0.0) {
        // API expects duration in seconds (integer)
        params.push(format!("duration={}", d.round() as i64));
    }

    format!("{}?{}", LRCLIB_BASE, params.join("&"))
}
