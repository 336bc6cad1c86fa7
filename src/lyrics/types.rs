use once_cell::sync::Lazy;
use reqwest::Client;
use thiserror::Error;

// Shared HTTP client with reasonable defaults for timeouts
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent("lyricsync/0.1")
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client")
});

/// Spacing used when synthesizing display-only timestamps for plain lyrics.
pub const PLAIN_LINE_SPACING: f64 = 3.0;

/// One timed lyric line. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricEvent {
    time: f64,
    text: String,
}

impl LyricEvent {
    /// Returns `None` for an empty (after trim) text or a time that is
    /// negative or not finite.
    pub fn new(time: f64, text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if !time.is_finite() || time < 0.0 || text.trim().is_empty() {
            return None;
        }
        Some(Self { time, text })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The resolved lyrics for one track. Replaced wholesale on a new search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricTrack {
    events: Vec<LyricEvent>,
    has_timing: bool,
}

impl LyricTrack {
    /// Build a timed track. Events are stably sorted by time so callers may
    /// pass them in any order.
    pub fn timed(mut events: Vec<LyricEvent>) -> Self {
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            events,
            has_timing: true,
        }
    }

    /// Synthesize a display-only track from plain text: one event per
    /// non-empty line, `spacing` seconds apart.
    pub fn plain(text: &str, spacing: f64) -> Self {
        let events = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .filter_map(|(i, l)| LyricEvent::new(i as f64 * spacing, l))
            .collect();
        Self {
            events,
            has_timing: false,
        }
    }

    pub fn events(&self) -> &[LyricEvent] {
        &self.events
    }

    pub fn has_timing(&self) -> bool {
        self.has_timing
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum LyricsError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no lyrics found for {artist} - {title}")]
    NotFound { artist: String, title: String },
}

// Re-export HTTP client for providers within the lyrics module
pub(crate) fn http_client() -> &'static Client {
    &HTTP_CLIENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_rejects_blank_text() {
        assert!(LyricEvent::new(1.0, "   ").is_none());
        assert!(LyricEvent::new(-1.0, "x").is_none());
        assert!(LyricEvent::new(f64::NAN, "x").is_none());
        assert_eq!(LyricEvent::new(0.0, "x").map(|e| e.time()), Some(0.0));
    }

    #[test]
    fn test_timed_track_is_stably_sorted() {
        let events = vec![
            LyricEvent::new(5.0, "b").unwrap(),
            LyricEvent::new(1.0, "a").unwrap(),
            LyricEvent::new(5.0, "c").unwrap(),
        ];
        let track = LyricTrack::timed(events);
        let texts: Vec<_> = track.events().iter().map(|e| e.text()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert!(track.has_timing());
    }

    #[test]
    fn test_plain_track_spacing() {
        let track = LyricTrack::plain("first\n\n  second  \nthird", 2.5);
        assert!(!track.has_timing());
        assert_eq!(track.len(), 3);
        assert_eq!(track.events()[1].text(), "second");
        assert_eq!(track.events()[2].time(), 5.0);
    }
}
