//! Lyric resolution: independent sources tried in order, first success wins.

pub mod local;
pub mod lrclib;

use crate::lyrics::types::{LyricTrack, LyricsError};
use crate::text_utils::clean_title;
use std::path::PathBuf;

pub use local::LocalDirSource;
pub use lrclib::LrclibSource;

/// What to search for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackQuery {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub duration: Option<f64>,
}

impl TrackQuery {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn not_found(&self) -> LyricsError {
        LyricsError::NotFound {
            artist: self.artist.clone(),
            title: self.title.clone(),
        }
    }
}

/// One resolution strategy.
#[async_trait::async_trait]
pub trait LyricSource: Send + Sync {
    fn name(&self) -> &str;
    async fn resolve(&self, query: &TrackQuery) -> Result<LyricTrack, LyricsError>;
}

/// Try each source in order and return the first track found.
pub async fn first_success(
    sources: &[Box<dyn LyricSource>],
    query: &TrackQuery,
) -> Result<LyricTrack, LyricsError> {
    for source in sources {
        match source.resolve(query).await {
            Ok(track) => {
                tracing::info!(
                    source = source.name(),
                    lines = track.len(),
                    timed = track.has_timing(),
                    "lyrics resolved"
                );
                return Ok(track);
            }
            Err(e) => tracing::debug!(source = source.name(), "no lyrics: {}", e),
        }
    }
    Err(query.not_found())
}

/// Retries an inner source with the title stripped of video decorations.
/// Fails without calling the inner source when cleaning changes nothing.
pub struct CleanedTitle<S> {
    inner: S,
    name: String,
}

impl<S: LyricSource> CleanedTitle<S> {
    pub fn new(inner: S) -> Self {
        let name = format!("{}+cleaned", inner.name());
        Self { inner, name }
    }
}

#[async_trait::async_trait]
impl<S: LyricSource> LyricSource for CleanedTitle<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self, query: &TrackQuery) -> Result<LyricTrack, LyricsError> {
        let title = clean_title(&query.title);
        if title == query.title || title.is_empty() {
            return Err(query.not_found());
        }
        let cleaned = TrackQuery {
            title,
            ..query.clone()
        };
        self.inner.resolve(&cleaned).await
    }
}

/// Build the source chain from provider names ("lrclib", "local"). Each
/// provider is followed by its cleaned-title variant.
pub fn sources_from_names(names: &[String], lyrics_dir: Option<PathBuf>) -> Vec<Box<dyn LyricSource>> {
    let mut sources: Vec<Box<dyn LyricSource>> = Vec::new();
    for name in names {
        match name.as_str() {
            "lrclib" => {
                sources.push(Box::new(LrclibSource::new()));
                sources.push(Box::new(CleanedTitle::new(LrclibSource::new())));
            }
            "local" => match &lyrics_dir {
                Some(dir) => {
                    sources.push(Box::new(LocalDirSource::new(dir.clone())));
                    sources.push(Box::new(CleanedTitle::new(LocalDirSource::new(dir.clone()))));
                }
                None => tracing::warn!("provider \"local\" needs --lyrics-dir, skipping"),
            },
            other => tracing::warn!("unknown provider: {}", other),
        }
    }
    sources
}
