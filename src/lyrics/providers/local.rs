use std::path::{Path, PathBuf};

use super::{LyricSource, TrackQuery};
use crate::lyrics::parse::parse_synced_lyrics;
use crate::lyrics::types::{LyricTrack, LyricsError, PLAIN_LINE_SPACING};

/// Lyrics files in a directory, named `<artist> - <title>.lrc` (timed) or
/// `.txt` (plain). Names are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct LocalDirSource {
    dir: PathBuf,
}

impl LocalDirSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    async fn find(&self, stem: &str) -> Result<Option<PathBuf>, LyricsError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut txt = None;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let (Some(file_stem), Some(ext)) = (path.file_stem(), path.extension()) else {
                continue;
            };
            if !file_stem.to_string_lossy().eq_ignore_ascii_case(stem) {
                continue;
            }
            match ext.to_string_lossy().to_lowercase().as_str() {
                "lrc" => return Ok(Some(path)),
                "txt" => txt = Some(path),
                _ => {}
            }
        }
        Ok(txt)
    }
}

fn file_stem_for(query: &TrackQuery) -> String {
    if query.artist.is_empty() {
        query.title.clone()
    } else {
        format!("{} - {}", query.artist, query.title)
    }
}

fn is_lrc(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case("lrc"))
}

#[async_trait::async_trait]
impl LyricSource for LocalDirSource {
    fn name(&self) -> &str {
        "local"
    }

    async fn resolve(&self, query: &TrackQuery) -> Result<LyricTrack, LyricsError> {
        let Some(path) = self.find(&file_stem_for(query)).await? else {
            return Err(query.not_found());
        };
        let text = tokio::fs::read_to_string(&path).await?;
        let track = if is_lrc(&path) {
            LyricTrack::timed(parse_synced_lyrics(&text))
        } else {
            LyricTrack::plain(&text, PLAIN_LINE_SPACING)
        };
        if track.is_empty() {
            return Err(query.not_found());
        }
        tracing::debug!(path = %path.display(), "loaded local lyrics");
        Ok(track)
    }
}
