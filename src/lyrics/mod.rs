// lyrics/mod.rs - lyric data model, LRC parsing, active-line index and resolution
pub mod index;
pub mod parse;
pub mod providers;
pub mod types;

pub use index::LyricIndex;
pub use parse::parse_synced_lyrics;
pub use types::{LyricEvent, LyricTrack};
