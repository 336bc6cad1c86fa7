//! Track metadata extraction from an MPRIS `Metadata` property map.

use std::collections::HashMap;
use zvariant::OwnedValue;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Seconds, from `mpris:length`.
    pub length: Option<f64>,
}

/// Extract metadata fields from a D-Bus property map.
///
/// MPRIS defines artist/album as arrays of strings, but some players
/// send a single string; both are accepted.
pub fn extract_metadata(map: &HashMap<String, OwnedValue>) -> TrackMetadata {
    let title = map.get("xesam:title").and_then(owned_string).unwrap_or_default();
    let artist = map.get("xesam:artist").and_then(first_string).unwrap_or_default();
    let album = map.get("xesam:album").and_then(first_string).unwrap_or_default();
    let length = map.get("mpris:length").and_then(micros_to_secs);
    TrackMetadata { title, artist, album, length }
}

/// Whether `new` is a different song rather than a metadata refresh (players
/// often fill in the length or album a moment after the title).
pub fn is_new_track(old: &TrackMetadata, new: &TrackMetadata) -> bool {
    old.title != new.title || old.artist != new.artist
}

fn owned_string(v: &OwnedValue) -> Option<String> {
    String::try_from(v.clone()).ok()
}

fn first_string(v: &OwnedValue) -> Option<String> {
    if let Ok(list) = Vec::<String>::try_from(v.clone()) {
        return list.into_iter().next();
    }
    owned_string(v)
}

/// MPRIS reports times in microseconds, as either signed or unsigned ints.
pub fn micros_to_secs(v: &OwnedValue) -> Option<f64> {
    if let Ok(i) = i64::try_from(v.clone()) {
        return Some(i as f64 / 1_000_000.0);
    }
    if let Ok(u) = u64::try_from(v.clone()) {
        return Some(u as f64 / 1_000_000.0);
    }
    None
}
