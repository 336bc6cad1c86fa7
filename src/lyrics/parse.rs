use crate::lyrics::types::LyricEvent;
use once_cell::sync::Lazy;
use regex::Regex;

/// One leading `[MM:SS.ff]` / `[MM:SS.fff]` tag. Single-digit fractions are
/// accepted too and padded the same way.
static LEADING_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(\d+):(\d{1,2})\.(\d{1,3})\]").unwrap());

/// Parse time-synced LRC text into events sorted by time.
///
/// Never fails: lines without a valid leading tag, or with nothing left after
/// the tags, produce no events.
pub fn parse_synced_lyrics(synced: &str) -> Vec<LyricEvent> {
    let mut events = Vec::new();
    for line in synced.lines() {
        let (times, text) = split_tags(line.trim_start());
        if times.is_empty() {
            continue;
        }
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        events.extend(times.into_iter().filter_map(|t| LyricEvent::new(t, text)));
    }
    // Stable: ties keep input order.
    events.sort_by(|a, b| a.time().total_cmp(&b.time()));
    events
}

/// Consume every leading timestamp tag, returning their times and the rest.
fn split_tags(mut line: &str) -> (Vec<f64>, &str) {
    let mut times = Vec::new();
    while let Some(cap) = LEADING_TAG_RE.captures(line) {
        let whole = cap.get(0).map(|m| m.end()).unwrap_or(0);
        if let Some(t) = tag_seconds(&cap[1], &cap[2], &cap[3]) {
            times.push(t);
        }
        line = &line[whole..];
    }
    (times, line)
}

fn tag_seconds(min: &str, sec: &str, frac: &str) -> Option<f64> {
    let min = min.parse::<u64>().ok()?;
    let sec = sec.parse::<u64>().ok()?;
    // ".5" is 500ms, ".05" is 50ms.
    let millis = format!("{:0<3}", frac).parse::<u64>().ok()?;
    Some(min as f64 * 60.0 + sec as f64 + millis as f64 / 1000.0)
}
