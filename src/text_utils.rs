// src/text_utils.rs
// Title heuristics for turning a video title into an (artist, title) query

use once_cell::sync::Lazy;
use regex::Regex;

/// Bracketed decorations video titles carry: "(Official Video)", "[HD]", ...
static DECORATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*[\(\[][^\)\]]*\b(official|lyrics?|audio|video|visuali[sz]er|hd|hq|4k|remaster(ed)?|live|mv|m/v)\b[^\)\]]*[\)\]]",
    )
    .unwrap()
});

/// Trailing featured-artist credit.
static FEATURING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+[\(\[]?\b(ft\.?|feat\.?|featuring)\s.*$").unwrap());

const SEPARATORS: [&str; 3] = [" - ", " – ", " — "];

/// Split "Artist - Song" on the first dash separator. Without one, the whole
/// string is the title and the artist is empty.
pub fn split_artist_title(raw: &str) -> (String, String) {
    let raw = raw.trim();
    let split = SEPARATORS
        .iter()
        .filter_map(|sep| raw.find(sep).map(|i| (i, sep.len())))
        .min_by_key(|(i, _)| *i);
    match split {
        Some((i, len)) => (
            raw[..i].trim().to_string(),
            raw[i + len..].trim().to_string(),
        ),
        None => (String::new(), raw.to_string()),
    }
}

/// Strip video decorations, featured artists and wrapping quotes.
pub fn clean_title(title: &str) -> String {
    let stripped = DECORATION_RE.replace_all(title, "");
    let stripped = FEATURING_RE.replace(&stripped, "");
    stripped
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim()
        .to_string()
}
