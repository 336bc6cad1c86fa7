use crate::state::SyncEvent;
use std::io::Write;
use tokio::sync::mpsc;

/// Display lyrics in pipe mode (stdout only, for scripting)
pub async fn display_lyrics_pipe(mut rx: mpsc::Receiver<SyncEvent>) -> std::io::Result<()> {
    let mut out = std::io::stdout();
    while let Some(event) = rx.recv().await {
        if let Some(text) = render(&event) {
            writeln!(out, "{}", text)?;
            out.flush()?;
        }
    }
    Ok(())
}

/// What pipe mode prints for an event, if anything.
fn render(event: &SyncEvent) -> Option<String> {
    match event {
        // Un-timed lyrics cannot follow playback; dump them once.
        SyncEvent::TrackLoaded(track) if !track.has_timing() => Some(
            track
                .events()
                .iter()
                .map(|e| e.text())
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        SyncEvent::LineChanged { text, .. } => Some(text.clone().unwrap_or_default()),
        SyncEvent::Progress {
            position, fraction, ..
        } => {
            tracing::trace!(position, ?fraction, "progress");
            None
        }
        _ => None,
    }
}
