//! Line-based keyboard control for pipe mode.

use crate::schedule::TickHandle;
use crate::session::SessionCommand;
use std::io::BufRead;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum Input {
    Command(SessionCommand),
    Quit,
}

/// `p` toggles pause, `s <secs>` seeks, `l <line>` jumps to a line (1-based),
/// `q` quits. Anything else is ignored.
pub fn parse_input(line: &str) -> Option<Input> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next()?;
    let arg = parts.next();
    match (cmd, arg) {
        ("p", None) => Some(Input::Command(SessionCommand::TogglePause)),
        ("q", None) => Some(Input::Quit),
        ("s", Some(a)) => a
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite())
            .map(|s| Input::Command(SessionCommand::Seek(s))),
        ("l", Some(a)) => a
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .map(|n| Input::Command(SessionCommand::SeekToLine(n))),
        _ => None,
    }
}

/// Forward stdin commands to the session until EOF or `q`.
///
/// Reads on a detached OS thread: a pending tokio stdin read would hold up
/// runtime shutdown until the next newline.
pub fn spawn_command_reader(commands: mpsc::Sender<SessionCommand>, stop: TickHandle) {
    let spawned = std::thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || forward_commands(std::io::stdin().lock(), &commands, &stop));
    if let Err(e) = spawned {
        tracing::warn!("cannot start stdin reader: {}", e);
    }
}

fn forward_commands<R: BufRead>(reader: R, commands: &mpsc::Sender<SessionCommand>, stop: &TickHandle) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("stdin read failed: {}", e);
                break;
            }
        };
        match parse_input(&line) {
            Some(Input::Command(cmd)) => {
                if commands.blocking_send(cmd).is_err() {
                    break;
                }
            }
            Some(Input::Quit) => {
                stop.stop();
                break;
            }
            None => tracing::debug!(input = %line, "unrecognized input"),
        }
    }
}
