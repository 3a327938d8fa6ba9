//! Audible feedback through a text-to-speech command.
//!
//! Purely observational: failures to speak are logged and otherwise ignored.

use std::process::{Command, Stdio};

use log::warn;

pub const SAY_START: &str = "Starting to read card";
pub const SAY_ERROR: &str = "an error has occurred";
pub const SAY_DETACH: &str = "detach your card";

/// Speaks short phrases at phase transitions.
pub trait Announcer {
    fn say(&self, text: &str);
}

/// Runs `<command> <text>` and waits for it, like a shell `system()` call.
#[derive(Debug, Clone)]
pub struct SpeechAnnouncer {
    command: String,
}

impl SpeechAnnouncer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Announcer for SpeechAnnouncer {
    fn say(&self, text: &str) {
        let status = Command::new(&self.command)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => warn!("'{} \"{}\"' exited with {}", self.command, text, status),
            Err(e) => warn!("Failed to run '{}': {}", self.command, e),
        }
    }
}

/// Announcer that stays quiet.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAnnouncer;

impl Announcer for SilentAnnouncer {
    fn say(&self, _text: &str) {}
}
