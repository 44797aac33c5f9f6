//! User-facing messages.
//!
//! Diagnostics go through `tracing`; what the user is meant to read goes
//! through [`Logger`], prefixed with `[packcli]` on stderr.

use std::fmt::Display;
use std::sync::{Arc, Mutex};

const PREFIX: &str = "[packcli]";

/// Writes prefixed messages to stderr and raw output to stdout.
///
/// A capturing logger records lines instead, for tests.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    captured: Option<Arc<Mutex<Vec<String>>>>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A logger that records every line instead of printing it.
    pub fn capture() -> Self {
        Self {
            captured: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Lines recorded by a capturing logger.
    pub fn lines(&self) -> Vec<String> {
        self.captured
            .as_ref()
            .and_then(|lines| lines.lock().ok().map(|lines| lines.clone()))
            .unwrap_or_default()
    }

    pub fn error(&self, message: impl Display) {
        self.prefixed(message);
    }

    pub fn warn(&self, message: impl Display) {
        self.prefixed(message);
    }

    pub fn info(&self, message: impl Display) {
        self.prefixed(message);
    }

    pub fn success(&self, message: impl Display) {
        self.prefixed(message);
    }

    /// Unprefixed output on stdout.
    pub fn raw(&self, message: impl Display) {
        match &self.captured {
            Some(lines) => Self::record(lines, message.to_string()),
            None => println!("{message}"),
        }
    }

    fn prefixed(&self, message: impl Display) {
        let message = message.to_string();
        match &self.captured {
            Some(lines) => {
                for line in message.lines() {
                    Self::record(lines, format!("{PREFIX} {line}"));
                }
            }
            None => {
                for line in message.lines() {
                    eprintln!("{PREFIX} {line}");
                }
            }
        }
    }

    fn record(lines: &Mutex<Vec<String>>, line: String) {
        if let Ok(mut lines) = lines.lock() {
            lines.push(line);
        }
    }
}
