//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::tui::{OutputStream, TerminalBackend, TerminalError};

/// In-memory sink that claims to be a terminal. Clones share the buffer.
#[derive(Clone, Default)]
pub struct TtySink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TtySink {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}

impl Write for TtySink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputStream for TtySink {
    fn is_interactive(&self) -> bool {
        true
    }
}

/// Records which terminal operations the session performed.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<&'static str>>,
    fail_enable: bool,
}

impl RecordingBackend {
    pub fn failing_enable() -> Self {
        Self {
            fail_enable: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl TerminalBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn enable_raw_mode(&self) -> Result<(), TerminalError> {
        self.record("enable");
        if self.fail_enable {
            return Err(TerminalError::NotATerminal);
        }
        Ok(())
    }

    fn disable_raw_mode(&self) -> Result<(), TerminalError> {
        self.record("disable");
        Ok(())
    }

    fn poll_key(&self) -> io::Result<Option<char>> {
        Ok(None)
    }

    fn clear(&self, out: &mut dyn Write) -> io::Result<()> {
        self.record("clear");
        out.write_all(b"<clear>")
    }
}

/// Replays a fixed sequence of poll results, then reports no key.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<io::Result<Option<char>>>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<io::Result<Option<char>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }

    pub fn keys(keys: &str) -> Self {
        Self::new(keys.chars().map(|c| Ok(Some(c))).collect())
    }
}

impl TerminalBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn enable_raw_mode(&self) -> Result<(), TerminalError> {
        Ok(())
    }

    fn disable_raw_mode(&self) -> Result<(), TerminalError> {
        Ok(())
    }

    fn poll_key(&self) -> io::Result<Option<char>> {
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    fn clear(&self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

/// Removes CSI escape sequences (`ESC [ ... final-byte`).
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}
