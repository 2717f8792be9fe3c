//! Terminal backends.
//!
//! The session only talks to [`TerminalBackend`]. Which backend runs is
//! picked once at startup:
//!
//! - [`CrosstermBackend`]: portable raw mode and key polling.
//! - [`TermiosBackend`] (unix): clears only `ICANON | ECHO`, so Ctrl+C
//!   still raises SIGINT.
//! - [`NullBackend`]: no-ops, for redirected output and as the fallback
//!   after terminal control failed.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use crossterm::QueueableCommand;
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, Clear, ClearType};
use log::info;

use crate::BackendKind;

/// Ctrl+C as delivered while `ISIG` is off.
pub const CTRL_C: char = '\u{3}';
pub const ESCAPE: char = '\u{1b}';

pub trait TerminalBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Switch input to character-at-a-time, no echo. Snapshots the prior
    /// attributes on the first call.
    fn enable_raw_mode(&self) -> Result<(), TerminalError>;

    /// Restore the attributes snapshotted by `enable_raw_mode`. No-op when
    /// nothing was snapshotted.
    fn disable_raw_mode(&self) -> Result<(), TerminalError>;

    /// Non-blocking: returns `Ok(None)` when no key is waiting.
    fn poll_key(&self) -> io::Result<Option<char>>;

    /// Line terminator to write while raw mode is on.
    fn line_ending(&self) -> &'static str {
        "\n"
    }

    fn clear(&self, out: &mut dyn Write) -> io::Result<()> {
        out.queue(Clear(ClearType::All))?;
        out.queue(MoveTo(0, 0))?;
        out.flush()
    }
}

/// Build the backend selected on the command line.
pub fn build_backend(kind: BackendKind) -> Arc<dyn TerminalBackend> {
    match kind {
        BackendKind::Crossterm => Arc::new(CrosstermBackend),
        #[cfg(unix)]
        BackendKind::Termios => Arc::new(TermiosBackend::stdin()),
        #[cfg(not(unix))]
        BackendKind::Termios => {
            log::warn!("termios backend is unix-only, using crossterm");
            Arc::new(CrosstermBackend)
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum TerminalError {
    NotATerminal,
    Io(io::Error),
}

impl fmt::Display for TerminalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalError::NotATerminal => write!(f, "input is not a terminal"),
            TerminalError::Io(e) => write!(f, "terminal control failed: {e}"),
        }
    }
}

impl std::error::Error for TerminalError {}

impl From<io::Error> for TerminalError {
    fn from(e: io::Error) -> Self {
        TerminalError::Io(e)
    }
}

// ============================================================================
// Null
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl TerminalBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn enable_raw_mode(&self) -> Result<(), TerminalError> {
        Ok(())
    }

    fn disable_raw_mode(&self) -> Result<(), TerminalError> {
        Ok(())
    }

    fn poll_key(&self) -> io::Result<Option<char>> {
        Ok(None)
    }

    fn clear(&self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Crossterm
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermBackend;

impl TerminalBackend for CrosstermBackend {
    fn name(&self) -> &'static str {
        "crossterm"
    }

    fn enable_raw_mode(&self) -> Result<(), TerminalError> {
        terminal::enable_raw_mode()?;
        info!("Raw mode enabled (crossterm)");
        Ok(())
    }

    fn disable_raw_mode(&self) -> Result<(), TerminalError> {
        // crossterm keeps the original mode and ignores a second disable
        terminal::disable_raw_mode()?;
        Ok(())
    }

    /// Raw mode here also turns off output post-processing, so a bare
    /// `\n` no longer returns the carriage.
    fn line_ending(&self) -> &'static str {
        "\r\n"
    }

    fn poll_key(&self) -> io::Result<Option<char>> {
        if !event::poll(Duration::ZERO)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(key_char(key)),
            _ => Ok(None),
        }
    }
}

fn key_char(key: KeyEvent) -> Option<char> {
    match (key.modifiers, key.code) {
        (m, KeyCode::Char('c')) if m.contains(KeyModifiers::CONTROL) => Some(CTRL_C),
        (_, KeyCode::Char(c)) => Some(c),
        (_, KeyCode::Enter) => Some('\n'),
        (_, KeyCode::Tab) => Some('\t'),
        (_, KeyCode::Esc) => Some(ESCAPE),
        _ => None,
    }
}

// ============================================================================
// Termios (unix)
// ============================================================================

#[cfg(unix)]
pub use termios::TermiosBackend;

#[cfg(unix)]
mod termios {
    use std::io;
    use std::sync::Mutex;

    use libc::c_int;
    use log::info;

    use super::{TerminalBackend, TerminalError};

    pub struct TermiosBackend {
        fd: c_int,
        saved: Mutex<Option<libc::termios>>,
    }

    impl TermiosBackend {
        pub fn stdin() -> Self {
            Self {
                fd: libc::STDIN_FILENO,
                saved: Mutex::new(None),
            }
        }

        fn saved(&self) -> std::sync::MutexGuard<'_, Option<libc::termios>> {
            self.saved.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    impl TerminalBackend for TermiosBackend {
        fn name(&self) -> &'static str {
            "termios"
        }

        fn enable_raw_mode(&self) -> Result<(), TerminalError> {
            let mut saved = self.saved();
            if saved.is_some() {
                return Ok(());
            }
            if unsafe { libc::isatty(self.fd) } != 1 {
                return Err(TerminalError::NotATerminal);
            }
            let mut attrs: libc::termios = unsafe { std::mem::zeroed() };
            if unsafe { libc::tcgetattr(self.fd, &mut attrs) } != 0 {
                return Err(io::Error::last_os_error().into());
            }
            let original = attrs;
            attrs.c_lflag &= !(libc::ICANON | libc::ECHO);
            if unsafe { libc::tcsetattr(self.fd, libc::TCSAFLUSH, &attrs) } != 0 {
                return Err(io::Error::last_os_error().into());
            }
            *saved = Some(original);
            info!("Raw mode enabled (termios, fd {})", self.fd);
            Ok(())
        }

        fn disable_raw_mode(&self) -> Result<(), TerminalError> {
            let Some(original) = self.saved().take() else {
                return Ok(());
            };
            if unsafe { libc::tcsetattr(self.fd, libc::TCSAFLUSH, &original) } != 0 {
                return Err(io::Error::last_os_error().into());
            }
            Ok(())
        }

        /// Reads a single byte per call and maps it with `char::from(u8)`.
        /// ASCII keys come through unchanged; a multi-byte UTF-8 key arrives
        /// as several Latin-1 chars, which the driver ignores.
        fn poll_key(&self) -> io::Result<Option<char>> {
            let mut fds = libc::pollfd {
                fd: self.fd,
                events: libc::POLLIN,
                revents: 0,
            };
            let ready = unsafe { libc::poll(&mut fds, 1, 0) };
            if ready < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(None);
                }
                return Err(err);
            }
            if ready == 0 || (fds.revents & libc::POLLIN) == 0 {
                return Ok(None);
            }
            let mut byte = 0u8;
            let n = unsafe { libc::read(self.fd, (&mut byte as *mut u8).cast::<libc::c_void>(), 1) };
            match n {
                n if n < 0 => Err(io::Error::last_os_error()),
                0 => Ok(None),
                _ => Ok(Some(char::from(byte))),
            }
        }
    }
}
