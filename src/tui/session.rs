//! # Watch Session
//!
//! Owns the terminal for the lifetime of watch mode.
//!
//! ```text
//! open()  ──▶ hide cursor ──▶ raw mode ──▶ spawn poller
//!                 │               │             │
//!                 └─── any step fails: undo what succeeded,
//!                      continue as plain line output
//!
//! restore() / drop ──▶ stop poller ──▶ prior attributes ──▶ show cursor
//! ```
//!
//! `restore()` runs at most once per acquired resource, so calling it again
//! (or dropping the session after an explicit restore) changes nothing.
//! Dropping the session restores on every exit path that unwinds.

use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use crossterm::QueueableCommand;
use crossterm::cursor::{Hide, Show};
use log::{debug, info, warn};

use crate::tui::backend::{NullBackend, TerminalBackend, TerminalError};
use crate::tui::poller::{KeyboardPoller, POLL_INTERVAL};
use crate::tui::stream::{self, OutputStream};
use crate::tui::style::{Status, StyleTable};

pub struct WatchSession<W: OutputStream> {
    out: W,
    interactive: bool,
    backend: Arc<dyn TerminalBackend>,
    styles: StyleTable,
    keys: Receiver<char>,
    raw_mode: bool,
    cursor_hidden: bool,
    poller: Option<KeyboardPoller>,
}

impl<W: OutputStream> WatchSession<W> {
    /// Take over the terminal behind `out`.
    ///
    /// Never fails: a non-interactive stream, or a terminal that refuses
    /// raw mode, gives a session that writes plain lines and never
    /// receives keys.
    pub fn open(out: W, backend: Arc<dyn TerminalBackend>) -> Self {
        let (key_tx, keys) = mpsc::channel();
        let mut session = Self {
            out,
            interactive: false,
            backend: Arc::new(NullBackend),
            styles: StyleTable::default(),
            keys,
            raw_mode: false,
            cursor_hidden: false,
            poller: None,
        };
        if !stream::is_interactive(&session.out) {
            info!("Output is not a terminal, writing plain lines");
            return session;
        }

        session.backend = backend;
        session.interactive = true;
        if let Err(e) = session.acquire(key_tx) {
            warn!(
                "Terminal control unavailable ({}), falling back to plain output",
                e
            );
            session.release();
            session.interactive = false;
            session.backend = Arc::new(NullBackend);
        }
        session
    }

    fn acquire(&mut self, key_tx: Sender<char>) -> Result<(), TerminalError> {
        self.out.queue(Hide)?;
        self.out.flush()?;
        self.cursor_hidden = true;

        self.backend.enable_raw_mode()?;
        self.raw_mode = true;

        let poller = KeyboardPoller::spawn(Arc::clone(&self.backend), key_tx, POLL_INTERVAL)?;
        self.poller = Some(poller);
        info!("Watch session opened ({} backend)", self.backend.name());
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
        if self.raw_mode {
            self.raw_mode = false;
            if let Err(e) = self.backend.disable_raw_mode() {
                warn!("Failed to restore terminal attributes: {}", e);
            }
        }
        if self.cursor_hidden {
            self.cursor_hidden = false;
            if let Err(e) = self.out.queue(Show).and_then(|out| out.flush()) {
                warn!("Failed to show cursor: {}", e);
            }
        }
    }

    /// Stop the poller, restore the prior terminal attributes and show the
    /// cursor. Safe to call any number of times.
    pub fn restore(&mut self) {
        if self.poller.is_some() || self.raw_mode || self.cursor_hidden {
            debug!("Restoring terminal");
        }
        self.release();
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn is_raw(&self) -> bool {
        self.raw_mode
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(KeyboardPoller::is_running)
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Next queued key press, if any.
    pub fn next_key(&self) -> Option<char> {
        self.keys.try_recv().ok()
    }

    /// All queued key presses in arrival order.
    pub fn drain_keys(&self) -> Vec<char> {
        self.keys.try_iter().collect()
    }

    /// Clears the visible screen. No-op when not interactive.
    pub fn clear(&mut self) -> io::Result<()> {
        if !self.interactive {
            return Ok(());
        }
        self.backend.clear(&mut self.out)
    }

    /// Writes `text` prefixed by `indent` spaces and a line ending.
    pub fn write_line(&mut self, text: &str, indent: usize) -> io::Result<()> {
        let ending = if self.raw_mode {
            self.backend.line_ending()
        } else {
            "\n"
        };
        write!(self.out, "{:indent$}{text}{ending}", "")
    }

    pub fn write_blank(&mut self) -> io::Result<()> {
        self.write_line("", 0)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub(crate) fn write_raw(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())
    }

    /// Colors `text` for `status` when interactive; plain text otherwise.
    pub(crate) fn paint<'a>(&self, status: Status, text: &'a str) -> Cow<'a, str> {
        if self.interactive {
            Cow::Owned(self.styles.paint(status, text))
        } else {
            Cow::Borrowed(text)
        }
    }
}

impl<W: OutputStream> Drop for WatchSession<W> {
    fn drop(&mut self) {
        self.restore();
    }
}
