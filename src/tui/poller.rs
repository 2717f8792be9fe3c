//! Background keyboard poller.
//!
//! One thread per interactive session. Each iteration checks the backend
//! for a waiting key without blocking, forwards it to the session's key
//! queue and then sleeps for the poll interval. The sleep doubles as the
//! cancellation point: dropping the stop sender wakes the thread and ends
//! the loop, so [`KeyboardPoller::stop`] returns only after the thread is
//! gone.

use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

use crate::tui::backend::TerminalBackend;

pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct KeyboardPoller {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl KeyboardPoller {
    pub fn spawn(
        backend: Arc<dyn TerminalBackend>,
        keys: Sender<char>,
        interval: Duration,
    ) -> io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("tddwatch-keyboard".to_string())
            .spawn(move || poll_loop(backend.as_ref(), &keys, &stop_rx, interval))?;
        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the thread and wait for it. Idempotent.
    pub fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Keyboard poller panicked");
        }
    }
}

impl Drop for KeyboardPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_loop(
    backend: &dyn TerminalBackend,
    keys: &Sender<char>,
    stop: &Receiver<()>,
    interval: Duration,
) {
    debug!("Keyboard poller started ({})", backend.name());
    loop {
        match backend.poll_key() {
            Ok(Some(key)) => {
                if keys.send(key).is_err() {
                    debug!("Key queue closed");
                    break;
                }
            }
            Ok(None) => {}
            // Losing a key is recoverable, losing the poller is not.
            Err(e) => warn!("Keyboard read failed: {}", e),
        }
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Keyboard poller stopped");
}
