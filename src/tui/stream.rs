//! Output sinks and the interactivity probe.
//!
//! Raw mode, cursor control, screen clearing and colors are all gated on
//! [`is_interactive`]. A redirected stream gets plain lines only.

use std::fs::File;
use std::io::{IsTerminal, Stderr, Stdout, Write};

/// A writable text sink the watch session renders into.
pub trait OutputStream: Write + Send {
    /// Whether the sink is connected to a terminal device.
    fn is_interactive(&self) -> bool;
}

impl OutputStream for Stdout {
    fn is_interactive(&self) -> bool {
        self.is_terminal()
    }
}

impl OutputStream for Stderr {
    fn is_interactive(&self) -> bool {
        self.is_terminal()
    }
}

impl OutputStream for File {
    fn is_interactive(&self) -> bool {
        self.is_terminal()
    }
}

impl OutputStream for Vec<u8> {
    fn is_interactive(&self) -> bool {
        false
    }
}

impl<S: OutputStream + ?Sized> OutputStream for Box<S> {
    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }
}

/// No side effects.
pub fn is_interactive<S: OutputStream + ?Sized>(stream: &S) -> bool {
    stream.is_interactive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TtySink;

    #[test]
    fn test_memory_buffer_is_not_interactive() {
        assert!(!is_interactive(&Vec::<u8>::new()));
    }

    #[test]
    fn test_regular_file_is_not_interactive() {
        let file = tempfile::tempfile().unwrap();
        assert!(!is_interactive(&file));
    }

    #[test]
    fn test_boxed_stream_delegates() {
        let boxed: Box<dyn OutputStream> = Box::new(TtySink::default());
        assert!(is_interactive(&boxed));
        let boxed: Box<dyn OutputStream> = Box::new(Vec::new());
        assert!(!is_interactive(&boxed));
    }
}
