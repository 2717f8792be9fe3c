//! Pass/fail style table.
//!
//! Rendering code asks the table to paint text for a [`Status`] and never
//! spells out escape sequences itself. Only the painted text is wrapped;
//! indentation stays outside the codes.

use std::fmt::Write as _;

use crossterm::Command;
use crossterm::style::{Color, SetBackgroundColor, SetForegroundColor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
}

impl Status {
    pub fn from_failing(failing: bool) -> Self {
        if failing { Status::Fail } else { Status::Pass }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
}

impl Style {
    /// Wraps `text` in this style and resets both colors to the terminal
    /// defaults afterwards.
    pub fn apply(&self, text: &str) -> String {
        let mut painted = String::with_capacity(text.len() + 32);
        // fmt::Write into a String cannot fail
        match basic_code(self.bg) {
            Some(code) => {
                let _ = write!(painted, "\x1b[{}m", code + 10);
            }
            None => {
                let _ = SetBackgroundColor(self.bg).write_ansi(&mut painted);
            }
        }
        match basic_code(self.fg) {
            Some(code) => {
                let _ = write!(painted, "\x1b[{code}m");
            }
            None => {
                let _ = SetForegroundColor(self.fg).write_ansi(&mut painted);
            }
        }
        painted.push_str(text);
        let _ = SetForegroundColor(Color::Reset).write_ansi(&mut painted);
        let _ = SetBackgroundColor(Color::Reset).write_ansi(&mut painted);
        painted
    }
}

/// Foreground SGR code for the 16-color palette. crossterm writes these
/// colors in the 256-color form, which older terminals misrender.
fn basic_code(color: Color) -> Option<u8> {
    let code = match color {
        Color::Black => 30,
        Color::DarkRed => 31,
        Color::DarkGreen => 32,
        Color::DarkYellow => 33,
        Color::DarkBlue => 34,
        Color::DarkMagenta => 35,
        Color::DarkCyan => 36,
        Color::Grey => 37,
        Color::DarkGrey => 90,
        Color::Red => 91,
        Color::Green => 92,
        Color::Yellow => 93,
        Color::Blue => 94,
        Color::Magenta => 95,
        Color::Cyan => 96,
        Color::White => 97,
        _ => return None,
    };
    Some(code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleTable {
    pass: Style,
    fail: Style,
}

impl Default for StyleTable {
    /// Black on green for passing runs, white on red for failing ones.
    fn default() -> Self {
        Self {
            pass: Style {
                fg: Color::Black,
                bg: Color::DarkGreen,
            },
            fail: Style {
                fg: Color::Grey,
                bg: Color::DarkRed,
            },
        }
    }
}

impl StyleTable {
    pub fn style(&self, status: Status) -> Style {
        match status {
            Status::Pass => self.pass,
            Status::Fail => self.fail,
        }
    }

    pub fn paint(&self, status: Status, text: &str) -> String {
        self.style(status).apply(text)
    }
}
