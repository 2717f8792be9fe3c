//! tddwatch library exports for testing

use clap::ValueEnum;

pub mod core;
pub mod tui;

#[cfg(test)]
pub mod test_support;

/// Which terminal backend drives raw mode and key polling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    #[default]
    Crossterm,
    /// Unix only; falls back to crossterm elsewhere.
    Termios,
}
