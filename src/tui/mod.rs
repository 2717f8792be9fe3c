//! # Terminal Adapter
//!
//! Everything that touches the terminal lives here: the interactivity
//! probe, raw-mode backends, the background keyboard poller, the watch
//! session that owns them, and the report renderer.
//!
//! ## Threads
//!
//! The caller's thread renders and owns the session. The session owns one
//! keyboard poller thread while interactive. The only thing the two share
//! is the key queue (an `mpsc` channel); the driver drains it between
//! render passes.

mod backend;
mod poller;
mod render;
mod session;
mod stream;
mod style;

pub use backend::{
    CTRL_C, CrosstermBackend, ESCAPE, NullBackend, TerminalBackend, TerminalError, build_backend,
};
#[cfg(unix)]
pub use backend::TermiosBackend;
pub use poller::{KeyboardPoller, POLL_INTERVAL};
pub use render::{BUTTONS, RenderError, summary_line};
pub use session::WatchSession;
pub use stream::{OutputStream, is_interactive};
pub use style::{Status, Style, StyleTable};

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::BackendKind;
use crate::core::config::WatchConfig;
use crate::core::report::{AnalysisResult, FailedModules};

/// What the driver renders each cycle. The documents themselves come from
/// the test-execution engine; the driver only reads them.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub reports: Vec<PathBuf>,
    pub analysis: Option<PathBuf>,
    pub failed: Option<PathBuf>,
    /// Also print the config and the change analysis.
    pub dbg: bool,
    /// Render once and exit instead of waiting for keys.
    pub once: bool,
    pub backend: BackendKind,
}

pub fn run(config: WatchConfig, options: RunOptions) -> io::Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    register_shutdown_signals(&shutdown);

    let mut session = WatchSession::open(io::stdout(), build_backend(options.backend));
    render_cycle(&mut session, &config, &options)?;
    if options.once {
        session.restore();
        return Ok(());
    }
    session.print_buttons()?;

    watch_loop(&mut session, &config, &options, &shutdown, config.pause())?;

    session.restore();
    info!("Watch session finished");
    writeln!(io::stdout(), "\ntddwatch: gracefully stopped\n")
}

/// Reacts to queued keys until `q`, Ctrl+C or a shutdown signal.
fn watch_loop<W: OutputStream>(
    session: &mut WatchSession<W>,
    config: &WatchConfig,
    options: &RunOptions,
    shutdown: &AtomicBool,
    pause: Duration,
) -> io::Result<()> {
    while !shutdown.load(Ordering::Relaxed) {
        for key in session.drain_keys() {
            match key {
                'q' | CTRL_C => {
                    debug!("Quit requested");
                    return Ok(());
                }
                'r' => {
                    render_cycle(session, config, options)?;
                    session.print_buttons()?;
                }
                'a' => {
                    session.print_about()?;
                    session.print_buttons()?;
                }
                other => debug!("Ignoring key {:?}", other),
            }
        }
        thread::sleep(pause);
    }
    info!("Shutdown signal received");
    Ok(())
}

/// One render pass: summary, then the optional debug sections, failed
/// modules and per-suite details. A malformed report aborts the pass
/// with a single error line.
fn render_cycle<W: OutputStream>(
    session: &mut WatchSession<W>,
    config: &WatchConfig,
    options: &RunOptions,
) -> io::Result<()> {
    let start = Instant::now();
    let (docs, mut failed) = read_reports(&options.reports);
    if let Some(path) = &options.failed {
        match read_json::<FailedModules>(path) {
            Ok(more) => failed.extend(more),
            Err(e) => {
                failed.insert(path.display().to_string(), e);
            }
        }
    }
    let elapsed = start.elapsed();

    let reports = match session.print_summary(&docs, elapsed, !failed.is_empty()) {
        Ok(reports) => reports,
        Err(RenderError::Report(e)) => {
            warn!("Render pass aborted: {}", e);
            return session.print_error(&e);
        }
        Err(RenderError::Io(e)) => return Err(e),
    };

    if options.dbg {
        session.print_config(config)?;
        if let Some(path) = &options.analysis {
            match read_json::<AnalysisResult>(path) {
                Ok(analysis) => session.print_analysis(&analysis)?,
                Err(e) => session.print_error(&e)?,
            }
        }
    }
    if !failed.is_empty() {
        session.print_failed_modules(&failed)?;
    }
    session.print_suites(&reports)
}

/// Reads every report document. Unreadable files become failed modules.
fn read_reports(paths: &[PathBuf]) -> (Vec<String>, FailedModules) {
    let mut docs = Vec::with_capacity(paths.len());
    let mut failed = FailedModules::new();
    for path in paths {
        match fs::read_to_string(path) {
            Ok(doc) => docs.push(doc),
            Err(e) => {
                warn!("Failed to read report {}: {}", path.display(), e);
                failed.insert(path.display().to_string(), e.to_string());
            }
        }
    }
    (docs, failed)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let contents = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    serde_json::from_str(&contents).map_err(|e| format!("{}: {e}", path.display()))
}

#[cfg(unix)]
fn register_shutdown_signals(flag: &Arc<AtomicBool>) {
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, Arc::clone(flag)) {
            warn!("Failed to register handler for signal {}: {}", signal, e);
        }
    }
}

#[cfg(not(unix))]
fn register_shutdown_signals(_flag: &Arc<AtomicBool>) {}
