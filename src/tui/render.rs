//! Report rendering.
//!
//! Line-oriented writes onto the session's stream. Layout of one full
//! watch cycle:
//!
//! ```text
//! tddwatch: ran 5 tests of which 1 failed in 1.2s      <- colored
//! analysis frequency: 0.3s, test-run timeout: 20s      <- print_config
//! ...
//! Analysis:                                            <- print_analysis
//!   modified test-modules:
//!     tests/test_a.py
//!
//!     run failed: pkg.broken                           <- print_failed_modules
//!     ImportError: ...
//!     A (5/1)                                          <- print_suites
//!       t1
//!       t2                                             <- colored
//!         boom
//! ```

use std::fmt;
use std::io;
use std::time::Duration;

use log::debug;

use crate::core::config::WatchConfig;
use crate::core::report::{
    AnalysisResult, FailedModules, ReportError, RunReport, Totals, parse_reports,
};
use crate::tui::session::WatchSession;
use crate::tui::stream::OutputStream;
use crate::tui::style::Status;

const SUITE_INDENT: usize = 4;
const TEST_INDENT: usize = 6;
const LOG_INDENT: usize = 8;
const LOG_CONTINUATION_INDENT: usize = 10;

pub const BUTTONS: &str = "[r]un all test modules   [a]bout   [q]uit";

const ABOUT: &str = concat!(
    "tddwatch ",
    env!("CARGO_PKG_VERSION"),
    "\n\n",
    "Renders live test-run results while you work: a summary bar that\n",
    "is green when every test passed and red otherwise, followed by the\n",
    "failing and logging tests of each suite.\n",
    "\n",
    "Keys:\n",
    "    r   run all test modules again\n",
    "    a   show this text\n",
    "    q   quit and restore the terminal\n",
);

#[derive(Debug)]
pub enum RenderError {
    Report(ReportError),
    Io(io::Error),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Report(e) => write!(f, "{e}"),
            RenderError::Io(e) => write!(f, "render output failed: {e}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Report(e) => Some(e),
            RenderError::Io(e) => Some(e),
        }
    }
}

impl From<ReportError> for RenderError {
    fn from(e: ReportError) -> Self {
        RenderError::Report(e)
    }
}

impl From<io::Error> for RenderError {
    fn from(e: io::Error) -> Self {
        RenderError::Io(e)
    }
}

/// The plain summary text, before coloring.
pub fn summary_line(totals: Totals, elapsed: Duration) -> String {
    let seconds = (elapsed.as_secs_f64() * 1000.0).round() / 1000.0;
    format!(
        "tddwatch: ran {} tests of which {} failed in {}s",
        totals.tests, totals.fails, seconds
    )
}

impl<W: OutputStream> WatchSession<W> {
    /// Clears the screen, parses `docs` and writes the colored summary
    /// line. Returns the parsed reports for [`print_suites`].
    ///
    /// The line is fail-colored if any test failed or `failed` is set.
    ///
    /// [`print_suites`]: WatchSession::print_suites
    pub fn print_summary<S: AsRef<str>>(
        &mut self,
        docs: &[S],
        elapsed: Duration,
        failed: bool,
    ) -> Result<Vec<RunReport>, RenderError> {
        self.clear()?;
        let reports = parse_reports(docs)?;
        let totals = Totals::of(&reports);
        debug!(
            "Summary: {} tests, {} failed, override={}",
            totals.tests, totals.fails, failed
        );
        let line = summary_line(totals, elapsed);
        let status = Status::from_failing(totals.is_failing(failed));
        let painted = self.paint(status, &line).into_owned();
        self.write_line(&painted, 0)?;
        Ok(reports)
    }

    pub fn print_config(&mut self, config: &WatchConfig) -> io::Result<()> {
        self.write_line(
            &format!(
                "analysis frequency: {}s, test-run timeout: {}s",
                config.frequency, config.timeout
            ),
            0,
        )?;
        self.write_line("ignored packages:", 0)?;
        for name in &config.ignore_packages {
            self.write_line(name, 4)?;
        }
        self.write_line("ignored modules:", 0)?;
        for name in &config.ignore_modules {
            self.write_line(name, 4)?;
        }
        if !config.mappings.is_empty() {
            self.write_line("production-test mappings:", 0)?;
            for (production, test) in &config.mappings {
                self.write_line(
                    &format!("{} -> {}", production.display(), test.display()),
                    4,
                )?;
            }
        }
        self.write_blank()
    }

    /// Changed test modules, then each production module with the tests it
    /// triggered. Production modules that triggered nothing are left out.
    pub fn print_analysis(&mut self, analysis: &AnalysisResult) -> io::Result<()> {
        self.write_line("Analysis:", 0)?;
        self.write_line("modified test-modules:", 2)?;
        for test in &analysis.changed_tests {
            self.write_line(test, 4)?;
        }
        let mut triggered = analysis
            .triggered
            .iter()
            .filter(|(_, tests)| !tests.is_empty())
            .peekable();
        if triggered.peek().is_none() {
            return Ok(());
        }
        self.write_line("modified production-modules:", 2)?;
        for (module, tests) in triggered {
            self.write_line(&format!("{module} triggered:"), 4)?;
            for test in tests {
                self.write_line(test, 6)?;
            }
        }
        Ok(())
    }

    pub fn print_failed_modules(&mut self, failed: &FailedModules) -> io::Result<()> {
        for (module, error) in failed {
            self.write_blank()?;
            let header = format!("run failed: {module}");
            let painted = self.paint(Status::Fail, &header).into_owned();
            self.write_line(&painted, SUITE_INDENT)?;
            for line in error.lines() {
                self.write_line(line, SUITE_INDENT)?;
            }
        }
        Ok(())
    }

    /// Per-suite breakdown. Suites without test logs are skipped entirely.
    pub fn print_suites(&mut self, reports: &[RunReport]) -> io::Result<()> {
        for report in reports {
            let Some(logs) = report.logged_tests() else {
                continue;
            };
            self.write_line(
                &format!(
                    "{} ({}/{})",
                    report.suite, report.tests_count, report.fails_count
                ),
                SUITE_INDENT,
            )?;
            for (test, entries) in logs {
                let name = if report.is_failed(test) {
                    self.paint(Status::Fail, test).into_owned()
                } else {
                    test.clone()
                };
                self.write_line(&name, TEST_INDENT)?;
                for entry in entries {
                    let mut lines = entry.split('\n');
                    if let Some(first) = lines.next() {
                        self.write_line(first, LOG_INDENT)?;
                    }
                    for rest in lines {
                        self.write_line(rest, LOG_CONTINUATION_INDENT)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// One fail-colored line describing why a render pass was aborted.
    pub fn print_error(&mut self, err: &dyn fmt::Display) -> io::Result<()> {
        let line = format!("tddwatch: {err}");
        let painted = self.paint(Status::Fail, &line).into_owned();
        self.write_line(&painted, 0)
    }

    pub fn print_about(&mut self) -> io::Result<()> {
        self.clear()?;
        for line in ABOUT.lines() {
            self.write_line(line, 0)?;
        }
        Ok(())
    }

    pub fn print_buttons(&mut self) -> io::Result<()> {
        self.write_blank()?;
        self.write_raw(BUTTONS)?;
        self.flush()
    }
}
