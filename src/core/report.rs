//! # Run Reports
//!
//! One structured document per executed test suite, produced by the
//! test-execution engine:
//!
//! ```text
//! {
//!   "test_suite":  "SuiteName",
//!   "tests_count": 5,
//!   "fails_count": 1,
//!   "fails":       ["t2"],
//!   "test_logs":   { "t1": [], "t2": ["boom"] }   // optional
//! }
//! ```
//!
//! Reports are parsed once per render pass and never mutated afterwards.
//! `AnalysisResult` and the failed-module map come from the file watcher
//! and are consumed the same way.

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Module name → raw error text, for modules whose run failed outright.
pub type FailedModules = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunReport {
    #[serde(rename = "test_suite")]
    pub suite: String,
    pub tests_count: u64,
    pub fails_count: u64,
    pub fails: BTreeSet<String>,
    /// Absent in older report shapes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_logs: Option<IndexMap<String, Vec<String>>>,
}

impl RunReport {
    fn parse(index: usize, doc: &str) -> Result<Self, ReportError> {
        let report: RunReport =
            serde_json::from_str(doc).map_err(|source| ReportError::Json { index, source })?;
        if report.fails_count > report.tests_count {
            return Err(ReportError::Inconsistent {
                index,
                suite: report.suite,
                tests: report.tests_count,
                fails: report.fails_count,
            });
        }
        Ok(report)
    }

    pub fn is_failed(&self, test: &str) -> bool {
        self.fails.contains(test)
    }

    /// Per-test logs, or `None` when the field is absent or empty.
    pub fn logged_tests(&self) -> Option<&IndexMap<String, Vec<String>>> {
        self.test_logs.as_ref().filter(|logs| !logs.is_empty())
    }
}

/// Parses every report document, failing on the first malformed one.
pub fn parse_reports<S: AsRef<str>>(docs: &[S]) -> Result<Vec<RunReport>, ReportError> {
    let reports = docs
        .iter()
        .enumerate()
        .map(|(index, doc)| RunReport::parse(index, doc.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    debug!("Parsed {} run reports", reports.len());
    Ok(reports)
}

/// Aggregate counts across all reports of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub tests: u64,
    pub fails: u64,
}

impl Totals {
    pub fn of(reports: &[RunReport]) -> Self {
        reports.iter().fold(Self::default(), |acc, r| Self {
            tests: acc.tests.saturating_add(r.tests_count),
            fails: acc.fails.saturating_add(r.fails_count),
        })
    }

    /// A run is failing if any test failed or the caller says so
    /// (e.g. a module could not be executed at all).
    pub fn is_failing(&self, failed_override: bool) -> bool {
        self.fails > 0 || failed_override
    }
}

/// What changed in one watch cycle and which tests it triggered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub changed_tests: BTreeSet<String>,
    /// Production module → test modules it triggers.
    #[serde(default)]
    pub triggered: BTreeMap<String, BTreeSet<String>>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ReportError {
    Json {
        index: usize,
        source: serde_json::Error,
    },
    Inconsistent {
        index: usize,
        suite: String,
        tests: u64,
        fails: u64,
    },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Json { index, source } => {
                write!(f, "malformed run report #{index}: {source}")
            }
            ReportError::Inconsistent {
                index,
                suite,
                tests,
                fails,
            } => write!(
                f,
                "inconsistent run report #{index} ({suite}): {fails} failures out of {tests} tests"
            ),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Json { source, .. } => Some(source),
            ReportError::Inconsistent { .. } => None,
        }
    }
}
