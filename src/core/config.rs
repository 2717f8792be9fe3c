//! # Configuration
//!
//! Centralizes all watch settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! The config file is looked up as `./tddwatch.toml` first, then
//! `<config dir>/tddwatch/config.toml`. A missing file is fine; a
//! malformed one is an error.

use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Config Structs (all fields optional for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct WatchFileConfig {
    pub frequency: Option<f64>,
    pub timeout: Option<f64>,
    #[serde(default)]
    pub ignore_packages: Vec<String>,
    #[serde(default)]
    pub ignore_modules: Vec<String>,
    #[serde(default)]
    pub mappings: IndexMap<PathBuf, PathBuf>,
}

/// Values given on the command line. `None`/empty means "not specified".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub frequency: Option<f64>,
    pub timeout: Option<f64>,
    pub ignore_packages: Vec<String>,
    pub ignore_modules: Vec<String>,
    /// Raw `production->test` pairs.
    pub mappings: Vec<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_FREQUENCY: f64 = 0.3;
pub const DEFAULT_TIMEOUT: f64 = 20.0;
pub const CONFIG_FILE_NAME: &str = "tddwatch.toml";
pub const MAPPING_SEPARATOR: &str = "->";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

/// Immutable per-session settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    /// Seconds between two change analyses.
    pub frequency: f64,
    /// Seconds a test module may run before a timeout is reported.
    pub timeout: f64,
    /// Production module → test module it should trigger.
    pub mappings: IndexMap<PathBuf, PathBuf>,
    pub ignore_packages: Vec<String>,
    pub ignore_modules: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY,
            timeout: DEFAULT_TIMEOUT,
            mappings: IndexMap::new(),
            ignore_packages: Vec::new(),
            ignore_modules: Vec::new(),
        }
    }
}

impl WatchConfig {
    /// Pause between two analyses. Values `resolve` rejects fall back to
    /// the default frequency.
    pub fn pause(&self) -> Duration {
        Duration::try_from_secs_f64(self.frequency)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_FREQUENCY))
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(toml::de::Error),
    InvalidMapping(String),
    InvalidValue { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "config I/O error ({}): {e}", path.display()),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::InvalidMapping(raw) => write!(
                f,
                "invalid mapping '{raw}': expected 'production{MAPPING_SEPARATOR}test'"
            ),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid {field}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Candidate config locations, most specific first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("tddwatch").join("config.toml"));
    }
    paths
}

/// Load the config file.
///
/// An `explicit` path must exist. Otherwise the first existing file out
/// of [`config_paths`] is used, and `WatchFileConfig::default()` if there
/// is none.
pub fn load_config(explicit: Option<&Path>) -> Result<WatchFileConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_from(path);
    }
    match config_paths().into_iter().find(|p| p.exists()) {
        Some(path) => load_from(&path),
        None => {
            info!("No config file found, using defaults");
            Ok(WatchFileConfig::default())
        }
    }
}

fn load_from(path: &Path) -> Result<WatchFileConfig, ConfigError> {
    let contents =
        fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    let config: WatchFileConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// Ignore lists and mappings accumulate; a CLI mapping for an already
/// mapped production module replaces the file's target.
pub fn resolve(config: &WatchFileConfig, cli: &CliOverrides) -> Result<WatchConfig, ConfigError> {
    // Frequency: CLI → env → config → default
    let frequency = match cli.frequency {
        Some(v) => v,
        None => env_seconds("TDDWATCH_FREQUENCY")?
            .or(config.frequency)
            .unwrap_or(DEFAULT_FREQUENCY),
    };
    let timeout = match cli.timeout {
        Some(v) => v,
        None => env_seconds("TDDWATCH_TIMEOUT")?
            .or(config.timeout)
            .unwrap_or(DEFAULT_TIMEOUT),
    };
    check_seconds("frequency", frequency)?;
    check_seconds("timeout", timeout)?;

    let mut mappings = config.mappings.clone();
    for raw in &cli.mappings {
        let (production, test) = parse_mapping(raw)?;
        mappings.insert(production, test);
    }

    Ok(WatchConfig {
        frequency,
        timeout,
        mappings,
        ignore_packages: merge_names(&config.ignore_packages, &cli.ignore_packages),
        ignore_modules: merge_names(&config.ignore_modules, &cli.ignore_modules),
    })
}

/// Parses `production->test` into its two paths.
pub fn parse_mapping(raw: &str) -> Result<(PathBuf, PathBuf), ConfigError> {
    let invalid = || ConfigError::InvalidMapping(raw.to_string());
    let (production, test) = raw.split_once(MAPPING_SEPARATOR).ok_or_else(invalid)?;
    let (production, test) = (production.trim(), test.trim());
    if production.is_empty() || test.is_empty() || test.contains(MAPPING_SEPARATOR) {
        return Err(invalid());
    }
    Ok((PathBuf::from(production), PathBuf::from(test)))
}

fn env_seconds(var: &'static str) -> Result<Option<f64>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                field: var,
                reason: format!("'{raw}': {e}"),
            }),
        Err(_) => Ok(None),
    }
}

/// Seconds must be positive and fit a [`Duration`].
fn check_seconds(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("{value} is not a positive number of seconds"),
        });
    }
    Duration::try_from_secs_f64(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue {
            field,
            reason: format!("{value} seconds: {e}"),
        })
}

fn merge_names(base: &[String], extra: &[String]) -> Vec<String> {
    let mut merged = base.to_vec();
    for name in extra {
        if !merged.contains(name) {
            merged.push(name.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard};

    /// Held by every test that resolves, since resolution reads env vars.
    static ENV: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let _env = env_lock();
        let resolved = resolve(&WatchFileConfig::default(), &CliOverrides::default()).unwrap();
        assert_eq!(resolved, WatchConfig::default());
        assert_eq!(resolved.frequency, DEFAULT_FREQUENCY);
        assert_eq!(resolved.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_resolve_config_values_override_defaults() {
        let _env = env_lock();
        let config = WatchFileConfig {
            frequency: Some(1.5),
            timeout: Some(60.0),
            ignore_packages: vec!["venv".to_string()],
            ..Default::default()
        };
        let resolved = resolve(&config, &CliOverrides::default()).unwrap();
        assert_eq!(resolved.frequency, 1.5);
        assert_eq!(resolved.timeout, 60.0);
        assert_eq!(resolved.ignore_packages, vec!["venv"]);
    }

    #[test]
    fn test_resolve_cli_wins() {
        let _env = env_lock();
        let config = WatchFileConfig {
            frequency: Some(1.5),
            ..Default::default()
        };
        let cli = CliOverrides {
            frequency: Some(0.1),
            ..Default::default()
        };
        let resolved = resolve(&config, &cli).unwrap();
        assert_eq!(resolved.frequency, 0.1);
    }

    #[test]
    fn test_ignore_lists_accumulate_without_duplicates() {
        let _env = env_lock();
        let config = WatchFileConfig {
            ignore_modules: vec!["conftest.py".to_string()],
            ..Default::default()
        };
        let cli = CliOverrides {
            ignore_modules: vec!["conftest.py".to_string(), "setup.py".to_string()],
            ..Default::default()
        };
        let resolved = resolve(&config, &cli).unwrap();
        assert_eq!(resolved.ignore_modules, vec!["conftest.py", "setup.py"]);
    }

    #[test]
    fn test_cli_mapping_replaces_file_mapping() {
        let _env = env_lock();
        let mut mappings = IndexMap::new();
        mappings.insert(PathBuf::from("pkg/a.py"), PathBuf::from("tests/old.py"));
        mappings.insert(PathBuf::from("pkg/b.py"), PathBuf::from("tests/b.py"));
        let config = WatchFileConfig {
            mappings,
            ..Default::default()
        };
        let cli = CliOverrides {
            mappings: vec!["pkg/a.py -> tests/new.py".to_string()],
            ..Default::default()
        };
        let resolved = resolve(&config, &cli).unwrap();
        assert_eq!(resolved.mappings.len(), 2);
        assert_eq!(
            resolved.mappings[&PathBuf::from("pkg/a.py")],
            PathBuf::from("tests/new.py")
        );
    }

    #[test]
    fn test_parse_mapping() {
        let (p, t) = parse_mapping("production/module.py->tests/test_module.py").unwrap();
        assert_eq!(p, PathBuf::from("production/module.py"));
        assert_eq!(t, PathBuf::from("tests/test_module.py"));

        for bad in ["no-separator", "->test.py", "prod.py->", "a->b->c", " -> "] {
            assert!(
                matches!(parse_mapping(bad), Err(ConfigError::InvalidMapping(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_non_positive_seconds_rejected() {
        let _env = env_lock();
        let cli = CliOverrides {
            timeout: Some(0.0),
            ..Default::default()
        };
        let err = resolve(&WatchFileConfig::default(), &cli).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "timeout", .. }));

        let cli = CliOverrides {
            frequency: Some(f64::NAN),
            ..Default::default()
        };
        assert!(resolve(&WatchFileConfig::default(), &cli).is_err());
    }

    #[test]
    fn test_seconds_beyond_duration_range_rejected() {
        let _env = env_lock();
        let cli = CliOverrides {
            frequency: Some(1e20),
            ..Default::default()
        };
        let err = resolve(&WatchFileConfig::default(), &cli).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "frequency", .. }));

        let config = WatchFileConfig {
            timeout: Some(1e20),
            ..Default::default()
        };
        let err = resolve(&config, &CliOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "timeout", .. }));
    }

    #[test]
    fn test_pause_matches_frequency() {
        let config = WatchConfig {
            frequency: 1.5,
            ..Default::default()
        };
        assert_eq!(config.pause(), Duration::from_millis(1500));

        let out_of_range = WatchConfig {
            frequency: 1e20,
            ..Default::default()
        };
        assert_eq!(out_of_range.pause(), WatchConfig::default().pause());
    }

    #[test]
    fn test_env_layer_between_file_and_cli() {
        let _env = env_lock();
        // Env vars are process-global, so every env case runs in this one test.
        let config = WatchFileConfig {
            frequency: Some(1.5),
            timeout: Some(60.0),
            ..Default::default()
        };
        unsafe {
            std::env::set_var("TDDWATCH_FREQUENCY", "0.7");
            std::env::set_var("TDDWATCH_TIMEOUT", " 30 ");
        }
        let resolved = resolve(&config, &CliOverrides::default());

        let cli = CliOverrides {
            frequency: Some(0.1),
            ..Default::default()
        };
        let cli_resolved = resolve(&config, &cli);

        unsafe { std::env::set_var("TDDWATCH_TIMEOUT", "soon") }
        let unparsable = resolve(&config, &CliOverrides::default());

        unsafe {
            std::env::remove_var("TDDWATCH_FREQUENCY");
            std::env::remove_var("TDDWATCH_TIMEOUT");
        }

        let resolved = resolved.unwrap();
        assert_eq!(resolved.frequency, 0.7);
        assert_eq!(resolved.timeout, 30.0);

        let cli_resolved = cli_resolved.unwrap();
        assert_eq!(cli_resolved.frequency, 0.1);
        assert_eq!(cli_resolved.timeout, 30.0);

        assert!(matches!(
            unparsable,
            Err(ConfigError::InvalidValue {
                field: "TDDWATCH_TIMEOUT",
                ..
            })
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
frequency = 0.5
timeout = 10.0
ignore_packages = ["venv", "build"]
ignore_modules = ["setup.py"]

[mappings]
"pkg/module.py" = "tests/test_module.py"
"pkg/other.py" = "tests/test_module.py"
"#;
        let config: WatchFileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.frequency, Some(0.5));
        assert_eq!(config.ignore_packages, vec!["venv", "build"]);
        let targets: Vec<_> = config.mappings.values().collect();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0], &PathBuf::from("tests/test_module.py"));
        assert_eq!(
            config.mappings.keys().next(),
            Some(&PathBuf::from("pkg/module.py"))
        );
    }

    #[test]
    fn test_sparse_toml_parses() {
        let config: WatchFileConfig = toml::from_str("timeout = 5.0\n").unwrap();
        assert_eq!(config.timeout, Some(5.0));
        assert!(config.frequency.is_none());
        assert!(config.mappings.is_empty());
        assert!(config.ignore_modules.is_empty());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "frequency = 2.0").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.frequency, Some(2.0));
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "frequency = [").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_explicit_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }
}
