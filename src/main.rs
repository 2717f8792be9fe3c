use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use tddwatch::BackendKind;
use tddwatch::core::config::{self, CliOverrides};
use tddwatch::tui::{self, RunOptions};

#[derive(Parser)]
#[command(name = "tddwatch", about = "Live terminal view of test-run reports")]
struct Args {
    /// Run-report documents (JSON), one per executed suite
    reports: Vec<PathBuf>,

    /// Seconds between two change analyses
    #[arg(long)]
    frequency: Option<f64>,

    /// Seconds a test module may run before a timeout is reported
    #[arg(long = "run-timeout")]
    run_timeout: Option<f64>,

    /// Package directory name to ignore (repeatable)
    #[arg(long = "ignore-pkg")]
    ignore_pkg: Vec<String>,

    /// Module file name to ignore (repeatable)
    #[arg(long = "ignore-mdl")]
    ignore_mdl: Vec<String>,

    /// Production-to-test mapping, e.g. 'pkg/module.py->tests/test_module.py' (repeatable)
    #[arg(long = "map")]
    map: Vec<String>,

    /// Config file (default: ./tddwatch.toml, then the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Change analysis (JSON) shown with --dbg
    #[arg(long)]
    analysis: Option<PathBuf>,

    /// Failed modules (JSON object of module name to error text)
    #[arg(long)]
    failed: Option<PathBuf>,

    /// Also print the config and the change analysis
    #[arg(long)]
    dbg: bool,

    /// Render once and exit
    #[arg(long)]
    once: bool,

    /// Terminal backend for raw mode and key polling
    #[arg(short, long, default_value_t, value_enum)]
    backend: BackendKind,

    /// Log at trace level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to tddwatch.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let level = if args.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    if let Ok(log_file) = File::create("tddwatch.log") {
        let _ = WriteLogger::init(level, log_config, log_file);
    }

    log::info!("tddwatch starting with backend: {:?}", args.backend);

    let cli = CliOverrides {
        frequency: args.frequency,
        timeout: args.run_timeout,
        ignore_packages: args.ignore_pkg,
        ignore_modules: args.ignore_mdl,
        mappings: args.map,
    };
    let resolved = config::load_config(args.config.as_deref())
        .and_then(|file_config| config::resolve(&file_config, &cli));
    let watch_config = match resolved {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("tddwatch: {e}");
            return ExitCode::FAILURE;
        }
    };

    let options = RunOptions {
        reports: args.reports,
        analysis: args.analysis,
        failed: args.failed,
        dbg: args.dbg,
        once: args.once,
        backend: args.backend,
    };
    match tui::run(watch_config, options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Watch session failed: {}", e);
            eprintln!("tddwatch: {e}");
            ExitCode::FAILURE
        }
    }
}
