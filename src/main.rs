//! Command-line entry point for `h2okuo-report`.
//!
//! Runs one report end to end:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Reading the run descriptor named by `-pf/--parameters_file`
//! - Fetching, aggregating and rendering through [`pipeline::run`]
//!
//! # Environment Variables
//! - `SENSOR_API_URL` (**required**) – sensor data API base URL
//! - `SENSOR_API_TOKEN` (optional) – bearer token for the API
//! - `REPORT_UTC_OFFSET_HOURS` (optional) – farm-local offset (default: -5)
//! - `REPORT_OUTPUT_DIR` (optional) – output directory (default: `.`)
//! - `REPORT_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `REPORT_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! Failures exit with the stage's code from [`ReportError::exit_code`].
use std::{env, ffi::OsString, path::PathBuf, process::ExitCode};

use chrono::Utc;
use clap::Parser;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use h2okuo_reporting::{config, descriptor, pipeline, ReportError};

// ---

/// Generate an H2Okuo sensor report.
#[derive(Debug, Parser)]
#[command(name = "h2okuo-report", version, about)]
struct Cli {
    /// JSON run descriptor: company, farm, report name, dates, thresholds.
    #[arg(short = 'p', long = "parameters_file", value_name = "FILE")]
    parameters_file: PathBuf,
}

/// Accept the historical single-dash `-pf` spelling.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            if arg == "-pf" {
                OsString::from("--parameters_file")
            } else if let Some(value) = arg.to_str().and_then(|s| s.strip_prefix("-pf=")) {
                OsString::from(format!("--parameters_file={value}"))
            } else {
                arg
            }
        })
        .collect()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // ---
    dotenv().ok();
    init_tracing();

    let cli = match Cli::try_parse_from(normalize_args(env::args_os())) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(&e));
        }
    };

    match run(&cli).await {
        Ok(path) => {
            tracing::info!("Report ready: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// `--help` and `--version` succeed; usage errors share the config code.
fn usage_exit_code(e: &clap::Error) -> u8 {
    if e.use_stderr() {
        ReportError::Config(e.kind().to_string()).exit_code()
    } else {
        0
    }
}

async fn run(cli: &Cli) -> Result<PathBuf, ReportError> {
    // ---
    let cfg = config::load_from_env()?;
    cfg.log_config();

    let run = descriptor::load(&cli.parameters_file)?;
    tracing::info!(
        "Loaded parameters for '{}' ({})",
        run.report_name,
        cli.parameters_file.display()
    );

    pipeline::run(&cfg, &run, Utc::now()).await
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// - Log target, file, and line number output enabled, written to stderr
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY on stderr
/// - Span event emission mode controlled by the `REPORT_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level from `RUST_LOG`, else `REPORT_LOG_LEVEL` (default `info`)
fn init_tracing() {
    // ---
    let span_events = match env::var("REPORT_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stderr().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("REPORT_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},hyper=warn,reqwest=warn"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
