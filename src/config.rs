//! Environment configuration for the report generator.
//!
//! This module centralizes every process-level setting and its default,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Per-run parameters live in the run descriptor
//! instead, see [`crate::descriptor`].
use std::{env, path::PathBuf};

use chrono::FixedOffset;

use crate::error::{ReportError, Result};

/// Parse an optional integer variable with a default value.
macro_rules! parse_var_i32 {
    ($lookup:expr, $var_name:expr, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<i32>())
            .transpose()
            .map_err(|e| ReportError::Config(format!("Invalid {}: {}", $var_name, e)))?
            .unwrap_or($default)
    };
}

/// Parse a required string variable.
macro_rules! require_var {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name).filter(|v| !v.is_empty()).ok_or_else(|| {
            ReportError::Config(format!("{} must be set in .env or environment", $var_name))
        })?
    };
}

/// Strongly typed process configuration.
///
/// All fields are immutable after loading.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Sensor data API base URL.
    pub api_url: String,

    /// Bearer token sent to the sensor API, if any.
    pub api_token: Option<String>,

    /// Offset of the farm's local time from UTC.
    pub utc_offset: FixedOffset,

    /// Directory the HTML report is written to.
    pub output_dir: PathBuf,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `SENSOR_API_URL` – sensor data API base URL
///
/// Optional:
/// - `SENSOR_API_TOKEN` – bearer token for the API
/// - `REPORT_UTC_OFFSET_HOURS` – farm-local offset from UTC (default: -5)
/// - `REPORT_OUTPUT_DIR` – where the report is written (default: `.`)
pub fn load_from_env() -> Result<Config> {
    load_from(|name| env::var(name).ok())
}

/// Same as [`load_from_env`] but reading variables through `lookup`.
pub fn load_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let api_url = require_var!(lookup, "SENSOR_API_URL");
    let api_token = lookup("SENSOR_API_TOKEN").filter(|t| !t.is_empty());
    let offset_hours = parse_var_i32!(lookup, "REPORT_UTC_OFFSET_HOURS", -5);
    let output_dir = lookup("REPORT_OUTPUT_DIR")
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let utc_offset = offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| {
            ReportError::Config(format!("REPORT_UTC_OFFSET_HOURS out of range: {offset_hours}"))
        })?;

    Ok(Config {
        api_url: api_url.trim_end_matches('/').to_string(),
        api_token,
        utc_offset,
        output_dir,
    })
}

impl Config {
    /// Log the loaded configuration, masking the API token.
    pub fn log_config(&self) {
        // ---
        let masked_token = match &self.api_token {
            Some(token) if token.chars().count() > 8 => {
                let tail: String = token.chars().skip(token.chars().count() - 4).collect();
                format!("****{tail}")
            }
            Some(_) => "****".to_string(),
            None => "<none>".to_string(),
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  SENSOR_API_URL          : {}", self.api_url);
        tracing::info!("  SENSOR_API_TOKEN        : {}", masked_token);
        tracing::info!("  REPORT_UTC_OFFSET_HOURS : {}", self.utc_offset);
        tracing::info!("  REPORT_OUTPUT_DIR       : {}", self.output_dir.display());
    }
}
