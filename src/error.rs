//! Error type shared by every pipeline stage.
//!
//! Each variant names the stage that failed so the binary can print a useful
//! message and exit with a stage-specific code.

use thiserror::Error;

// ---

/// Errors raised while producing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Bad or missing environment variable, unreadable or malformed run descriptor.
    #[error("config stage: {0}")]
    Config(String),

    /// The sensor API returned nothing usable for the requested range.
    #[error("fetch stage: no data: {0}")]
    NoData(String),

    /// Transport or decoding failure talking to the sensor API.
    #[error("fetch stage: {0}")]
    Fetch(#[from] reqwest::Error),

    /// A chart or the HTML document could not be produced.
    #[error("render stage: {0}")]
    Render(String),

    /// The finished report could not be written.
    #[error("write stage: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    /// Process exit code for this error; never zero.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReportError::Config(_) => 2,
            ReportError::NoData(_) => 3,
            ReportError::Fetch(_) => 4,
            ReportError::Render(_) => 5,
            ReportError::Io(_) => 6,
        }
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        ReportError::Render(format!("chart serialization failed: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
