//! Run descriptor: the per-report JSON file passed on the command line.

use std::{fs, path::Path};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;

use crate::error::{ReportError, Result};
use crate::models::Period;

// ---

/// Which sections a report contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// pH levels, variation, hourly profile, mean and time in range.
    #[default]
    Ph,
    /// Daily, weekly and monthly water/product consumption.
    Water,
    /// Both of the above in one document.
    PhAndWater,
}

impl ReportKind {
    pub fn includes_ph(self) -> bool {
        matches!(self, ReportKind::Ph | ReportKind::PhAndWater)
    }

    pub fn includes_water(self) -> bool {
        matches!(self, ReportKind::Water | ReportKind::PhAndWater)
    }
}

/// pH comfort and alert bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min_standard: f64,
    pub max_standard: f64,
    pub min_alert: f64,
    pub max_alert: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_standard: 5.5,
            max_standard: 6.0,
            min_alert: 5.0,
            max_alert: 6.5,
        }
    }
}

impl Thresholds {
    /// True when `value` lies in the closed comfort interval.
    pub fn in_standard(&self, value: f64) -> bool {
        self.min_standard <= value && value <= self.max_standard
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawParams {
    min_standard: Option<f64>,
    max_standard: Option<f64>,
    min_alert: Option<f64>,
    max_alert: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    company: String,
    farm: String,
    report_name: Vec<String>,
    start_date: String,
    end_date: Option<String>,
    #[serde(default)]
    params: Option<RawParams>,
    #[serde(default)]
    kind: ReportKind,
    #[serde(default)]
    sensor_filter: Option<String>,
    #[serde(default)]
    period: Period,
}

/// Validated run parameters.
#[derive(Debug, Clone)]
pub struct RunDescriptor {
    pub company: String,
    pub farm: String,
    pub report_name: String,
    pub start_date: NaiveDate,
    /// `None` means "until now".
    pub end_date: Option<NaiveDate>,
    pub thresholds: Thresholds,
    pub kind: ReportKind,
    /// Substring a water sensor's name must contain to be reported.
    pub sensor_filter: Option<String>,
    pub period: Period,
}

/// Read and validate a descriptor file.
pub fn load(path: &Path) -> Result<RunDescriptor> {
    // ---
    let text = fs::read_to_string(path).map_err(|e| {
        ReportError::Config(format!("cannot read parameters file {}: {e}", path.display()))
    })?;
    parse(&text)
}

/// Parse and validate descriptor JSON.
pub fn parse(text: &str) -> Result<RunDescriptor> {
    // ---
    let raw: RawDescriptor = serde_json::from_str(text)
        .map_err(|e| ReportError::Config(format!("malformed parameters file: {e}")))?;

    let report_name = raw
        .report_name
        .into_iter()
        .next()
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ReportError::Config("report_name must hold at least one name".into()))?;

    let start_date = parse_date("start_date", &raw.start_date)?;
    let end_date = raw
        .end_date
        .as_deref()
        .map(|d| parse_date("end_date", d))
        .transpose()?;

    if let Some(end) = end_date {
        if end <= start_date {
            return Err(ReportError::Config(format!(
                "end_date {end} must be after start_date {start_date}"
            )));
        }
    }

    let defaults = Thresholds::default();
    let params = raw.params.unwrap_or_default();
    let thresholds = Thresholds {
        min_standard: params.min_standard.unwrap_or(defaults.min_standard),
        max_standard: params.max_standard.unwrap_or(defaults.max_standard),
        min_alert: params.min_alert.unwrap_or(defaults.min_alert),
        max_alert: params.max_alert.unwrap_or(defaults.max_alert),
    };
    if thresholds.min_standard > thresholds.max_standard
        || thresholds.min_alert > thresholds.max_alert
    {
        return Err(ReportError::Config(format!(
            "threshold bounds are inverted: {thresholds:?}"
        )));
    }

    Ok(RunDescriptor {
        company: raw.company,
        farm: raw.farm,
        report_name,
        start_date,
        end_date,
        thresholds,
        kind: raw.kind,
        sensor_filter: raw.sensor_filter.filter(|f| !f.is_empty()),
        period: raw.period,
    })
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| ReportError::Config(format!("{field} '{value}' is not a YYYY-MM-DD date: {e}")))
}

impl RunDescriptor {
    /// Query window in UTC. Dates are farm-local midnights; an open end is `now`.
    pub fn time_range(
        &self,
        offset: FixedOffset,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        // ---
        let start = local_midnight(self.start_date, offset)?;
        let end = match self.end_date {
            Some(date) => local_midnight(date, offset)?,
            None => now,
        };
        if end <= start {
            return Err(ReportError::Config(format!(
                "start_date {} is not before the end of the range {end}",
                self.start_date
            )));
        }
        Ok((start, end))
    }

    /// "Company - Farm" heading used in the report header.
    pub fn heading(&self) -> String {
        format!("{} - {}", self.company, self.farm)
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> Result<DateTime<Utc>> {
    offset
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ReportError::Config(format!("cannot place {date} in local time")))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    const FULL: &str = r#"{
        "company": "AGRINSA",
        "farm": "La Loteria",
        "report_name": ["Informe pH", "ignored"],
        "start_date": "2021-10-01",
        "end_date": "2022-02-01",
        "params": {"min_standard": 4.0, "max_standard": 5.0, "min_alert": 3.5, "max_alert": 5.5}
    }"#;

    #[test]
    fn test_parse_full_descriptor() {
        // ---
        let d = parse(FULL).unwrap();

        assert_eq!(d.company, "AGRINSA");
        assert_eq!(d.report_name, "Informe pH");
        assert_eq!(d.start_date, NaiveDate::from_ymd_opt(2021, 10, 1).unwrap());
        assert_eq!(d.end_date, NaiveDate::from_ymd_opt(2022, 2, 1));
        assert_eq!(d.thresholds.min_standard, 4.0);
        assert_eq!(d.thresholds.max_alert, 5.5);
        assert_eq!(d.kind, ReportKind::Ph);
        assert_eq!(d.period, Period::Hourly);
        assert_eq!(d.heading(), "AGRINSA - La Loteria");
    }

    #[test]
    fn test_null_end_date_and_default_params() {
        // ---
        let d = parse(
            r#"{"company": "C", "farm": "F", "report_name": ["R"],
                "start_date": "2022-01-01", "end_date": null, "kind": "water",
                "sensor_filter": "Min"}"#,
        )
        .unwrap();

        assert!(d.end_date.is_none());
        assert_eq!(d.thresholds, Thresholds::default());
        assert_eq!(d.kind, ReportKind::Water);
        assert_eq!(d.sensor_filter.as_deref(), Some("Min"));
    }

    #[test]
    fn test_rejects_bad_input() {
        // ---
        let missing_key = r#"{"company": "C", "report_name": ["R"], "start_date": "2022-01-01"}"#;
        assert!(matches!(parse(missing_key), Err(ReportError::Config(_))));

        let bad_date = r#"{"company": "C", "farm": "F", "report_name": ["R"], "start_date": "01/02/2022"}"#;
        let err = parse(bad_date).unwrap_err();
        assert!(err.to_string().contains("start_date"));

        let no_name = r#"{"company": "C", "farm": "F", "report_name": [], "start_date": "2022-01-01"}"#;
        assert!(matches!(parse(no_name), Err(ReportError::Config(_))));

        let reversed = r#"{"company": "C", "farm": "F", "report_name": ["R"],
            "start_date": "2022-01-05", "end_date": "2022-01-01"}"#;
        assert!(matches!(parse(reversed), Err(ReportError::Config(_))));
    }

    #[test]
    fn test_time_range_uses_local_midnight() {
        // ---
        let d = parse(FULL).unwrap();
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let (start, end) = d.time_range(offset, Utc::now()).unwrap();

        assert_eq!(start, Utc.with_ymd_and_hms(2021, 10, 1, 5, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2022, 2, 1, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_open_range_ends_now() {
        // ---
        let d = parse(
            r#"{"company": "C", "farm": "F", "report_name": ["R"],
                "start_date": "2022-01-01", "end_date": null}"#,
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2022, 1, 10, 12, 0, 0).unwrap();
        let (_, end) = d.time_range(FixedOffset::east_opt(0).unwrap(), now).unwrap();
        assert_eq!(end, now);
    }
}
