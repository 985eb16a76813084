//! Wide-to-long reshaping of fetched series.
//!
//! The fetched per-sensor series are first aligned into a [`WideTable`]
//! (one row per timestamp, one column per sensor) and then melted into one
//! [`NormalizedReading`] per present (timestamp, sensor) pair. Calendar
//! fields are taken from the farm-local time.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc};

use crate::models::{NormalizedReading, SensorChannel, SensorSeries};

// ---

/// Spanish month names, January first.
pub const SPANISH_MONTHS: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// Spanish name of `month` (1-12). Out-of-range months yield an empty string.
pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| SPANISH_MONTHS.get(i as usize))
        .copied()
        .unwrap_or("")
}

/// ISO week of `date`, with the year-end weeks 52 and 53 folded into week 0.
pub fn week_bucket(date: NaiveDate) -> u32 {
    match date.iso_week().week() {
        w if w >= 52 => 0,
        w => w,
    }
}

/// Year the [`week_bucket`] of `date` is counted in.
///
/// Folded year-end weeks open the following year, so week buckets stay in
/// calendar order across new year.
pub fn week_year(date: NaiveDate) -> i32 {
    let iso = date.iso_week();
    match iso.week() {
        w if w >= 52 => iso.year() + 1,
        _ => iso.year(),
    }
}

/// One sensor column of a [`WideTable`].
#[derive(Debug, Clone)]
pub struct WideColumn {
    pub channel: SensorChannel,
    /// Raw value per table row; `None` where the sensor has no value.
    pub values: Vec<Option<f64>>,
}

/// Sensors side by side over the union of their timestamps.
#[derive(Debug, Clone, Default)]
pub struct WideTable {
    /// Sorted, deduplicated.
    pub timestamps: Vec<DateTime<Utc>>,
    pub columns: Vec<WideColumn>,
}

/// Align the series on the union of their timestamps.
///
/// When a sensor reports the same timestamp twice the later sample wins.
pub fn widen(series: &[SensorSeries]) -> WideTable {
    // ---
    let timestamps: Vec<DateTime<Utc>> = series
        .iter()
        .flat_map(|s| s.samples.iter().map(|sample| sample.timestamp))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let columns = series
        .iter()
        .map(|s| {
            let by_time: BTreeMap<DateTime<Utc>, Option<f64>> = s
                .samples
                .iter()
                .map(|sample| (sample.timestamp, sample.value))
                .collect();
            WideColumn {
                channel: s.channel.clone(),
                values: timestamps
                    .iter()
                    .map(|t| by_time.get(t).copied().flatten())
                    .collect(),
            }
        })
        .collect();

    WideTable { timestamps, columns }
}

/// Melt a wide table into long-form readings, ordered by time then column.
///
/// Cells without a value produce no row. Values are converted with the
/// column's sensor kind; negative volumes are kept as missing values.
pub fn melt(table: &WideTable, offset: FixedOffset) -> Vec<NormalizedReading> {
    // ---
    let mut readings = Vec::new();

    for (row, utc) in table.timestamps.iter().enumerate() {
        let local = utc.with_timezone(&offset);
        let date = local.date_naive();

        for column in &table.columns {
            let Some(raw) = column.values.get(row).copied().flatten() else {
                continue;
            };
            let kind = column.channel.kind;
            let value = Some(kind.convert(raw)).filter(|v| !(kind.is_volume() && *v < 0.0));

            readings.push(NormalizedReading {
                timestamp: local,
                sensor_name: column.channel.name.clone(),
                kind,
                value,
                date,
                hour: local.hour(),
                week: week_bucket(date),
                month: local.month(),
                year: local.year(),
            });
        }
    }
    readings
}

/// [`widen`] then [`melt`].
pub fn reshape(series: &[SensorSeries], offset: FixedOffset) -> Vec<NormalizedReading> {
    melt(&widen(series), offset)
}
