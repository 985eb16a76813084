//! Data models for the report pipeline.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;

// ---

/// Resampling period requested from the sensor API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Period {
    /// No aggregation, every stored sample.
    #[serde(rename = "")]
    Raw,
    #[default]
    #[serde(rename = "1H")]
    Hourly,
    #[serde(rename = "1D")]
    Daily,
}

impl Period {
    /// Value of the `period` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            Period::Raw => "",
            Period::Hourly => "1H",
            Period::Daily => "1D",
        }
    }
}

/// Measured quantity a device is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Ph,
    Water,
}

impl ValueType {
    /// Value of the `type` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            ValueType::Ph => "pH",
            ValueType::Water => "water",
        }
    }
}

/// Device record from the API's company device listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(rename = "raw_id")]
    pub raw_id: String,
    pub sensor_name: String,
    #[serde(default)]
    pub barn_name: String,
    pub farm_name: String,
    #[serde(default)]
    pub kind: String,
}

impl Device {
    /// House label: last `|` segment of the barn name.
    pub fn house(&self) -> &str {
        last_segment(&self.barn_name)
    }

    /// Short sensor name: last `|` segment of the sensor name.
    pub fn short_name(&self) -> &str {
        last_segment(&self.sensor_name)
    }

    /// Column label of a pH sensor: last `|` segment of the device kind,
    /// falling back to the short sensor name when the kind is blank.
    pub fn kind_label(&self) -> &str {
        match last_segment(&self.kind) {
            "" => self.short_name(),
            kind => kind,
        }
    }
}

fn last_segment(s: &str) -> &str {
    s.rsplit('|').next().unwrap_or(s).trim()
}

/// Products metered in liters but reported by weight.
const PRODUCT_SENSOR_PREFIXES: &[&str] = &["Inhisalm"];

/// Liters per US gallon.
pub const LITERS_PER_GALLON: f64 = 3.785411784;

/// Liters per cubic meter.
pub const LITERS_PER_CUBIC_METER: f64 = 1000.0;

/// Kilograms per liter of dosed product.
pub const PRODUCT_DENSITY: f64 = 1.3;

/// What a sensor measures and in which unit it reports.
///
/// Resolved once per device when the run starts; every reading of that
/// sensor is converted with [`SensorKind::convert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    WaterVolumeGallons,
    WaterVolumeMilliliters,
    WaterVolumeLiters,
    ProductLiters,
    PH,
}

impl SensorKind {
    /// Pick the kind from the value type and the device's sensor name.
    pub fn resolve(value_type: ValueType, sensor_name: &str) -> SensorKind {
        // ---
        if value_type == ValueType::Ph {
            return SensorKind::PH;
        }
        let name = last_segment(sensor_name);
        if name.contains("Galones") || name.contains("Gallons") {
            SensorKind::WaterVolumeGallons
        } else if name.split_whitespace().any(|w| w == "mL") {
            SensorKind::WaterVolumeMilliliters
        } else if PRODUCT_SENSOR_PREFIXES.iter().any(|p| name.starts_with(p)) {
            SensorKind::ProductLiters
        } else {
            SensorKind::WaterVolumeLiters
        }
    }

    /// Convert a raw API value into the unit reported by [`SensorKind::unit`].
    pub fn convert(self, raw: f64) -> f64 {
        match self {
            SensorKind::WaterVolumeGallons => raw * LITERS_PER_GALLON,
            SensorKind::WaterVolumeMilliliters => raw / 1000.0,
            SensorKind::WaterVolumeLiters => raw,
            SensorKind::ProductLiters => raw * PRODUCT_DENSITY,
            SensorKind::PH => raw,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            SensorKind::WaterVolumeGallons
            | SensorKind::WaterVolumeMilliliters
            | SensorKind::WaterVolumeLiters => "litros",
            SensorKind::ProductLiters => "kilos",
            SensorKind::PH => "pH",
        }
    }

    /// Volumes cannot be negative; pH has no such bound.
    pub fn is_volume(self) -> bool {
        !matches!(self, SensorKind::PH)
    }
}

/// One physical sensor as it appears in the report.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorChannel {
    pub raw_id: String,
    /// Unique within a run, e.g. "G05 - pH".
    pub name: String,
    pub kind: SensorKind,
}

/// Sample as returned by the API for one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    /// `None` when the API reported an empty or non-numeric value.
    pub value: Option<f64>,
}

/// Fetched samples of one sensor.
#[derive(Debug, Clone)]
pub struct SensorSeries {
    pub channel: SensorChannel,
    pub samples: Vec<RawSample>,
}

/// Long-form reading with farm-local calendar fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReading {
    pub timestamp: DateTime<FixedOffset>,
    pub sensor_name: String,
    pub kind: SensorKind,
    /// Converted value; `None` once suppressed or when missing upstream.
    pub value: Option<f64>,
    pub date: NaiveDate,
    pub hour: u32,
    /// ISO week in `0..=51`.
    pub week: u32,
    pub month: u32,
    pub year: i32,
}

/// Time grouping used by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Hour of day across the whole range (0-23).
    HourOfDay,
    Day,
    Week,
    Month,
}

/// Key of one aggregation bucket; ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Hour(u32),
    Date(NaiveDate),
    /// Week number in `0..=51` and the year its weeks are counted in.
    Week { year: i32, week: u32 },
    Month { year: i32, month: u32 },
}

/// Summary statistics of one (bucket, sensor) group.
///
/// Statistics are `None` when every value in the bucket is missing; `std`
/// also needs at least two values.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub time_bucket: BucketKey,
    pub sensor_name: String,
    pub count: usize,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub median: Option<f64>,
}

impl AggregateRow {
    /// Same row with every value multiplied by `factor`; counts are unchanged.
    pub fn scaled(&self, factor: f64) -> AggregateRow {
        let scale = |v: Option<f64>| v.map(|v| v * factor);
        AggregateRow {
            time_bucket: self.time_bucket,
            sensor_name: self.sensor_name.clone(),
            count: self.count,
            sum: self.sum * factor,
            min: scale(self.min),
            max: scale(self.max),
            mean: scale(self.mean),
            std: scale(self.std),
            median: scale(self.median),
        }
    }
}
