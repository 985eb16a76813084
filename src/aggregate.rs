//! Bucketed statistics over normalized readings.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset, NaiveDate};
use statrs::statistics::{Data, Median, Statistics};
use tracing::debug;

use crate::descriptor::Thresholds;
use crate::models::{AggregateRow, Bucket, BucketKey, NormalizedReading};
use crate::reshape::week_year;

// ---

/// Ceiling above which a sensor's values are treated as meter glitches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierRule {
    /// Short sensor name as registered on the device.
    pub sensor: &'static str,
    /// Largest plausible value, in the sensor's converted unit.
    pub ceiling: f64,
}

impl OutlierRule {
    /// Matches "name" and "House - name".
    pub fn applies_to(&self, sensor_name: &str) -> bool {
        sensor_name == self.sensor
            || sensor_name
                .strip_suffix(self.sensor)
                .is_some_and(|prefix| prefix.ends_with(" - "))
    }
}

/// Null every value above its sensor's ceiling. Rows are never removed.
///
/// Returns how many values were nulled.
pub fn suppress_outliers(readings: &mut [NormalizedReading], rules: &[OutlierRule]) -> usize {
    // ---
    let mut suppressed = 0;
    for reading in readings.iter_mut() {
        let Some(value) = reading.value else {
            continue;
        };
        if rules
            .iter()
            .any(|rule| rule.applies_to(&reading.sensor_name) && value > rule.ceiling)
        {
            reading.value = None;
            suppressed += 1;
        }
    }
    if suppressed > 0 {
        debug!("Suppressed {} outlier values", suppressed);
    }
    suppressed
}

fn bucket_key(reading: &NormalizedReading, bucket: Bucket) -> BucketKey {
    match bucket {
        Bucket::HourOfDay => BucketKey::Hour(reading.hour),
        Bucket::Day => BucketKey::Date(reading.date),
        Bucket::Week => BucketKey::Week {
            year: week_year(reading.date),
            week: reading.week,
        },
        Bucket::Month => BucketKey::Month {
            year: reading.year,
            month: reading.month,
        },
    }
}

/// Group readings by (bucket, sensor) and summarize each group.
///
/// Rows come out sorted by bucket, then sensor name. A group whose values
/// are all missing still produces a row, with zero sum and no statistics.
pub fn aggregate(readings: &[NormalizedReading], bucket: Bucket) -> Vec<AggregateRow> {
    // ---
    let mut groups: BTreeMap<(BucketKey, &str), Vec<f64>> = BTreeMap::new();
    for reading in readings {
        let values = groups
            .entry((bucket_key(reading, bucket), reading.sensor_name.as_str()))
            .or_default();
        if let Some(v) = reading.value {
            values.push(v);
        }
    }

    groups
        .into_iter()
        .map(|((time_bucket, sensor_name), values)| summarize(time_bucket, sensor_name, values))
        .collect()
}

fn summarize(time_bucket: BucketKey, sensor_name: &str, values: Vec<f64>) -> AggregateRow {
    // ---
    let count = values.len();
    let sum: f64 = values.iter().sum();

    let mut row = AggregateRow {
        time_bucket,
        sensor_name: sensor_name.to_string(),
        count,
        sum,
        min: None,
        max: None,
        mean: None,
        std: None,
        median: None,
    };
    if count == 0 {
        return row;
    }

    row.min = Some(Statistics::min(&values));
    row.max = Some(Statistics::max(&values));
    row.mean = Some(Statistics::mean(&values));
    if count >= 2 {
        row.std = Some(Statistics::std_dev(&values));
    }
    row.median = Some(Data::new(values).median());
    row
}

/// Distinct sensor names, sorted.
pub fn sensor_names(readings: &[NormalizedReading]) -> Vec<String> {
    readings
        .iter()
        .map(|r| r.sensor_name.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Share of a sensor's readings inside the comfort range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeShare {
    pub sensor_name: String,
    /// `None` for the whole run.
    pub date: Option<NaiveDate>,
    /// 0-100.
    pub percent: f64,
    pub count: usize,
}

fn range_shares<F>(readings: &[NormalizedReading], thresholds: &Thresholds, date_of: F) -> Vec<RangeShare>
where
    F: Fn(&NormalizedReading) -> Option<NaiveDate>,
{
    // ---
    let mut tally: BTreeMap<(&str, Option<NaiveDate>), (usize, usize)> = BTreeMap::new();
    for reading in readings {
        let Some(value) = reading.value else {
            continue;
        };
        let (inside, total) = tally
            .entry((reading.sensor_name.as_str(), date_of(reading)))
            .or_default();
        *total += 1;
        if thresholds.in_standard(value) {
            *inside += 1;
        }
    }

    tally
        .into_iter()
        .map(|((sensor_name, date), (inside, total))| RangeShare {
            sensor_name: sensor_name.to_string(),
            date,
            percent: inside as f64 * 100.0 / total as f64,
            count: total,
        })
        .collect()
}

/// Percentage of time each sensor spent in the comfort range.
pub fn percent_in_range(readings: &[NormalizedReading], thresholds: &Thresholds) -> Vec<RangeShare> {
    range_shares(readings, thresholds, |_| None)
}

/// Same as [`percent_in_range`], per local day.
pub fn daily_percent_in_range(readings: &[NormalizedReading], thresholds: &Thresholds) -> Vec<RangeShare> {
    range_shares(readings, thresholds, |r| Some(r.date))
}

/// Mean of every non-missing value, across sensors.
pub fn overall_mean(readings: &[NormalizedReading]) -> Option<f64> {
    let values: Vec<f64> = readings.iter().filter_map(|r| r.value).collect();
    (!values.is_empty()).then(|| Statistics::mean(&values))
}

/// Number of distinct local days with at least one reading.
pub fn measured_days(readings: &[NormalizedReading]) -> usize {
    readings
        .iter()
        .filter(|r| r.value.is_some())
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .len()
}

/// Change between consecutive readings of one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub timestamp: DateTime<FixedOffset>,
    /// `None` for the first reading and around missing values.
    pub change: Option<f64>,
}

/// Successive differences per sensor, in time order.
pub fn successive_deltas(readings: &[NormalizedReading]) -> BTreeMap<String, Vec<Delta>> {
    // ---
    let mut by_sensor: BTreeMap<String, Vec<(DateTime<FixedOffset>, Option<f64>)>> = BTreeMap::new();
    for r in readings {
        by_sensor
            .entry(r.sensor_name.clone())
            .or_default()
            .push((r.timestamp, r.value));
    }

    by_sensor
        .into_iter()
        .map(|(name, mut points)| {
            points.sort_by_key(|(t, _)| *t);
            let mut previous: Option<f64> = None;
            let deltas = points
                .into_iter()
                .map(|(timestamp, value)| {
                    let change = match (previous, value) {
                        (Some(p), Some(v)) => Some(v - p),
                        _ => None,
                    };
                    previous = value;
                    Delta { timestamp, change }
                })
                .collect();
            (name, deltas)
        })
        .collect()
}

/// Mean over sensors of each sensor's sample standard deviation.
pub fn mean_sensor_std(readings: &[NormalizedReading]) -> Option<f64> {
    // ---
    let mut by_sensor: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in readings {
        if let Some(v) = r.value {
            by_sensor.entry(r.sensor_name.as_str()).or_default().push(v);
        }
    }
    let stds: Vec<f64> = by_sensor
        .values()
        .filter(|values| values.len() >= 2)
        .map(|values| Statistics::std_dev(values))
        .collect();
    (!stds.is_empty()).then(|| Statistics::mean(&stds))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::SensorKind;
    use crate::reshape::week_bucket;
    use chrono::{Datelike, Duration, TimeZone, Timelike};

    fn create_test_reading(sensor: &str, hours: i64, value: Option<f64>) -> NormalizedReading {
        // ---
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let timestamp = offset.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap() + Duration::hours(hours);
        let date = timestamp.date_naive();
        NormalizedReading {
            timestamp,
            sensor_name: sensor.to_string(),
            kind: SensorKind::PH,
            value,
            date,
            hour: timestamp.hour(),
            week: week_bucket(date),
            month: timestamp.month(),
            year: timestamp.year(),
        }
    }

    #[test]
    fn test_daily_stats() {
        // ---
        let readings = vec![
            create_test_reading("a", 0, Some(1.0)),
            create_test_reading("a", 1, Some(2.0)),
            create_test_reading("a", 2, Some(6.0)),
            create_test_reading("a", 25, Some(4.0)),
        ];

        let rows = aggregate(&readings, Bucket::Day);

        assert_eq!(rows.len(), 2);
        let first = &rows[0];
        assert_eq!(first.count, 3);
        assert_eq!(first.sum, 9.0);
        assert_eq!(first.min, Some(1.0));
        assert_eq!(first.max, Some(6.0));
        assert_eq!(first.mean, Some(3.0));
        assert_eq!(first.median, Some(2.0));
        // sample std of 1, 2, 6
        assert!((first.std.unwrap() - 7.0_f64.sqrt()).abs() < 1e-9);

        let second = &rows[1];
        assert_eq!(second.count, 1);
        assert_eq!(second.std, None);
        assert_eq!(second.median, Some(4.0));
    }

    #[test]
    fn test_min_mean_max_consistent() {
        // ---
        let readings: Vec<_> = (0..200)
            .map(|h| {
                let v = ((h * 37) % 11) as f64 / 3.0 - 1.0;
                create_test_reading(if h % 3 == 0 { "a" } else { "b" }, h, Some(v))
            })
            .collect();

        for bucket in [Bucket::HourOfDay, Bucket::Day, Bucket::Week, Bucket::Month] {
            for row in aggregate(&readings, bucket) {
                let (min, mean, max) = (row.min.unwrap(), row.mean.unwrap(), row.max.unwrap());
                assert!(min <= mean + 1e-12 && mean <= max + 1e-12, "{row:?}");
            }
        }
    }

    #[test]
    fn test_same_week_number_in_two_years() {
        // ---
        // 2022-01-03 and 2023-01-03 both fall in week 1
        let readings = vec![
            create_test_reading("a", 0, Some(1.0)),
            create_test_reading("a", 365 * 24, Some(3.0)),
        ];
        assert_eq!(readings[0].week, readings[1].week);

        let rows = aggregate(&readings, Bucket::Week);

        let keys: Vec<BucketKey> = rows.iter().map(|r| r.time_bucket).collect();
        assert_eq!(
            keys,
            vec![
                BucketKey::Week { year: 2022, week: 1 },
                BucketKey::Week { year: 2023, week: 1 },
            ]
        );
    }

    #[test]
    fn test_all_missing_bucket_keeps_row() {
        // ---
        let readings = vec![
            create_test_reading("a", 0, None),
            create_test_reading("a", 1, None),
        ];

        let rows = aggregate(&readings, Bucket::Day);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 0);
        assert_eq!(rows[0].sum, 0.0);
        assert_eq!(rows[0].mean, None);
        assert_eq!(rows[0].median, None);
    }

    #[test]
    fn test_rows_sorted_by_bucket_then_sensor() {
        // ---
        let readings = vec![
            create_test_reading("b", 30, Some(1.0)),
            create_test_reading("a", 30, Some(1.0)),
            create_test_reading("b", 0, Some(1.0)),
        ];

        let rows = aggregate(&readings, Bucket::Day);
        let keys: Vec<(BucketKey, &str)> = rows
            .iter()
            .map(|r| (r.time_bucket, r.sensor_name.as_str()))
            .collect();

        let jan3 = BucketKey::Date(NaiveDate::from_ymd_opt(2022, 1, 3).unwrap());
        let jan4 = BucketKey::Date(NaiveDate::from_ymd_opt(2022, 1, 4).unwrap());
        assert_eq!(keys, vec![(jan3, "b"), (jan4, "a"), (jan4, "b")]);
    }

    #[test]
    fn test_hour_of_day_profile() {
        // ---
        let readings = vec![
            create_test_reading("a", 5, Some(1.0)),
            create_test_reading("a", 29, Some(3.0)),
            create_test_reading("a", 6, Some(10.0)),
        ];

        let rows = aggregate(&readings, Bucket::HourOfDay);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].time_bucket, BucketKey::Hour(5));
        assert_eq!(rows[0].mean, Some(2.0));
        assert_eq!(rows[1].time_bucket, BucketKey::Hour(6));
    }

    #[test]
    fn test_suppression_nulls_without_removing() {
        // ---
        let rules = [OutlierRule {
            sensor: "Inhisalm-Pluma-Total Hora",
            ceiling: 250.0,
        }];
        let mut readings = vec![
            create_test_reading("Planta - Inhisalm-Pluma-Total Hora", 0, Some(300.0)),
            create_test_reading("Planta - Inhisalm-Pluma-Total Hora", 1, Some(250.0)),
            create_test_reading("Otro", 2, Some(900.0)),
        ];

        let suppressed = suppress_outliers(&mut readings, &rules);

        assert_eq!(suppressed, 1);
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].value, None);
        assert_eq!(readings[1].value, Some(250.0));
        assert_eq!(readings[2].value, Some(900.0));
    }

    #[test]
    fn test_suppression_is_idempotent() {
        // ---
        let rules = [OutlierRule {
            sensor: "a",
            ceiling: 5.0,
        }];
        let mut readings: Vec<_> = (0..48)
            .map(|h| create_test_reading("a", h, Some((h % 10) as f64)))
            .collect();

        suppress_outliers(&mut readings, &rules);
        let once = readings.clone();
        let again = suppress_outliers(&mut readings, &rules);

        assert_eq!(again, 0);
        assert_eq!(readings, once);
    }

    #[test]
    fn test_rule_matching() {
        // ---
        let rule = OutlierRule {
            sensor: "Total Hora",
            ceiling: 1.0,
        };
        assert!(rule.applies_to("Total Hora"));
        assert!(rule.applies_to("Planta - Total Hora"));
        assert!(!rule.applies_to("Planta - Pluma Total Hora"));
    }

    #[test]
    fn test_percent_in_range() {
        // ---
        let thresholds = Thresholds::default();
        let readings = vec![
            create_test_reading("a", 0, Some(5.5)),
            create_test_reading("a", 1, Some(6.0)),
            create_test_reading("a", 2, Some(6.2)),
            create_test_reading("a", 3, None),
            create_test_reading("a", 25, Some(4.0)),
        ];

        let overall = percent_in_range(&readings, &thresholds);
        assert_eq!(overall.len(), 1);
        assert_eq!(overall[0].percent, 50.0);
        assert_eq!(overall[0].count, 4);

        let daily = daily_percent_in_range(&readings, &thresholds);
        assert_eq!(daily.len(), 2);
        assert!((daily[0].percent - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(daily[1].percent, 0.0);
    }

    #[test]
    fn test_overall_mean_and_days() {
        // ---
        let readings = vec![
            create_test_reading("a", 0, Some(5.0)),
            create_test_reading("b", 1, Some(7.0)),
            create_test_reading("a", 30, None),
        ];

        assert_eq!(overall_mean(&readings), Some(6.0));
        assert_eq!(measured_days(&readings), 1);
        assert_eq!(overall_mean(&[]), None);
    }

    #[test]
    fn test_successive_deltas() {
        // ---
        let readings = vec![
            create_test_reading("a", 1, Some(5.5)),
            create_test_reading("a", 0, Some(5.0)),
            create_test_reading("a", 2, None),
            create_test_reading("a", 3, Some(6.0)),
        ];

        let deltas = successive_deltas(&readings);
        let changes: Vec<Option<f64>> = deltas["a"].iter().map(|d| d.change).collect();

        assert_eq!(changes, vec![None, Some(0.5), None, None]);
    }

    #[test]
    fn test_mean_sensor_std() {
        // ---
        let readings = vec![
            create_test_reading("a", 0, Some(1.0)),
            create_test_reading("a", 1, Some(3.0)),
            create_test_reading("b", 0, Some(2.0)),
            create_test_reading("b", 1, Some(2.0)),
            create_test_reading("c", 0, Some(9.0)),
        ];

        // std(a) = sqrt(2), std(b) = 0, c has a single value
        let expected = 2.0_f64.sqrt() / 2.0;
        assert!((mean_sensor_std(&readings).unwrap() - expected).abs() < 1e-9);
    }
}
