//! Sensor API client.
//!
//! Lists a company's devices, keeps the ones reported on, and pulls each
//! sensor's series over the run's time range. Calls are issued one sensor at
//! a time.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ReportError, Result};
use crate::models::{Device, Period, RawSample, SensorChannel, SensorKind, SensorSeries, ValueType};

// ---

/// Thin client over the hosted sensor data API.
#[derive(Debug, Clone)]
pub struct SensorApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl SensorApi {
    pub fn new(cfg: &Config) -> Result<Self> {
        // ---
        let base_url = Url::parse(&cfg.api_url)
            .map_err(|e| ReportError::Config(format!("Invalid SENSOR_API_URL '{}': {e}", cfg.api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ReportError::Config(format!(
                "SENSOR_API_URL '{}' cannot be used as a base URL",
                cfg.api_url
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            token: cfg.api_token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        // ---
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        // ---
        debug!("GET {}", url);
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Devices registered for `company` under `value_type`.
    pub async fn list_devices(&self, company: &str, value_type: ValueType) -> Result<Vec<Device>> {
        // ---
        let mut url = self.endpoint(&["companies", company, "devices"]);
        url.query_pairs_mut().append_pair("type", value_type.as_query());

        let response = self.get_json(url).await?;
        let devices = parse_devices(&response);
        info!(
            "Company {} has {} {} devices",
            company,
            devices.len(),
            value_type.as_query()
        );
        Ok(devices)
    }

    /// Samples of one sensor between `start` and `end`, resampled to `period`.
    pub async fn sensor_values(
        &self,
        raw_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        period: Period,
    ) -> Result<Vec<RawSample>> {
        // ---
        let mut url = self.endpoint(&["sensors", raw_id, "values"]);
        url.query_pairs_mut()
            .append_pair("start", &start.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("end", &end.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("period", period.as_query());

        let response = self.get_json(url).await?;
        Ok(parse_values(raw_id, &response))
    }
}

/// Decode a device listing, skipping entries that do not parse.
pub fn parse_devices(response: &Value) -> Vec<Device> {
    // ---
    let Some(items) = response.as_array() else {
        debug!("Device listing is not an array: {}", response);
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value::<Device>(item.clone()) {
            Ok(device) => Some(device),
            Err(e) => {
                debug!("Failed to parse device {}: {} - Raw item: {}", i, e, item);
                None
            }
        })
        .collect()
}

/// Decode a `{"results": [{"timestamp": ms, "value": ..}]}` body.
///
/// Values may be numbers, numeric strings, empty strings or null; anything
/// non-numeric becomes a missing value. Items without a usable timestamp are
/// skipped.
pub fn parse_values(raw_id: &str, response: &Value) -> Vec<RawSample> {
    // ---
    let Some(items) = response.get("results").and_then(|d| d.as_array()) else {
        debug!("Sensor {} response missing 'results' field or not an array", raw_id);
        return Vec::new();
    };

    let mut samples = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let timestamp = item
            .get("timestamp")
            .and_then(Value::as_i64)
            .and_then(DateTime::from_timestamp_millis);
        let Some(timestamp) = timestamp else {
            debug!("Sensor {} item {} has no valid timestamp - Raw item: {}", raw_id, i, item);
            continue;
        };

        let value = match item.get("value") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite());

        samples.push(RawSample {
            sensor_id: raw_id.to_string(),
            timestamp,
            value,
        });
    }
    samples
}

/// Turn the devices reported on into uniquely named channels.
///
/// pH sensors are kept when they belong to `farm` and are named after their
/// house and device kind. Water meters are picked company-wide, by the
/// `sensor_filter` substring of their sensor name when one is given.
pub fn select_channels(
    devices: &[Device],
    farm: &str,
    value_type: ValueType,
    sensor_filter: Option<&str>,
) -> Vec<SensorChannel> {
    // ---
    let mut seen = HashSet::new();
    let mut channels = Vec::new();

    for device in devices {
        let label = match value_type {
            ValueType::Ph => {
                if device.farm_name != farm {
                    continue;
                }
                device.kind_label()
            }
            ValueType::Water => {
                if let Some(filter) = sensor_filter {
                    if !device.sensor_name.contains(filter) {
                        continue;
                    }
                }
                device.short_name()
            }
        };

        let mut name = match device.house() {
            "" => label.to_string(),
            house => format!("{} - {}", house, label),
        };
        if !seen.insert(name.clone()) {
            name = format!("{} ({})", name, device.raw_id);
            seen.insert(name.clone());
        }

        channels.push(SensorChannel {
            raw_id: device.raw_id.clone(),
            name,
            kind: SensorKind::resolve(value_type, &device.sensor_name),
        });
    }
    channels
}

/// Fetch every channel's series, one request after another.
///
/// Fails with [`ReportError::NoData`] when no channel returned a usable
/// value; samples that are all null count as no data.
pub async fn fetch_series(
    api: &SensorApi,
    channels: &[SensorChannel],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    period: Period,
) -> Result<Vec<SensorSeries>> {
    // ---
    if channels.is_empty() {
        return Err(ReportError::NoData("no matching sensors found".into()));
    }

    let mut all_series = Vec::with_capacity(channels.len());
    for channel in channels {
        let samples = api.sensor_values(&channel.raw_id, start, end, period).await?;
        if samples.is_empty() {
            warn!("Sensor {} ({}) returned no samples", channel.name, channel.raw_id);
        } else {
            debug!("Sensor {} returned {} samples", channel.name, samples.len());
        }
        all_series.push(SensorSeries {
            channel: channel.clone(),
            samples,
        });
    }

    let total: usize = all_series.iter().map(|s| s.samples.len()).sum();
    let with_value = all_series
        .iter()
        .flat_map(|s| s.samples.iter())
        .filter(|sample| sample.value.is_some())
        .count();
    if with_value == 0 {
        return Err(ReportError::NoData(format!(
            "{} sensors returned {} samples but no values between {start} and {end}",
            channels.len(),
            total
        )));
    }

    info!(
        "Finished fetching {} total samples ({} with values) from {} sensors",
        total,
        with_value,
        channels.len()
    );
    Ok(all_series)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn create_test_device(raw_id: &str, sensor: &str, barn: &str, farm: &str) -> Device {
        // ---
        Device {
            raw_id: raw_id.to_string(),
            sensor_name: sensor.to_string(),
            barn_name: barn.to_string(),
            farm_name: farm.to_string(),
            kind: "pH".to_string(),
        }
    }

    #[test]
    fn test_parse_values_mixed_types() {
        // ---
        let body = json!({"results": [
            {"timestamp": 1_640_995_200_000_i64, "value": 5.8},
            {"timestamp": 1_640_998_800_000_i64, "value": "6.1"},
            {"timestamp": 1_641_002_400_000_i64, "value": ""},
            {"timestamp": 1_641_006_000_000_i64, "value": null},
            {"value": 7.0},
        ]});

        let samples = parse_values("dev-1", &body);

        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0].value, Some(5.8));
        assert_eq!(samples[1].value, Some(6.1));
        assert_eq!(samples[2].value, None);
        assert_eq!(samples[3].value, None);
        assert_eq!(
            samples[0].timestamp,
            Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(samples.iter().all(|s| s.sensor_id == "dev-1"));
    }

    #[test]
    fn test_parse_values_without_results() {
        // ---
        assert!(parse_values("dev-1", &json!({"data": []})).is_empty());
        assert!(parse_values("dev-1", &json!([])).is_empty());
    }

    #[test]
    fn test_parse_devices_skips_broken_items() {
        // ---
        let body = json!([
            {"raw_id": "a", "sensorName": "pH", "barnName": "F|G05", "farmName": "F", "kind": "pH"},
            {"sensorName": "no id"},
        ]);
        let devices = parse_devices(&body);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].raw_id, "a");
        assert_eq!(devices[0].house(), "G05");
    }

    #[test]
    fn test_select_channels_filters_and_names() {
        // ---
        let devices = vec![
            create_test_device("a", "pH", "Huevos Oro|G05", "Huevos Oro"),
            create_test_device("b", "pH", "Otra|G01", "Otra"),
            create_test_device("c", "pH", "Huevos Oro|G05", "Huevos Oro"),
            create_test_device("d", "pH", "", "Huevos Oro"),
        ];

        let channels = select_channels(&devices, "Huevos Oro", ValueType::Ph, None);

        let names: Vec<&str> = channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["G05 - pH", "G05 - pH (c)", "pH"]);
        assert!(channels.iter().all(|c| c.kind == SensorKind::PH));
    }

    #[test]
    fn test_select_channels_sensor_filter() {
        // ---
        let devices = vec![
            create_test_device("a", "Consumo Agua - Total Minuto Galones", "P|Planta", "P"),
            create_test_device("b", "Consumo Agua - Total Hora Galones", "P|Planta", "P"),
        ];

        let channels = select_channels(&devices, "P", ValueType::Water, Some("Min"));

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].raw_id, "a");
        assert_eq!(channels[0].kind, SensorKind::WaterVolumeGallons);
    }

    #[test]
    fn test_ph_channels_named_after_device_kind() {
        // ---
        let devices = vec![create_test_device("a", "Sonda 7", "Huevos Oro|G01", "Huevos Oro")];

        let channels = select_channels(&devices, "Huevos Oro", ValueType::Ph, None);

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "G01 - pH");
    }

    #[test]
    fn test_water_channels_ignore_farm() {
        // ---
        let devices = vec![
            create_test_device(
                "w",
                "Planta|Consumo Agua - Total Minuto Galones",
                "Planta de produccion|Planta",
                "Planta de produccion",
            ),
            create_test_device("p", "pH", "Huevos Oro|G01", "Huevos Oro"),
        ];

        let water = select_channels(&devices, "Huevos Oro", ValueType::Water, Some("Min"));
        assert_eq!(water.len(), 1);
        assert_eq!(water[0].raw_id, "w");
        assert_eq!(water[0].name, "Planta - Consumo Agua - Total Minuto Galones");

        let unfiltered = select_channels(&devices, "Huevos Oro", ValueType::Water, None);
        assert_eq!(unfiltered.len(), 2);
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        // ---
        let cfg = Config {
            api_url: "http://api.local/v1".to_string(),
            api_token: None,
            utc_offset: chrono::FixedOffset::east_opt(0).unwrap(),
            output_dir: ".".into(),
        };
        let api = SensorApi::new(&cfg).unwrap();
        let url = api.endpoint(&["companies", "DON POLLO", "devices"]);
        assert_eq!(url.as_str(), "http://api.local/v1/companies/DON%20POLLO/devices");
    }
}
