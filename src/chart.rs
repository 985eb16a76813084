//! Chart objects and the pure functions that build them.
//!
//! A [`Chart`] serializes to a Plotly figure (`{"data": [...], "layout": {...}}`)
//! which the report page hands to plotly.js. Only static configuration is
//! produced: traces, axes, titles and bands.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::aggregate::{Delta, RangeShare};
use crate::descriptor::Thresholds;
use crate::models::{AggregateRow, BucketKey, NormalizedReading};
use crate::reshape::month_name;

// ---

const BAND_LINE: &str = "rgba(0, 177, 106, 0.5)";
const ALERT_FILL: &str = "rgba(255,69,0, 0.13)";
const OPTIMUM_FILL: &str = "rgba(0, 177, 106, 0.13)";
const STD_LINE: &str = "rgba(0,150,136 ,0.4)";
const STD_FILL: &str = "rgba(0, 177, 106, 0.15)";

/// Daily compliance target, in percent.
pub const COMPLIANCE_TARGET: f64 = 80.0;

/// A Plotly figure.
#[derive(Debug, Clone, Serialize)]
pub struct Chart {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Scatter(Scatter),
    Box(BoxTrace),
    Bar(Bar),
    Indicator(Indicator),
}

/// X coordinate: numeric (hour of day) or textual (timestamps, labels).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AxisValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Line {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Scatter {
    pub x: Vec<AxisValue>,
    pub y: Vec<Option<f64>>,
    pub mode: &'static str,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legendgroup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showlegend: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectgaps: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Line>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillcolor: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hovertemplate: Option<String>,
}

impl Scatter {
    pub fn lines(name: impl Into<String>, x: Vec<AxisValue>, y: Vec<Option<f64>>) -> Self {
        Self {
            x,
            y,
            mode: "lines",
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.legendgroup = Some(group.into());
        self
    }

    pub fn hover(mut self, template: impl Into<String>) -> Self {
        self.hovertemplate = Some(template.into());
        self
    }

    pub fn dashed(mut self, color: &'static str) -> Self {
        self.line = Some(Line {
            dash: Some("dash"),
            color: Some(color),
            width: None,
        });
        self
    }

    pub fn thin(mut self, color: &'static str) -> Self {
        self.line = Some(Line {
            dash: None,
            color: Some(color),
            width: Some(1.0),
        });
        self
    }

    /// Shade the area between this trace and the previous one.
    pub fn fill_to_previous(mut self, color: &'static str) -> Self {
        self.fill = Some("tonexty");
        self.fillcolor = Some(color);
        self
    }

    pub fn without_legend(mut self) -> Self {
        self.showlegend = Some(false);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoxTrace {
    pub x: Vec<AxisValue>,
    pub y: Vec<Option<f64>>,
    pub boxmean: bool,
    pub boxpoints: &'static str,
    pub showlegend: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bar {
    pub x: Vec<AxisValue>,
    pub y: Vec<Option<f64>>,
    pub name: String,
    pub hovertemplate: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NumberFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Domain {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct GaugeAxis {
    pub range: [Option<f64>; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct GaugeBar {
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Gauge {
    pub axis: GaugeAxis,
    pub bar: GaugeBar,
}

#[derive(Debug, Clone, Serialize)]
pub struct Indicator {
    pub mode: &'static str,
    pub value: f64,
    pub number: NumberFormat,
    pub domain: Domain,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gauge: Option<Gauge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
}

impl Title {
    fn new(text: impl Into<String>) -> Option<Self> {
        Some(Self { text: text.into() })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showspikes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoryorder: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoryarray: Option<Vec<String>>,
}

impl Axis {
    fn titled(text: impl Into<String>) -> Option<Self> {
        Some(Self {
            title: Title::new(text),
            showspikes: Some(true),
            ..Self::default()
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Shape {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub xref: &'static str,
    pub yref: &'static str,
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
    pub line: Line,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Layout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<Legend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper_bgcolor: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shapes: Vec<Shape>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Legend {
    pub title: Title,
}

impl Layout {
    fn standard(title: impl Into<String>, x_title: &str, y_title: &str, legend: &str) -> Self {
        Self {
            title: Title::new(title),
            width: Some(850),
            xaxis: Axis::titled(x_title),
            yaxis: Axis::titled(y_title),
            legend: Some(Legend {
                title: Title {
                    text: legend.to_string(),
                },
            }),
            ..Self::default()
        }
    }
}

fn time_label(t: &DateTime<FixedOffset>) -> AxisValue {
    AxisValue::Text(t.format("%Y-%m-%d %H:%M").to_string())
}

/// Axis label of an aggregation bucket.
pub fn bucket_label(key: &BucketKey) -> AxisValue {
    match key {
        BucketKey::Hour(h) => AxisValue::Number(f64::from(*h)),
        BucketKey::Date(d) => AxisValue::Text(d.format("%Y-%m-%d").to_string()),
        BucketKey::Week { year, week } => AxisValue::Text(format!("{year}-S{week:02}")),
        BucketKey::Month { year, month } => AxisValue::Text(format!("{}-{}", month_name(*month), year)),
    }
}

fn month_label(year: i32, month: u32) -> String {
    format!("{}-{}", month_name(month), year)
}

fn by_sensor(rows: &[AggregateRow]) -> BTreeMap<&str, Vec<&AggregateRow>> {
    let mut grouped: BTreeMap<&str, Vec<&AggregateRow>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.sensor_name.as_str()).or_default().push(row);
    }
    grouped
}

/// Flat dashed line over `[first, last]`, shaded down to the previous trace when `fill` is set.
fn band_edge(
    name: &str,
    group: &str,
    span: &[AxisValue],
    y: f64,
    fill: Option<&'static str>,
    hover: &str,
) -> Trace {
    // ---
    let trace = Scatter::lines(name, span.to_vec(), vec![Some(y); span.len()])
        .dashed(BAND_LINE)
        .group(group)
        .hover(hover);
    let trace = match fill {
        Some(color) => trace.fill_to_previous(color),
        None => trace.without_legend(),
    };
    Trace::Scatter(trace)
}

/// pH readings per sensor over time, with dashed alert and standard bands.
pub fn ph_levels(readings: &[NormalizedReading], thresholds: &Thresholds) -> Chart {
    // ---
    let mut per_sensor: BTreeMap<&str, (Vec<AxisValue>, Vec<Option<f64>>)> = BTreeMap::new();
    for r in readings {
        let (x, y) = per_sensor.entry(r.sensor_name.as_str()).or_default();
        x.push(time_label(&r.timestamp));
        y.push(r.value);
    }

    let mut data: Vec<Trace> = per_sensor
        .into_iter()
        .map(|(name, (x, y))| {
            let mut line = Scatter::lines(name, x, y)
                .group(format!("H{name}"))
                .hover("pH: %{y:.2f}<br>Fecha y hora: %{x}");
            line.connectgaps = Some(false);
            Trace::Scatter(line)
        })
        .collect();

    let first = readings.iter().map(|r| r.timestamp).min();
    let last = readings.iter().map(|r| r.timestamp).max();
    if let (Some(first), Some(last)) = (first, last) {
        let span = [time_label(&first), time_label(&last)];
        data.push(band_edge("pH alerta", "alerta", &span, thresholds.min_alert, None, "pH alerta min: %{y:.2f}"));
        data.push(band_edge("pH alerta", "alerta", &span, thresholds.max_alert, Some(ALERT_FILL), "pH alerta max: %{y:.2f}"));
        data.push(band_edge("pH óptimo", "optimo", &span, thresholds.min_standard, None, "pH mínimo: %{y:.2f}"));
        data.push(band_edge("pH óptimo", "optimo", &span, thresholds.max_standard, Some(OPTIMUM_FILL), "pH máximo: %{y:.2f}"));
    }

    Chart {
        data,
        layout: Layout::standard("pH Diario", "Fecha", "pH", "Sensores"),
    }
}

/// Hour-to-hour pH change per sensor with a ±2σ band.
pub fn ph_variation(deltas: &BTreeMap<String, Vec<Delta>>, mean_std: Option<f64>, farm: &str) -> Chart {
    // ---
    let mut data: Vec<Trace> = deltas
        .iter()
        .map(|(name, points)| {
            let x = points.iter().map(|d| time_label(&d.timestamp)).collect();
            let y = points.iter().map(|d| d.change).collect();
            Trace::Scatter(
                Scatter::lines(name.clone(), x, y)
                    .group(name.clone())
                    .hover("Variación de pH: %{y:.2f}<br>Fecha y hora: %{x}"),
            )
        })
        .collect();

    let span: Vec<AxisValue> = deltas
        .values()
        .flat_map(|points| points.iter().map(|d| d.timestamp))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|t| time_label(&t))
        .collect();

    if let (Some(std), false) = (mean_std, span.is_empty()) {
        let edge = [span[0].clone(), span[span.len() - 1].clone()];
        let lower = Scatter::lines("2 desviaciones estandar", edge.to_vec(), vec![Some(-2.0 * std); 2])
            .dashed(STD_LINE)
            .group("optimo")
            .without_legend();
        let upper = Scatter::lines("2 desviaciones estandar", edge.to_vec(), vec![Some(2.0 * std); 2])
            .dashed(STD_LINE)
            .group("optimo")
            .fill_to_previous(STD_FILL);
        data.push(Trace::Scatter(lower));
        data.push(Trace::Scatter(upper));
    }

    let mut layout = Layout::standard(format!("Variación pH - {farm}."), "Fecha", "Delta pH", "Sensores");
    layout.legend = None;
    Chart { data, layout }
}

/// Mean value per hour of day per sensor, with a mean ± std band.
pub fn hourly_profile(rows: &[AggregateRow], unit: &str) -> Chart {
    // ---
    let mut data = Vec::new();
    for (name, rows) in by_sensor(rows) {
        let x: Vec<AxisValue> = rows.iter().map(|r| bucket_label(&r.time_bucket)).collect();
        let mean: Vec<Option<f64>> = rows.iter().map(|r| r.mean).collect();
        let upper = rows
            .iter()
            .map(|r| Some(r.mean? + r.std.unwrap_or(0.0)))
            .collect();
        let lower = rows
            .iter()
            .map(|r| Some(r.mean? - r.std.unwrap_or(0.0)))
            .collect();

        data.push(Trace::Scatter(
            Scatter::lines(name, x.clone(), mean)
                .group(format!("H{name}"))
                .hover(format!("{unit} promedio: %{{y:.2f}}<br>Hora: %{{x}}")),
        ));
        data.push(Trace::Scatter(
            Scatter::lines("Desviación estandar", x.clone(), upper)
                .thin(BAND_LINE)
                .group(format!("std {name}"))
                .without_legend(),
        ));
        data.push(Trace::Scatter(
            Scatter::lines(format!("+o- una desvest {name}"), x, lower)
                .thin(BAND_LINE)
                .group(format!("std {name}"))
                .fill_to_previous("rgba(0, 177, 106, 0.18)"),
        ));
    }

    Chart {
        data,
        layout: Layout::standard(format!("{unit} por horas"), "horas", unit, "Sensores"),
    }
}

/// Big-number indicator of the overall mean.
pub fn mean_indicator(mean: f64, days: usize, unit: &str) -> Chart {
    // ---
    let indicator = Indicator {
        mode: "number",
        value: mean,
        number: NumberFormat {
            prefix: Some(format!("{unit} ")),
            suffix: None,
        },
        domain: Domain {
            x: [0.0, 1.0],
            y: [0.0, 1.0],
        },
        title: None,
        gauge: None,
    };
    Chart {
        data: vec![Trace::Indicator(indicator)],
        layout: Layout {
            title: Title::new(format!("Valor de {unit} promedio de {days} días.")),
            width: Some(400),
            height: Some(400),
            paper_bgcolor: Some("lightgray"),
            ..Layout::default()
        },
    }
}

/// One gauge per sensor with the percentage of time in the comfort range.
pub fn in_range_gauge(shares: &[RangeShare], thresholds: &Thresholds) -> Chart {
    // ---
    let n = shares.len().max(1) as f64;
    let data = shares
        .iter()
        .enumerate()
        .map(|(i, share)| {
            let text = if shares.len() > 1 {
                format!("{} dentro del pH óptimo", share.sensor_name)
            } else {
                "Porcentaje dentro del pH óptimo".to_string()
            };
            Trace::Indicator(Indicator {
                mode: "gauge+number",
                value: share.percent,
                number: NumberFormat {
                    prefix: None,
                    suffix: Some("%".to_string()),
                },
                domain: Domain {
                    x: [i as f64 / n, (i + 1) as f64 / n],
                    y: [0.0, 1.0],
                },
                title: Title::new(text),
                gauge: Some(Gauge {
                    axis: GaugeAxis {
                        range: [None, Some(100.0)],
                    },
                    bar: GaugeBar { color: "darkblue" },
                }),
            })
        })
        .collect();

    Chart {
        data,
        layout: Layout {
            title: Title::new(format!(
                "Porcentaje del tiempo en el rango de pH ideal ({} - {})",
                thresholds.min_standard, thresholds.max_standard
            )),
            width: Some(600),
            height: Some(500),
            ..Layout::default()
        },
    }
}

/// Daily percentage of readings in range, per sensor, against the target line.
pub fn daily_compliance(shares: &[RangeShare], thresholds: &Thresholds) -> Chart {
    // ---
    let mut per_sensor: BTreeMap<&str, (Vec<AxisValue>, Vec<Option<f64>>)> = BTreeMap::new();
    for share in shares {
        let Some(date) = share.date else {
            continue;
        };
        let (x, y) = per_sensor.entry(share.sensor_name.as_str()).or_default();
        x.push(AxisValue::Text(date.format("%Y-%m-%d").to_string()));
        y.push(Some(share.percent));
    }

    let data = per_sensor
        .into_iter()
        .map(|(name, (x, y))| Trace::Scatter(Scatter::lines(name, x, y).hover("Tiempo (%): %{y:.1f}<br>Fecha: %{x}")))
        .collect();

    let mut layout = Layout::standard(
        format!(
            "Tiempo entre {} y {} de pH (%)",
            thresholds.min_standard, thresholds.max_standard
        ),
        "Fecha",
        "Tiempo (%)",
        "Sensores",
    );
    if let Some(y) = layout.yaxis.as_mut() {
        y.range = Some([0.0, 100.0]);
    }
    layout.shapes.push(Shape {
        kind: "line",
        xref: "paper",
        yref: "y",
        x0: 0.0,
        x1: 1.0,
        y0: COMPLIANCE_TARGET,
        y1: COMPLIANCE_TARGET,
        line: Line {
            dash: Some("dot"),
            color: Some("green"),
            width: Some(3.0),
        },
    });
    Chart { data, layout }
}

/// Box per calendar month, months in chronological order.
pub fn monthly_box(readings: &[NormalizedReading], unit: &str) -> Chart {
    // ---
    let months: BTreeSet<(i32, u32)> = readings.iter().map(|r| (r.year, r.month)).collect();
    let trace = BoxTrace {
        x: readings
            .iter()
            .map(|r| AxisValue::Text(month_label(r.year, r.month)))
            .collect(),
        y: readings.iter().map(|r| r.value).collect(),
        boxmean: true,
        boxpoints: "suspectedoutliers",
        showlegend: false,
    };

    let mut layout = Layout::standard(format!("{unit} cada mes"), "Meses", unit, "");
    layout.width = Some(800);
    if let Some(x) = layout.xaxis.as_mut() {
        x.categoryorder = Some("array");
        x.categoryarray = Some(months.into_iter().map(|(y, m)| month_label(y, m)).collect());
    }
    Chart {
        data: vec![Trace::Box(trace)],
        layout,
    }
}

/// Consumption totals per bucket, one line per sensor.
///
/// `units` maps sensor names to their unit label for the legend.
pub fn consumption_lines(
    rows: &[AggregateRow],
    units: &BTreeMap<String, &'static str>,
    title: &str,
    x_title: &str,
) -> Chart {
    // ---
    let data = by_sensor(rows)
        .into_iter()
        .map(|(name, rows)| {
            let unit = units.get(name).copied().unwrap_or("");
            let x = rows.iter().map(|r| bucket_label(&r.time_bucket)).collect();
            let y = rows.iter().map(|r| (r.count > 0).then_some(r.sum)).collect();
            Trace::Scatter(
                Scatter::lines(format!("{name} ({unit})"), x, y)
                    .group(format!("H{name}"))
                    .hover(format!("{unit}: %{{y:.2f}}<br>{x_title}: %{{x}}")),
            )
        })
        .collect();

    let mut layout = Layout::standard(title, x_title, "Consumo", "Líneas");
    layout.width = Some(800);
    Chart { data, layout }
}

/// Monthly consumption bars, one series per sensor.
pub fn monthly_consumption_bars(
    rows: &[AggregateRow],
    units: &BTreeMap<String, &'static str>,
    title: &str,
) -> Chart {
    // ---
    let months: BTreeSet<BucketKey> = rows.iter().map(|r| r.time_bucket).collect();
    let data = by_sensor(rows)
        .into_iter()
        .map(|(name, rows)| {
            let unit = units.get(name).copied().unwrap_or("");
            Trace::Bar(Bar {
                x: rows.iter().map(|r| bucket_label(&r.time_bucket)).collect(),
                y: rows.iter().map(|r| (r.count > 0).then_some(r.sum)).collect(),
                name: format!("{name} ({unit})"),
                hovertemplate: format!("{unit}: %{{y:.2f}}<br>Mes: %{{x}}"),
            })
        })
        .collect();

    let mut layout = Layout::standard(title, "Mes del año", "Consumo", "Líneas");
    layout.width = Some(800);
    if let Some(x) = layout.xaxis.as_mut() {
        x.categoryorder = Some("array");
        x.categoryarray = Some(
            months
                .iter()
                .filter_map(|k| match bucket_label(k) {
                    AxisValue::Text(label) => Some(label),
                    AxisValue::Number(_) => None,
                })
                .collect(),
        );
    }
    Chart { data, layout }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::aggregate::{aggregate, successive_deltas};
    use crate::models::{Bucket, SensorKind};
    use chrono::{Datelike, Duration, NaiveDate, TimeZone, Timelike};
    use serde_json::json;

    fn create_test_readings(sensor: &str, hours: i64, value: f64) -> Vec<NormalizedReading> {
        // ---
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let start = offset.with_ymd_and_hms(2021, 12, 30, 0, 0, 0).unwrap();
        (0..hours)
            .map(|h| {
                let timestamp = start + Duration::hours(h);
                NormalizedReading {
                    timestamp,
                    sensor_name: sensor.to_string(),
                    kind: SensorKind::PH,
                    value: Some(value + (h % 3) as f64 * 0.1),
                    date: timestamp.date_naive(),
                    hour: timestamp.hour(),
                    week: 0,
                    month: timestamp.month(),
                    year: timestamp.year(),
                }
            })
            .collect()
    }

    #[test]
    fn test_ph_levels_has_line_per_sensor_and_bands() {
        // ---
        let mut readings = create_test_readings("G05 - pH", 10, 5.6);
        readings.extend(create_test_readings("G06 - pH", 10, 5.9));

        let chart = ph_levels(&readings, &Thresholds::default());
        let v = serde_json::to_value(&chart).unwrap();

        let traces = v["data"].as_array().unwrap();
        assert_eq!(traces.len(), 2 + 4);
        assert_eq!(traces[0]["type"], "scatter");
        assert_eq!(traces[0]["name"], "G05 - pH");
        assert_eq!(traces[0]["y"].as_array().unwrap().len(), 10);
        assert_eq!(traces[2]["line"]["dash"], "dash");
        assert_eq!(traces[3]["fill"], "tonexty");
        assert_eq!(traces[5]["y"], json!([6.0, 6.0]));
        assert_eq!(v["layout"]["title"]["text"], "pH Diario");
    }

    #[test]
    fn test_ph_levels_without_readings_has_no_bands() {
        // ---
        let chart = ph_levels(&[], &Thresholds::default());
        assert!(chart.data.is_empty());
    }

    #[test]
    fn test_missing_values_serialize_as_null() {
        // ---
        let mut readings = create_test_readings("a", 3, 5.0);
        readings[1].value = None;

        let v = serde_json::to_value(ph_levels(&readings, &Thresholds::default())).unwrap();
        assert!(v["data"][0]["y"][1].is_null());
    }

    #[test]
    fn test_ph_variation_band() {
        // ---
        let readings = create_test_readings("a", 5, 5.0);
        let deltas = successive_deltas(&readings);

        let chart = ph_variation(&deltas, Some(0.25), "Planta");
        let v = serde_json::to_value(&chart).unwrap();

        assert_eq!(chart.data.len(), 3);
        assert!(v["data"][0]["y"][0].is_null());
        assert_eq!(v["data"][1]["y"], json!([-0.5, -0.5]));
        assert_eq!(v["data"][2]["y"], json!([0.5, 0.5]));
        assert_eq!(v["layout"]["title"]["text"], "Variación pH - Planta.");
    }

    #[test]
    fn test_hourly_profile_traces() {
        // ---
        let readings = create_test_readings("a", 48, 5.0);
        let rows = aggregate(&readings, Bucket::HourOfDay);

        let chart = hourly_profile(&rows, "pH");
        let v = serde_json::to_value(&chart).unwrap();

        assert_eq!(chart.data.len(), 3);
        assert_eq!(v["data"][0]["x"].as_array().unwrap().len(), 24);
        assert_eq!(v["data"][0]["x"][0], json!(0.0));
    }

    #[test]
    fn test_gauge_and_indicator() {
        // ---
        let share = RangeShare {
            sensor_name: "a".into(),
            date: None,
            percent: 88.5,
            count: 10,
        };
        let gauge = serde_json::to_value(in_range_gauge(&[share], &Thresholds::default())).unwrap();
        assert_eq!(gauge["data"][0]["type"], "indicator");
        assert_eq!(gauge["data"][0]["mode"], "gauge+number");
        assert_eq!(gauge["data"][0]["value"], json!(88.5));
        assert_eq!(gauge["data"][0]["gauge"]["axis"]["range"], json!([null, 100.0]));
        assert_eq!(
            gauge["layout"]["title"]["text"],
            "Porcentaje del tiempo en el rango de pH ideal (5.5 - 6)"
        );

        let indicator = serde_json::to_value(mean_indicator(5.75, 12, "pH")).unwrap();
        assert_eq!(indicator["data"][0]["number"]["prefix"], "pH ");
        assert_eq!(indicator["layout"]["title"]["text"], "Valor de pH promedio de 12 días.");
    }

    #[test]
    fn test_daily_compliance_target_line() {
        // ---
        let shares = vec![RangeShare {
            sensor_name: "a".into(),
            date: NaiveDate::from_ymd_opt(2022, 1, 1),
            percent: 75.0,
            count: 24,
        }];

        let v = serde_json::to_value(daily_compliance(&shares, &Thresholds::default())).unwrap();

        assert_eq!(v["layout"]["shapes"][0]["y0"], json!(COMPLIANCE_TARGET));
        assert_eq!(v["layout"]["yaxis"]["range"], json!([0.0, 100.0]));
        assert_eq!(v["data"][0]["x"], json!(["2022-01-01"]));
    }

    #[test]
    fn test_bucket_labels() {
        // ---
        assert_eq!(bucket_label(&BucketKey::Hour(7)), AxisValue::Number(7.0));
        assert_eq!(
            bucket_label(&BucketKey::Week { year: 2022, week: 1 }),
            AxisValue::Text("2022-S01".to_string())
        );
        assert_eq!(
            bucket_label(&BucketKey::Month { year: 2021, month: 12 }),
            AxisValue::Text("Diciembre-2021".to_string())
        );
    }

    #[test]
    fn test_monthly_box_orders_months() {
        // ---
        let readings = create_test_readings("a", 72, 5.0);

        let v = serde_json::to_value(monthly_box(&readings, "pH")).unwrap();

        assert_eq!(v["data"][0]["type"], "box");
        assert_eq!(
            v["layout"]["xaxis"]["categoryarray"],
            json!(["Diciembre-2021", "Enero-2022"])
        );
    }

    #[test]
    fn test_consumption_charts() {
        // ---
        let readings = create_test_readings("agua", 72, 10.0);
        let units = BTreeMap::from([("agua".to_string(), "litros")]);

        let daily = aggregate(&readings, Bucket::Day);
        let lines = serde_json::to_value(consumption_lines(&daily, &units, "Consumos diarios", "Fecha")).unwrap();
        assert_eq!(lines["data"][0]["name"], "agua (litros)");
        assert_eq!(lines["data"][0]["x"].as_array().unwrap().len(), 3);

        let monthly = aggregate(&readings, Bucket::Month);
        let bars = serde_json::to_value(monthly_consumption_bars(&monthly, &units, "Consumo mensual")).unwrap();
        assert_eq!(bars["data"][0]["type"], "bar");
        assert_eq!(bars["data"][0]["x"], json!(["Diciembre-2021", "Enero-2022"]));
    }
}
