//! One report run: fetch, reshape, aggregate, render, write.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::aggregate::{
    aggregate, daily_percent_in_range, mean_sensor_std, measured_days, overall_mean,
    percent_in_range, successive_deltas, suppress_outliers, OutlierRule,
};
use crate::chart::{self, bucket_label, AxisValue};
use crate::config::Config;
use crate::descriptor::RunDescriptor;
use crate::error::{ReportError, Result};
use crate::fetch::{fetch_series, select_channels, SensorApi};
use crate::models::{
    AggregateRow, Bucket, NormalizedReading, SensorKind, ValueType, LITERS_PER_CUBIC_METER,
    PRODUCT_DENSITY,
};
use crate::report::{render_html, write_report, ReportSection, SectionBody, Table};
use crate::reshape::reshape;

// ---

/// Meter glitches on the dosing lines, in kilograms.
pub const WATER_OUTLIERS: &[OutlierRule] = &[
    OutlierRule {
        sensor: "Inhisalm-Pluma-Total Hora",
        ceiling: 250.0 * PRODUCT_DENSITY,
    },
    OutlierRule {
        sensor: "Inhisalm salida prensa carne y hueso Total Hora",
        ceiling: 200.0 * PRODUCT_DENSITY,
    },
];

/// Run the whole pipeline and return the path of the written report.
///
/// `now` closes open-ended ranges and dates the output file.
#[instrument(skip_all, fields(report = %descriptor.report_name))]
pub async fn run(cfg: &Config, descriptor: &RunDescriptor, now: DateTime<Utc>) -> Result<PathBuf> {
    // ---
    let api = SensorApi::new(cfg)?;
    let (start, end) = descriptor.time_range(cfg.utc_offset, now)?;
    info!(
        "Reporting {} from {} to {} ({:?})",
        descriptor.heading(),
        start,
        end,
        descriptor.kind
    );

    let mut sections = Vec::new();

    if descriptor.kind.includes_ph() {
        let readings = collect_readings(&api, cfg, descriptor, ValueType::Ph, start, end).await?;
        sections.extend(ph_sections(&readings, descriptor));
    }

    if descriptor.kind.includes_water() {
        let mut readings = collect_readings(&api, cfg, descriptor, ValueType::Water, start, end).await?;
        let suppressed = suppress_outliers(&mut readings, WATER_OUTLIERS);
        if suppressed > 0 {
            warn!("{} water readings above their ceiling were dropped", suppressed);
        }
        sections.extend(water_sections(&readings));
    }

    let today = now.with_timezone(&cfg.utc_offset).date_naive();
    let html = render_html(&descriptor.heading(), today, &sections)?;
    info!("Rendered {} sections", sections.len());

    write_report(&cfg.output_dir, &descriptor.report_name, today, &html)
}

async fn collect_readings(
    api: &SensorApi,
    cfg: &Config,
    descriptor: &RunDescriptor,
    value_type: ValueType,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<NormalizedReading>> {
    // ---
    let devices = api.list_devices(&descriptor.company, value_type).await?;
    let filter = match value_type {
        ValueType::Water => descriptor.sensor_filter.as_deref(),
        ValueType::Ph => None,
    };
    let channels = select_channels(&devices, &descriptor.farm, value_type, filter);
    info!(
        "Farm {} has {} {} sensors",
        descriptor.farm,
        channels.len(),
        value_type.as_query()
    );

    let series = fetch_series(api, &channels, start, end, descriptor.period).await?;
    let readings = reshape(&series, cfg.utc_offset);
    if readings.iter().all(|r| r.value.is_none()) {
        return Err(ReportError::NoData(format!(
            "no usable {} values for {}",
            value_type.as_query(),
            descriptor.heading()
        )));
    }
    info!("Reshaped into {} readings", readings.len());
    Ok(readings)
}

fn fmt_value(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

fn fmt_label(label: AxisValue) -> String {
    match label {
        AxisValue::Number(n) => format!("{n}"),
        AxisValue::Text(t) => t,
    }
}

fn ph_sections(readings: &[NormalizedReading], descriptor: &RunDescriptor) -> Vec<ReportSection> {
    // ---
    let thresholds = &descriptor.thresholds;
    let mut sections = Vec::new();

    let days = measured_days(readings);
    let mean = match overall_mean(readings) {
        Some(mean) => SectionBody::Chart(chart::mean_indicator(mean, days, "pH")),
        None => SectionBody::Missing,
    };
    sections.push(ReportSection::new("pH promedio", mean).compact());

    let shares = percent_in_range(readings, thresholds);
    let gauge = if shares.is_empty() {
        SectionBody::Missing
    } else {
        SectionBody::Chart(chart::in_range_gauge(&shares, thresholds))
    };
    sections.push(ReportSection::new("Tiempo en rango", gauge).compact());

    sections.push(
        ReportSection::new("pH Diario", SectionBody::Chart(chart::ph_levels(readings, thresholds)))
            .with_subtitle(format!(
                "Rango óptimo {} - {}, alerta {} - {}",
                thresholds.min_standard, thresholds.max_standard, thresholds.min_alert, thresholds.max_alert
            )),
    );

    let daily = daily_percent_in_range(readings, thresholds);
    sections.push(
        ReportSection::new(
            "Cumplimiento diario",
            SectionBody::Chart(chart::daily_compliance(&daily, thresholds)),
        )
        .with_text(format!(
            "Porcentaje del día con pH entre {} y {}. La línea punteada marca el objetivo de {}%.",
            thresholds.min_standard,
            thresholds.max_standard,
            chart::COMPLIANCE_TARGET
        )),
    );

    let hourly = aggregate(readings, Bucket::HourOfDay);
    sections.push(ReportSection::new(
        "pH por horas",
        SectionBody::Chart(chart::hourly_profile(&hourly, "pH")),
    ));

    let deltas = successive_deltas(readings);
    sections.push(
        ReportSection::new(
            "Variación de pH",
            SectionBody::Chart(chart::ph_variation(&deltas, mean_sensor_std(readings), &descriptor.farm)),
        )
        .with_text("Cambio entre lecturas consecutivas; la banda marca dos desviaciones estándar."),
    );

    sections.push(ReportSection::new(
        "pH mensual",
        SectionBody::Chart(chart::monthly_box(readings, "pH")),
    ));

    sections.push(ReportSection::new(
        "Resumen semanal",
        SectionBody::Table(weekly_ph_table(&aggregate(readings, Bucket::Week))),
    ));
    sections
}

fn weekly_ph_table(rows: &[AggregateRow]) -> Table {
    // ---
    Table {
        headers: ["Semana", "Sensor", "Lecturas", "Mínimo", "Promedio", "Máximo", "Desv. estándar"]
            .map(String::from)
            .to_vec(),
        rows: rows
            .iter()
            .map(|r| {
                vec![
                    fmt_label(bucket_label(&r.time_bucket)),
                    r.sensor_name.clone(),
                    r.count.to_string(),
                    fmt_value(r.min),
                    fmt_value(r.mean),
                    fmt_value(r.max),
                    fmt_value(r.std),
                ]
            })
            .collect(),
    }
}

fn water_sections(readings: &[NormalizedReading]) -> Vec<ReportSection> {
    // ---
    let units: BTreeMap<String, &'static str> = readings
        .iter()
        .map(|r| (r.sensor_name.clone(), r.kind.unit()))
        .collect();

    let daily = aggregate(readings, Bucket::Day);
    let weekly = aggregate(readings, Bucket::Week);
    let monthly = aggregate(readings, Bucket::Month);
    let hourly = aggregate(readings, Bucket::HourOfDay);
    let (monthly_rows, monthly_units) = in_cubic_meters(&monthly, &units);

    vec![
        ReportSection::new(
            "Consumos diarios",
            SectionBody::Chart(chart::consumption_lines(&daily, &units, "Consumos diarios", "Fecha")),
        ),
        ReportSection::new(
            "Consumos semanales",
            SectionBody::Chart(chart::consumption_lines(&weekly, &units, "Consumos semanales", "Semana")),
        )
        .with_text("La semana 0 agrupa los últimos días de diciembre."),
        ReportSection::new(
            "Consumo mensual",
            SectionBody::Chart(chart::monthly_consumption_bars(
                &monthly_rows,
                &monthly_units,
                "Consumo mensual",
            )),
        )
        .with_subtitle("Agua en metros cúbicos"),
        ReportSection::new(
            "Consumo por horas",
            SectionBody::Chart(chart::hourly_profile(&hourly, "Consumo")),
        ),
        ReportSection::new("Totales semanales", SectionBody::Table(weekly_totals_table(&weekly, &units))),
    ]
}

/// Water volumes in m³; product weights are left as they are.
fn in_cubic_meters(
    rows: &[AggregateRow],
    units: &BTreeMap<String, &'static str>,
) -> (Vec<AggregateRow>, BTreeMap<String, &'static str>) {
    // ---
    let liters = SensorKind::WaterVolumeLiters.unit();
    let rows = rows
        .iter()
        .map(|r| match units.get(&r.sensor_name) {
            Some(&unit) if unit == liters => r.scaled(1.0 / LITERS_PER_CUBIC_METER),
            _ => r.clone(),
        })
        .collect();
    let units = units
        .iter()
        .map(|(name, &unit)| (name.clone(), if unit == liters { "m3" } else { unit }))
        .collect();
    (rows, units)
}

fn weekly_totals_table(rows: &[AggregateRow], units: &BTreeMap<String, &'static str>) -> Table {
    // ---
    Table {
        headers: ["Semana", "Sensor", "Total", "Unidad", "Máximo por lectura"]
            .map(String::from)
            .to_vec(),
        rows: rows
            .iter()
            .map(|r| {
                vec![
                    fmt_label(bucket_label(&r.time_bucket)),
                    r.sensor_name.clone(),
                    format!("{:.2}", r.sum),
                    units.get(&r.sensor_name).copied().unwrap_or("").to_string(),
                    fmt_value(r.max),
                ]
            })
            .collect(),
    }
}
