//! Text renderers for production results.

use chrono::DateTime;
use chrono_tz::Tz;
use clap::ValueEnum;
use serde::Serialize;

use crate::errors::PvResult;
use crate::models::production::{Location, ProductionSample, ResultSet, SystemConfig};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M %Z";
const METRIC_NAME: &str = "theoretical_pv_kw";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Prometheus,
}

impl OutputFormat {
    pub fn render(
        self,
        results: &ResultSet,
        location: &Location,
        system: &SystemConfig,
    ) -> PvResult<String> {
        match self {
            OutputFormat::Table => Ok(render_table(results)),
            OutputFormat::Json => render_json(results),
            OutputFormat::Prometheus => Ok(render_prometheus(results, location, system)),
        }
    }
}

fn format_timestamp(timestamp: &DateTime<Tz>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Rounds the way `{:.2}` prints, so JSON agrees with the other formats.
fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

// ─── Table ───────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

fn pad_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize], aligns: &[Align]) -> String {
    let padded: Vec<String> = cells
        .zip(widths.iter().zip(aligns))
        .map(|(cell, (&width, align))| match align {
            Align::Left => format!("{cell:<width$}"),
            Align::Right => format!("{cell:>width$}"),
        })
        .collect();
    padded.join("  ").trim_end().to_string()
}

/// Plain table: columns two spaces apart, dashed rule under the header or,
/// without a header, above and below the body.
fn simple_table(headers: Option<&[&str]>, rows: &[Vec<String>], aligns: &[Align]) -> String {
    let mut widths = vec![0usize; aligns.len()];
    if let Some(headers) = headers {
        for (w, h) in widths.iter_mut().zip(headers) {
            *w = (*w).max(h.chars().count());
        }
    }
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let rule = widths
        .iter()
        .map(|&w| "-".repeat(w))
        .collect::<Vec<_>>()
        .join("  ");
    let body = rows
        .iter()
        .map(|r| pad_row(r.iter().map(String::as_str), &widths, aligns));

    let mut lines = Vec::with_capacity(rows.len() + 2);
    match headers {
        Some(headers) => {
            lines.push(pad_row(headers.iter().copied(), &widths, aligns));
            lines.push(rule);
            lines.extend(body);
        }
        None => {
            lines.push(rule.clone());
            lines.extend(body);
            lines.push(rule);
        }
    }
    lines.join("\n")
}

fn render_table(results: &ResultSet) -> String {
    match results {
        ResultSet::Single(s) => {
            let rows = vec![
                vec!["Time".to_string(), format_timestamp(&s.timestamp)],
                vec!["DC Power".to_string(), format!("{:.2} kW", s.dc_power_kw)],
                vec!["POA Irradiance".to_string(), format!("{:.2} W/m²", s.poa_irradiance)],
                vec!["GHI".to_string(), format!("{:.2} W/m²", s.ghi)],
            ];
            simple_table(None, &rows, &[Align::Left, Align::Left])
        }
        ResultSet::Series(samples) => {
            let rows: Vec<Vec<String>> = samples
                .iter()
                .map(|s| {
                    vec![
                        format_timestamp(&s.timestamp),
                        format!("{:.2}", s.dc_power_kw),
                        format!("{:.2}", s.poa_irradiance),
                        format!("{:.2}", s.ghi),
                    ]
                })
                .collect();
            simple_table(
                Some(&["Time", "DC Power (kW)", "POA Irr (W/m²)", "GHI (W/m²)"][..]),
                &rows,
                &[Align::Left, Align::Right, Align::Right, Align::Right],
            )
        }
    }
}

// ─── JSON ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct JsonSample {
    timestamp: String,
    dc_power_kw: f64,
    poa_irradiance: f64,
    ghi: f64,
}

impl From<&ProductionSample> for JsonSample {
    fn from(s: &ProductionSample) -> Self {
        Self {
            timestamp: format_timestamp(&s.timestamp),
            dc_power_kw: round2(s.dc_power_kw),
            poa_irradiance: round2(s.poa_irradiance),
            ghi: round2(s.ghi),
        }
    }
}

fn render_json(results: &ResultSet) -> PvResult<String> {
    let text = match results {
        ResultSet::Single(s) => serde_json::to_string_pretty(&JsonSample::from(s))?,
        ResultSet::Series(samples) => {
            let rows: Vec<JsonSample> = samples.iter().map(JsonSample::from).collect();
            serde_json::to_string_pretty(&rows)?
        }
    };
    Ok(text)
}

// ─── Prometheus ──────────────────────────────────────────────

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Shortest round-trip form with a `.0` on integers, exponent form below
/// 1e-4 and from 1e16 up (`1e-07`, `1e+16`).
fn label_number(value: f64) -> String {
    let magnitude = value.abs();
    if value == 0.0 || !value.is_finite() || (1e-4..1e16).contains(&magnitude) {
        return format!("{value:?}");
    }
    let sci = format!("{value:e}");
    match sci.split_once('e') {
        Some((mantissa, exp)) => match exp.parse::<i32>() {
            Ok(exp) => format!(
                "{mantissa}e{}{:02}",
                if exp < 0 { '-' } else { '+' },
                exp.abs()
            ),
            Err(_) => sci,
        },
        None => sci,
    }
}

fn prometheus_labels(location: &Location, system: &SystemConfig) -> String {
    let mut labels = vec![
        format!("latitude=\"{}\"", label_number(location.latitude)),
        format!("longitude=\"{}\"", label_number(location.longitude)),
        format!("capacity=\"{}\"", label_number(system.capacity_kw)),
        format!("tilt=\"{}\"", label_number(system.tilt_deg)),
        format!("azimuth=\"{}\"", label_number(system.azimuth_deg)),
    ];
    if let Some(shortname) = &system.shortname {
        labels.push(format!("shortname=\"{}\"", escape_label_value(shortname)));
    }
    format!("{{{}}}", labels.join(","))
}

/// One gauge line carrying the most recent sample; an empty series reports 0.
fn render_prometheus(results: &ResultSet, location: &Location, system: &SystemConfig) -> String {
    let value = results.latest().map_or(0.0, |s| s.dc_power_kw);
    format!(
        "{METRIC_NAME}{} {value:.2}",
        prometheus_labels(location, system)
    )
}
