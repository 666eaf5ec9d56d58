//! JSON / CSV exporter for run reports and worker metrics.

use crate::error::ExportError;
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use stalemate_core::WorkerMetrics;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// On-disk format of exported metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricsFormat {
    Json,
    Csv,
}

/// Default location of a run report: `output/<mode>_report_<unix-secs>.json`.
pub fn default_report_path(mode: &str) -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Path::new("output").join(format!("{}_report_{}.json", mode, secs))
}

/// Writes a run report as pretty JSON, creating parent directories.
pub fn write_report<R: Serialize>(report: &R, path: &Path) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(report)?;
    create_parent(path)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

/// Writes worker metrics.
///
/// # Returns
/// * `Ok(true)` - File written
/// * `Ok(false)` - No metrics collected; nothing written
pub fn export_metrics(metrics: &[WorkerMetrics], path: &Path, format: MetricsFormat) -> Result<bool, ExportError> {
    if metrics.is_empty() {
        return Ok(false);
    }
    create_parent(path)?;

    let body = match format {
        MetricsFormat::Json => serde_json::to_string_pretty(metrics)?,
        MetricsFormat::Csv => metrics_csv(metrics)?,
    };
    let mut file = File::create(path)?;
    file.write_all(body.as_bytes())?;
    Ok(true)
}

fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// CSV with the sorted union of all record keys as header.
///
/// Fields a record does not carry are left empty.
fn metrics_csv(metrics: &[WorkerMetrics]) -> Result<String, ExportError> {
    let rows = metrics
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()?;

    let columns: BTreeSet<&str> = rows
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let mut out = String::new();
    out.push_str(&columns.iter().copied().collect::<Vec<_>>().join(","));
    out.push_str("\r\n");
    for row in &rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|&column| csv_cell(row.get(column)))
            .collect();
        out.push_str(&cells.join(","));
        out.push_str("\r\n");
    }
    Ok(out)
}

fn csv_cell(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => return String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}
