//! Report export (CSV and JSON).
//!
//! The CSV header is fixed:
//!
//! ```text
//! ancestor_path,label,gate_type,parent_count,filtered_count,status,regions
//! ```
//!
//! Absent counts are written as empty cells, never as `0`.

use std::io::Write;
use std::path::{Path, PathBuf};

use flowgate_core::{GroupReport, ReportRow};

use crate::config::ReportFormat;
use crate::error::{Result, WorkspaceError};

pub const CSV_HEADER: [&str; 7] = [
    "ancestor_path",
    "label",
    "gate_type",
    "parent_count",
    "filtered_count",
    "status",
    "regions",
];

fn count_cell(count: Option<usize>) -> String {
    count.map(|c| c.to_string()).unwrap_or_default()
}

pub fn write_csv<W: Write>(writer: W, rows: &[ReportRow]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(CSV_HEADER)?;
    for row in rows {
        out.write_record([
            row.ancestor_path.as_str(),
            row.label.as_str(),
            row.gate_type.as_str(),
            count_cell(row.parent_count).as_str(),
            count_cell(row.filtered_count).as_str(),
            row.status.as_str(),
            row.regions.to_string().as_str(),
        ])?;
    }
    out.flush()
        .map_err(|source| WorkspaceError::io("<report>", source))?;
    Ok(())
}

pub fn write_json<W: Write>(writer: W, reports: &[GroupReport]) -> Result<()> {
    serde_json::to_writer_pretty(writer, reports)?;
    Ok(())
}

fn file_safe(text: &str) -> String {
    text.chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

/// `<event stem>__<kind>-<id>__<hierarchy name>.<ext>`.
///
/// Display names may repeat across hierarchies; the kind and id keep the
/// names of one analysis distinct. Path separators are replaced so the report
/// always lands in the output directory.
#[must_use]
pub fn report_file_name(event_file: &Path, report: &GroupReport, format: ReportFormat) -> String {
    let stem = event_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "events".to_string());
    format!(
        "{stem}__{}__{}.{}",
        file_safe(&report.key()),
        file_safe(&report.group),
        format.extension()
    )
}

/// Write one report to `dir`, returning the path written.
pub fn write_report_file(
    dir: &Path,
    event_file: &Path,
    report: &GroupReport,
    format: ReportFormat,
) -> Result<PathBuf> {
    let path = dir.join(report_file_name(event_file, report, format));
    let file = std::fs::File::create(&path).map_err(|source| WorkspaceError::io(&path, source))?;
    match format {
        ReportFormat::Csv => write_csv(file, &report.rows)?,
        ReportFormat::Json => write_json(file, std::slice::from_ref(report))?,
    }
    tracing::info!(target: "flowgate.export", path = %path.display(), hierarchy = %report.key(), rows = report.rows.len(), "report written");
    Ok(path)
}
