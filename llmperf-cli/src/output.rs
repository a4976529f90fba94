//! Report and batch-result files

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use llmperf_core::RequestResult;
use llmperf_report::{OutputFormat, SweepReport};
use tracing::info;

/// Stem of the report file when only a format is given
pub const DEFAULT_REPORT_STEM: &str = "report-result";

/// Where and how to write the sweep report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTarget {
    /// Report file
    pub path: PathBuf,
    /// Rendering format
    pub format: OutputFormat,
}

/// Work out the report file from a path and a format, either of which may
/// be empty.
///
/// - format only: `report-result.<ext>` in the working directory
/// - path only: format taken from the path's extension
/// - both: used as given
/// - neither: no report file
pub fn resolve_report_target(path: &str, format: &str) -> anyhow::Result<Option<ReportTarget>> {
    let path = path.trim();
    let format = format.trim();

    let format = match (path.is_empty(), format.is_empty()) {
        (true, true) => return Ok(None),
        (_, false) => format,
        (false, true) => Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .with_context(|| format!("Cannot infer report format from '{}'", path))?,
    };
    let format: OutputFormat = format.parse().map_err(anyhow::Error::msg)?;

    let path = if path.is_empty() {
        PathBuf::from(format!("{}.{}", DEFAULT_REPORT_STEM, format.extension()))
    } else {
        PathBuf::from(path)
    };
    Ok(Some(ReportTarget { path, format }))
}

/// Render `report` and write it to `target`, creating parent directories
pub fn write_report(report: &SweepReport, target: &ReportTarget) -> anyhow::Result<()> {
    let rendered = target
        .format
        .render(report)
        .context("Failed to render report")?;
    if let Some(parent) = target.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(&target.path, rendered)
        .with_context(|| format!("Failed to write report {}", target.path.display()))?;
    info!(
        target: "llmperf::output",
        path = %target.path.display(),
        format = ?target.format,
        "Report written"
    );
    Ok(())
}

/// JSONL line for one batch result: the raw response body for successes,
/// the serialized error for failures
pub fn batch_result_line(result: &RequestResult) -> serde_json::Result<String> {
    if let Some(response) = result.response.as_ref().filter(|_| result.success) {
        return Ok(response.raw_json());
    }
    match result.provider_error() {
        Some(err) => serde_json::to_string(&err),
        None => serde_json::to_string(result),
    }
}

/// Write batch results as JSONL; line `i` belongs to dataset case `i`
pub fn write_batch_results(results: &[RequestResult], path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for result in results {
        let line = batch_result_line(result).map_err(io::Error::other)?;
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    info!(
        target: "llmperf::output",
        path = %path.display(),
        count = results.len(),
        "Batch results written"
    );
    Ok(())
}
