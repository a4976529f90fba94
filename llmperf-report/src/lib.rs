#![warn(missing_docs)]
//! llmperf Report - Analysis and Reporting
//!
//! Turns collected results into decisions:
//! - `Analyzer` reduces a run into `Metrics`
//! - `ConcurrentComparison` holds one `Metrics` per concurrency level
//! - Gradient, statistical and latency bottleneck detectors plus a recommender
//! - JSON, CSV and human-readable renderers of a `SweepReport`

mod analyzer;
mod bottleneck;
mod comparison;
mod csv;
mod formatting;
mod json;
mod metrics;
mod recommend;
mod report;
pub mod round;

pub use analyzer::{Analyzer, UNKNOWN_ERROR_TYPE, analyze};
pub use bottleneck::{
    Algorithm, BottleneckDetector, BottleneckResult, BottleneckThresholds, GradientDetector,
    LatencyDetector, LatencyMetric, StatisticalDetector,
};
pub use comparison::{ConcurrentComparison, ConcurrentTestResult};
pub use csv::{CSV_HEADER, generate_csv_report};
pub use formatting::{format_duration, format_human_report};
pub use json::generate_json_report;
pub use metrics::{FirstTokenMetrics, Metrics};
pub use recommend::Recommender;
pub use report::{REPORT_SCHEMA_VERSION, ReportMeta, RunMode, SweepReport};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON with full schema
    Json,
    /// CSV for spreadsheets
    Csv,
    /// Human-readable terminal output
    Human,
}

impl OutputFormat {
    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Human => "txt",
        }
    }

    /// Render a report in this format
    pub fn render(&self, report: &SweepReport) -> Result<String, serde_json::Error> {
        match self {
            OutputFormat::Json => generate_json_report(report),
            OutputFormat::Csv => Ok(generate_csv_report(report)),
            OutputFormat::Human => Ok(format_human_report(report)),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "human" | "text" | "txt" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("csv".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert_eq!("txt".parse::<OutputFormat>(), Ok(OutputFormat::Human));
        assert!("html".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Csv.extension(), "csv");
    }
}
