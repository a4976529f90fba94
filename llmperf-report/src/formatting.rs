//! Human-readable Output
//!
//! Terminal summary of a sweep:
//! - One block per concurrency level (requests, throughput, latency percentiles)
//! - First-token latency when streamed
//! - Error histogram
//! - Detector verdicts and the recommendation

use std::time::Duration;

use crate::bottleneck::BottleneckResult;
use crate::comparison::ConcurrentTestResult;
use crate::report::SweepReport;

/// Format a sweep report for terminal display
pub fn format_human_report(report: &SweepReport) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!(
        "llmperf Results ({} / {}, {:?} mode)\n",
        report.meta.provider,
        if report.meta.model.is_empty() {
            "-"
        } else {
            report.meta.model.as_str()
        },
        report.meta.mode
    ));
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    for result in &report.test_results {
        format_level(&mut output, result);
    }

    if report.test_results.len() > 1 {
        output.push_str("Bottleneck Analysis\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        for (label, found) in [
            ("QPS", &report.qps_bottleneck),
            ("QPS stability", &report.statistical_bottleneck),
            ("Latency", &report.latency_bottleneck),
        ] {
            output.push_str(&format_verdict(label, found));
        }
        if report.has_first_token_data() {
            output.push_str(&format_verdict(
                "First-token latency",
                &report.first_token_latency_bottleneck,
            ));
        }
        output.push('\n');
    }

    let rec = &report.recommendation;
    if !report.test_results.is_empty() {
        output.push_str(&format!(
            "Recommended concurrency: {}  (QPS {:.2}, {:.2} tokens/s, avg latency {} ms)\n",
            rec.concurrency, rec.qps, rec.tokens_per_sec, rec.average_latency_ms
        ));
        if !rec.reason.is_empty() {
            output.push_str(&format!("  {}\n", rec.reason));
        }
    }

    output
}

fn format_level(output: &mut String, result: &ConcurrentTestResult) {
    let m = &result.metrics;

    output.push_str(&format!("Concurrency: {}\n", result.concurrency));
    output.push_str(&"-".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "      requests: {}  ok: {}  failed: {}  success: {:.2}%\n",
        m.total_requests, m.successful_requests, m.failed_requests, m.success_rate
    ));
    output.push_str(&format!(
        "      duration: {}  qps: {:.2}  tokens/s: {:.2}\n",
        format_duration(m.total_duration),
        m.qps,
        m.tokens_per_second
    ));
    output.push_str(&format!(
        "      latency avg: {}  p50: {}  p90: {}  p99: {}\n",
        format_duration(m.average_latency),
        format_duration(m.latency_p50),
        format_duration(m.latency_p90),
        format_duration(m.latency_p99)
    ));
    output.push_str(&format!(
        "      tokens/request: {:.2} in  {:.2} out\n",
        m.average_request_tokens, m.average_response_tokens
    ));
    if let Some(ft) = &m.first_token {
        output.push_str(&format!(
            "      first token avg: {}  p50: {}  p90: {}  p99: {}\n",
            format_duration(ft.average),
            format_duration(ft.p50),
            format_duration(ft.p90),
            format_duration(ft.p99)
        ));
    }
    for (category, count) in &m.error_type_counts {
        output.push_str(&format!("      error: {} x{}\n", category, count));
    }
    output.push('\n');
}

fn format_verdict(label: &str, found: &BottleneckResult) -> String {
    if found.is_bottleneck {
        format!(
            "  ✗ {:<20} bottleneck at concurrency {} ({})\n",
            label, found.concurrency, found.algorithm
        )
    } else {
        format!(
            "  ✓ {:<20} no bottleneck up to concurrency {} ({})\n",
            label, found.concurrency, found.algorithm
        )
    }
}

/// Format a duration with an appropriate unit
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos() as f64;
    if nanos < 1_000.0 {
        format!("{:.0} ns", nanos)
    } else if nanos < 1_000_000.0 {
        format!("{:.2} us", nanos / 1_000.0)
    } else if nanos < 1_000_000_000.0 {
        format!("{:.2} ms", nanos / 1_000_000.0)
    } else {
        format!("{:.2} s", nanos / 1_000_000_000.0)
    }
}
