//! CSV Output

use std::fmt::Write;

use crate::report::SweepReport;

/// Column header, one row per tested concurrency level follows
pub const CSV_HEADER: &str = "concurrency,total_requests,successful_requests,failed_requests,success_rate,qps,tokens_per_second,\
average_latency,latency_p50,latency_p90,latency_p99,\
average_request_tokens,average_response_tokens,\
average_first_token_latency,first_token_latency_p50,first_token_latency_p90,first_token_latency_p99";

/// Generate a CSV report. Latencies are whole milliseconds.
pub fn generate_csv_report(report: &SweepReport) -> String {
    let mut output = String::with_capacity(256 * (report.test_results.len() + 1));
    output.push_str(CSV_HEADER);
    output.push('\n');

    for result in &report.test_results {
        let m = &result.metrics;
        let first_token = m.first_token.unwrap_or_default();
        let _ = writeln!(
            output,
            "{},{},{},{},{:.2},{:.2},{:.2},{},{},{},{},{:.2},{:.2},{},{},{},{}",
            result.concurrency,
            m.total_requests,
            m.successful_requests,
            m.failed_requests,
            m.success_rate,
            m.qps,
            m.tokens_per_second,
            m.average_latency.as_millis(),
            m.latency_p50.as_millis(),
            m.latency_p90.as_millis(),
            m.latency_p99.as_millis(),
            m.average_request_tokens,
            m.average_response_tokens,
            first_token.average.as_millis(),
            first_token.p50.as_millis(),
            first_token.p90.as_millis(),
            first_token.p99.as_millis(),
        );
    }

    output
}
