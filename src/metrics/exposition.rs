//! Prometheus text exposition format (version 0.0.4).

use super::collector::MetricsSnapshot;

/// `Content-Type` of a scrape response.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub const ERRORS_NAME: &str = "errors_total";
const ERRORS_HELP: &str = "Number of read errors";

pub const READ_TIME_NAME: &str = "read_time_seconds";
const READ_TIME_HELP: &str = "Time taken to read (latency)";

/// Renders a snapshot. Families are emitted in name order and no timestamps
/// are written, so equal snapshots render to equal bytes.
pub fn render(snapshot: &MetricsSnapshot) -> String {
    let mut output = String::with_capacity(1024);

    output.push_str(&format!("# HELP {} {}\n", ERRORS_NAME, ERRORS_HELP));
    output.push_str(&format!("# TYPE {} counter\n", ERRORS_NAME));
    output.push_str(&format!("{} {}\n", ERRORS_NAME, snapshot.errors_total));

    let hist = &snapshot.read_time;
    output.push_str(&format!("# HELP {} {}\n", READ_TIME_NAME, READ_TIME_HELP));
    output.push_str(&format!("# TYPE {} histogram\n", READ_TIME_NAME));
    for (bound, count) in hist.bounds.iter().zip(&hist.cumulative) {
        output.push_str(&format!(
            "{}_bucket{{le=\"{}\"}} {}\n",
            READ_TIME_NAME, bound, count
        ));
    }
    output.push_str(&format!(
        "{}_bucket{{le=\"+Inf\"}} {}\n",
        READ_TIME_NAME, hist.count
    ));
    output.push_str(&format!("{}_sum {}\n", READ_TIME_NAME, hist.sum));
    output.push_str(&format!("{}_count {}\n", READ_TIME_NAME, hist.count));

    output
}
