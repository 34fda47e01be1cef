use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use super::collector::{MetricsRegistry, WindowReport};

/// Logs a latency summary every `every`, forever. Abort the task to stop it.
pub async fn run(metrics: Arc<MetricsRegistry>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately; skip it so the first report
    // covers a full window.
    let mut ticks = IntervalStream::new(interval).skip(1);
    while ticks.next().await.is_some() {
        log_window(&metrics.take_window(), every);
    }
}

fn log_window(report: &WindowReport, every: Duration) {
    let errors = report.errors();
    if !report.latency.has_data() && errors == 0 {
        warn!("No read completed in the last {:?}; the probe may be stuck", every);
        return;
    }

    if errors > 0 {
        warn!(
            "Last {:?}: {} ({} errors: {} seek, {} read)",
            every, report.latency, errors, report.seek_errors, report.read_errors
        );
    } else {
        info!("Last {:?}: {}", every, report.latency);
    }
}
