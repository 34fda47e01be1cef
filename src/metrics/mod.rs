pub mod collector;
pub mod exposition;
pub mod percentiles;
pub mod report;

use std::time::Duration;

use crate::error::FailureKind;

pub use collector::{HistogramSnapshot, MetricsRegistry, MetricsSnapshot, WindowReport};
pub use percentiles::PercentileSet;

/// Outcome of one probe iteration.
/// The sampler produces exactly one per iteration and pushes it in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Seek + read wall time of a successful block read
    Success(Duration),
    /// The iteration failed; counted, never observed in the histogram
    Failure(FailureKind),
}
