//! Always-on random-read latency probe for a single file, exported as
//! Prometheus metrics.

use std::path::PathBuf;
use std::sync::Arc;

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod probe;
pub mod server;

pub use error::{ConfigError, FailureKind, ProbeError};

use metrics::MetricsRegistry;
use probe::{DirectReader, IoMode, ProbeControl};

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Registry the probe records into and scrapes render from.
    pub metrics: Arc<MetricsRegistry>,

    /// Probe lifecycle switch; read-only from the HTTP side.
    pub probe: ProbeControl,

    /// What is being probed, for the landing page.
    pub target: TargetInfo,
}

/// Static description of the probed file, fixed at startup.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub path: PathBuf,
    pub len: u64,
    pub block_size: u64,
    pub mode: IoMode,
}

impl TargetInfo {
    pub fn of(reader: &DirectReader) -> Self {
        Self {
            path: reader.path().to_path_buf(),
            len: reader.file_len(),
            block_size: reader.block_size(),
            mode: reader.mode(),
        }
    }
}
