use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;

/// Block size used when none is given on the command line.
pub const DEFAULT_BLOCK_SIZE: u64 = 4096;

/// Smallest block size accepted; matches the logical sector size that
/// direct I/O requires on every supported platform.
pub const MIN_BLOCK_SIZE: u64 = 512;

// ─── Command line ────────────────────────────────────────────────

/// Continuously measure random-read latency of a file and expose it
/// as Prometheus metrics.
#[derive(Debug, Parser)]
#[command(name = "fs-latency-exporter", version)]
pub struct Args {
    /// File to probe. Should be large and pre-allocated.
    #[arg(value_name = "FILENAME", env = "FS_LATENCY_FILE")]
    pub filename: PathBuf,

    /// Expose the statistics on HOST:PORT (a bare PORT listens on all interfaces).
    #[arg(long, value_name = "ADDR", default_value = "0.0.0.0:8080", value_parser = parse_listen_addr, env = "FS_LATENCY_METRICS")]
    pub metrics: String,

    /// Perform a measurement once every SECONDS minimum. 0 runs unpaced.
    #[arg(long, value_name = "SECONDS", default_value = "0", value_parser = parse_seconds, env = "FS_LATENCY_INTERVAL")]
    pub interval: Duration,

    /// Size of every read, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BLOCK_SIZE, value_parser = parse_block_size)]
    pub block_size: u64,

    /// Don't try to bypass the page cache.
    #[arg(long)]
    pub buffered: bool,

    /// Log a latency summary every SECONDS. 0 disables the summary.
    #[arg(long, value_name = "SECONDS", default_value = "60", value_parser = parse_seconds)]
    pub report_interval: Duration,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid number of seconds '{}': {}", s, e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration '{}': {}", s, e))
}

fn parse_block_size(s: &str) -> Result<u64, String> {
    let bytes: u64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid block size '{}': {}", s, e))?;
    validate_block_size(bytes).map_err(|e| e.to_string())?;
    Ok(bytes)
}

fn parse_listen_addr(s: &str) -> Result<String, String> {
    normalize_listen_addr(s).map_err(|e| e.to_string())
}

// ─── Validated configuration ─────────────────────────────────────

/// Runtime configuration. Option values were already checked by the
/// `Args` value parsers, so the conversion cannot fail.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub listen_addr: String,
    /// `None` means no pacing between iterations.
    pub interval: Option<Duration>,
    pub block_size: u64,
    pub prefer_direct: bool,
    /// `None` disables the periodic summary.
    pub report_interval: Option<Duration>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            path: args.filename,
            listen_addr: args.metrics,
            interval: non_zero(args.interval),
            block_size: args.block_size,
            prefer_direct: !args.buffered,
            report_interval: non_zero(args.report_interval),
        }
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}

pub fn validate_block_size(block_size: u64) -> Result<(), ConfigError> {
    if block_size < MIN_BLOCK_SIZE || !block_size.is_power_of_two() {
        return Err(ConfigError::InvalidBlockSize(block_size));
    }
    Ok(())
}

/// Accepts `HOST:PORT`, `[v6]:PORT` or a bare `PORT`.
pub fn normalize_listen_addr(addr: &str) -> Result<String, ConfigError> {
    let addr = addr.trim();
    if let Ok(port) = addr.parse::<u16>() {
        return Ok(format!("0.0.0.0:{}", port));
    }
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(addr.to_string())
        }
        _ => Err(ConfigError::InvalidListenAddr(addr.to_string())),
    }
}
