use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, trace};

use super::reader::DirectReader;
use super::selector::BlockSelector;
use crate::metrics::{MetricsRegistry, Sample};

/// Longest uninterrupted sleep while pacing, so a stop request is noticed quickly.
const PACING_SLICE: Duration = Duration::from_millis(100);

// ─── Lifecycle ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Sampling,
    /// Terminal.
    Stopped,
}

/// Shared switch between the probe thread and whoever owns shutdown.
/// Checked by the loop once per iteration.
#[derive(Debug, Clone)]
pub struct ProbeControl {
    running: Arc<AtomicBool>,
}

impl ProbeControl {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Moves the probe to `Stopped`. An in-flight read still completes.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn state(&self) -> ProbeState {
        if self.running.load(Ordering::SeqCst) {
            ProbeState::Sampling
        } else {
            ProbeState::Stopped
        }
    }

    fn is_sampling(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Default for ProbeControl {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Probe ───────────────────────────────────────────────────────

/// The sampling loop: random offset → timed block read → one sample.
pub struct LatencyProbe {
    reader: DirectReader,
    selector: BlockSelector,
    metrics: Arc<MetricsRegistry>,
    rng: StdRng,
    pacing: Option<Duration>,
}

impl LatencyProbe {
    pub fn new(reader: DirectReader, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            selector: reader.selector(),
            reader,
            metrics,
            rng: StdRng::from_entropy(),
            pacing: None,
        }
    }

    /// Minimum time between the starts of two iterations. `None` runs as
    /// fast as the storage answers.
    pub fn with_pacing(mut self, pacing: Option<Duration>) -> Self {
        self.pacing = pacing;
        self
    }

    /// Replaces the entropy-seeded generator; handy for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// One iteration. Records the outcome and returns it.
    pub fn step(&mut self) -> Sample {
        let offset = self.selector.next_offset(&mut self.rng);

        let sample = match self.reader.read_block(offset) {
            Ok(timing) => {
                trace!(offset, seek = ?timing.seek, read = ?timing.read, "read ok");
                Sample::Success(timing.total())
            }
            Err(e) => {
                debug!("{}", e);
                Sample::Failure(e.kind())
            }
        };

        self.metrics.record(sample);
        sample
    }

    /// Samples until `control` is stopped. Returns the number of
    /// iterations; the file handle is released on return.
    pub fn run(mut self, control: ProbeControl) -> u64 {
        info!(
            "Probing {:?}: {} blocks of {} bytes, {} I/O, {}",
            self.reader.path(),
            self.selector.blocks(),
            self.selector.block_size(),
            self.reader.mode(),
            match self.pacing {
                Some(p) => format!("one read every {:?}", p),
                None => "unpaced".to_string(),
            }
        );

        let mut iterations = 0u64;
        while control.is_sampling() {
            let started = Instant::now();
            self.step();
            iterations += 1;

            if let Some(pacing) = self.pacing {
                pause(&control, pacing.saturating_sub(started.elapsed()));
            }
        }

        info!("Probe stopped after {} iterations", iterations);
        iterations
    }

    /// Runs the loop on a dedicated OS thread; reads block.
    pub fn spawn(self, control: ProbeControl) -> io::Result<JoinHandle<u64>> {
        thread::Builder::new()
            .name("probe".into())
            .spawn(move || self.run(control))
    }
}

/// Sleeps for `remaining`, in slices, bailing out early once stopped.
fn pause(control: &ProbeControl, mut remaining: Duration) {
    while remaining > Duration::ZERO && control.is_sampling() {
        let slice = remaining.min(PACING_SLICE);
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
