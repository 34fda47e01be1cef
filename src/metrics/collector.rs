use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;

use super::exposition;
use super::percentiles::PercentileSet;
use super::Sample;
use crate::error::{ConfigError, FailureKind};

// ─── Configuration ───────────────────────────────────────────────

/// `read_time_seconds` bucket upper bounds, in seconds.
pub const DEFAULT_BUCKETS: [f64; 13] = [
    0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// HdrHistogram range for the report window: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe metrics registry.
/// The probe calls `record*()`, scrapes call `render()` / `snapshot()`.
///
/// Every update and every snapshot happens under one short-lived lock, so a
/// snapshot always sees the error counter, the buckets, the sum and the
/// count at the same logical point in time.
pub struct MetricsRegistry {
    bounds: Vec<f64>,
    inner: Mutex<Inner>,
}

/// Point-in-time copy of the exported metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub errors_total: u64,
    pub read_time: HistogramSnapshot,
}

/// Exported latency histogram, already cumulative.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// Upper bounds in seconds, excluding `+Inf`.
    pub bounds: Vec<f64>,
    /// `cumulative[i]` = observations `<= bounds[i]`.
    pub cumulative: Vec<u64>,
    /// Sum of observed durations, in seconds.
    pub sum: f64,
    /// Total observations; also the `+Inf` bucket.
    pub count: u64,
}

/// What happened since the previous call to `take_window()`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    pub latency: PercentileSet,
    pub seek_errors: u64,
    pub read_errors: u64,
}

impl WindowReport {
    pub fn errors(&self) -> u64 {
        self.seek_errors + self.read_errors
    }
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    // Exported, monotonic for the life of the process
    errors_total: u64,
    // Per-bucket (not cumulative); last slot is the overflow bucket
    buckets: Vec<u64>,
    sum: f64,
    count: u64,

    // Report window, reset by `take_window()`
    window_hist: Histogram<u64>,
    window_seek_errors: u64,
    window_read_errors: u64,
}

// ─── MetricsRegistry impl ────────────────────────────────────────

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::build(DEFAULT_BUCKETS.to_vec())
    }

    /// Custom bucket bounds in seconds. They must be positive, finite and
    /// strictly increasing; they never change afterwards.
    pub fn with_buckets(bounds: Vec<f64>) -> Result<Self, ConfigError> {
        let valid = !bounds.is_empty()
            && bounds.iter().all(|b| b.is_finite() && *b > 0.0)
            && bounds.windows(2).all(|w| w[0] < w[1]);
        if !valid {
            return Err(ConfigError::InvalidBuckets);
        }
        Ok(Self::build(bounds))
    }

    fn build(bounds: Vec<f64>) -> Self {
        let inner = Inner::new(bounds.len() + 1);
        Self {
            bounds,
            inner: Mutex::new(inner),
        }
    }

    /// Fold one probe outcome in.
    pub fn record(&self, sample: Sample) {
        match sample {
            Sample::Success(elapsed) => self.record_success(elapsed),
            Sample::Failure(kind) => self.record_error(kind),
        }
    }

    /// One histogram observation.
    pub fn record_success(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let idx = self.bucket_index(secs);
        self.inner.lock().observe(idx, secs, elapsed);
    }

    /// One error increment.
    pub fn record_error(&self, kind: FailureKind) {
        let mut inner = self.inner.lock();
        inner.errors_total += 1;
        match kind {
            FailureKind::Seek => inner.window_seek_errors += 1,
            FailureKind::Read => inner.window_read_errors += 1,
        }
    }

    /// Consistent copy of the exported metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (errors_total, buckets, sum, count) = {
            let inner = self.inner.lock();
            (inner.errors_total, inner.buckets.clone(), inner.sum, inner.count)
        };

        let cumulative = buckets[..self.bounds.len()]
            .iter()
            .scan(0u64, |acc, &n| {
                *acc += n;
                Some(*acc)
            })
            .collect();

        MetricsSnapshot {
            errors_total,
            read_time: HistogramSnapshot {
                bounds: self.bounds.clone(),
                cumulative,
                sum,
                count,
            },
        }
    }

    /// Exposition text for a scrape.
    pub fn render(&self) -> String {
        exposition::render(&self.snapshot())
    }

    /// Returns and resets the report window. Exported metrics are untouched.
    pub fn take_window(&self) -> WindowReport {
        let (hist, seek_errors, read_errors) = {
            let mut inner = self.inner.lock();
            let hist = inner.window_hist.clone();
            inner.window_hist.reset();
            let errors = (inner.window_seek_errors, inner.window_read_errors);
            inner.window_seek_errors = 0;
            inner.window_read_errors = 0;
            (hist, errors.0, errors.1)
        };

        WindowReport {
            latency: PercentileSet::from_histogram(&hist),
            seek_errors,
            read_errors,
        }
    }

    /// First bucket with `secs <= bound`, or the overflow slot.
    fn bucket_index(&self, secs: f64) -> usize {
        self.bounds.partition_point(|&b| b < secs)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn new(slots: usize) -> Self {
        Self {
            errors_total: 0,
            buckets: vec![0; slots],
            sum: 0.0,
            count: 0,
            window_hist: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("histogram creation"),
            window_seek_errors: 0,
            window_read_errors: 0,
        }
    }

    fn observe(&mut self, idx: usize, secs: f64, elapsed: Duration) {
        self.buckets[idx] += 1;
        self.sum += secs;
        self.count += 1;

        // Clamp to ≥ 1 μs; saturates at the 60 s ceiling
        let us = (elapsed.as_micros() as u64).max(1);
        self.window_hist.saturating_record(us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn fresh_registry_is_all_zero() {
        let snap = MetricsRegistry::new().snapshot();
        assert_eq!(snap.errors_total, 0);
        assert_eq!(snap.read_time.count, 0);
        assert_eq!(snap.read_time.sum, 0.0);
        assert_eq!(snap.read_time.bounds, DEFAULT_BUCKETS.to_vec());
        assert!(snap.read_time.cumulative.iter().all(|&c| c == 0));
    }

    #[test]
    fn count_and_sum_track_successes() {
        let reg = MetricsRegistry::new();
        let durations = [ms(1), ms(3), Duration::from_micros(50), ms(700), Duration::from_secs(2)];
        for d in durations {
            reg.record_success(d);
        }
        let snap = reg.snapshot();
        let expected: f64 = durations.iter().map(Duration::as_secs_f64).sum();
        assert_eq!(snap.read_time.count, durations.len() as u64);
        assert!((snap.read_time.sum - expected).abs() < 1e-9);
        assert_eq!(snap.errors_total, 0);
    }

    #[test]
    fn buckets_are_cumulative_and_upper_inclusive() {
        let reg = MetricsRegistry::with_buckets(vec![0.001, 0.01, 0.1]).unwrap();
        reg.record_success(Duration::from_micros(500)); // <= 0.001
        reg.record_success(ms(1)); // exactly on the 0.001 bound
        reg.record_success(ms(5)); // <= 0.01
        reg.record_success(ms(50)); // <= 0.1
        reg.record_success(ms(500)); // +Inf only

        let h = reg.snapshot().read_time;
        assert_eq!(h.cumulative, vec![2, 3, 4]);
        assert_eq!(h.count, 5);
    }

    #[test]
    fn errors_never_touch_the_histogram() {
        let reg = MetricsRegistry::new();
        reg.record(Sample::Success(ms(2)));
        reg.record(Sample::Failure(FailureKind::Read));
        reg.record(Sample::Failure(FailureKind::Seek));

        let snap = reg.snapshot();
        assert_eq!(snap.errors_total, 2);
        assert_eq!(snap.read_time.count, 1);
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        for bounds in [
            vec![],
            vec![0.0, 1.0],
            vec![-1.0, 1.0],
            vec![0.5, 0.5],
            vec![1.0, 0.5],
            vec![0.1, f64::INFINITY],
            vec![f64::NAN],
        ] {
            assert!(
                matches!(MetricsRegistry::with_buckets(bounds.clone()), Err(ConfigError::InvalidBuckets)),
                "{bounds:?} should be rejected"
            );
        }
    }

    #[test]
    fn taking_the_window_resets_it_but_not_the_export() {
        let reg = MetricsRegistry::new();
        reg.record_success(ms(1));
        reg.record_success(ms(2));
        reg.record_error(FailureKind::Seek);
        reg.record_error(FailureKind::Read);
        reg.record_error(FailureKind::Read);

        let window = reg.take_window();
        assert_eq!(window.latency.count, 2);
        assert_eq!(window.seek_errors, 1);
        assert_eq!(window.read_errors, 2);
        assert_eq!(window.errors(), 3);

        let again = reg.take_window();
        assert!(!again.latency.has_data());
        assert_eq!(again.errors(), 0);

        let snap = reg.snapshot();
        assert_eq!(snap.errors_total, 3);
        assert_eq!(snap.read_time.count, 2);
    }

    #[test]
    fn concurrent_records_are_never_lost() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 10_000;

        for _ in 0..5 {
            let reg = Arc::new(MetricsRegistry::new());
            let handles: Vec<_> = (0..THREADS)
                .map(|t| {
                    let reg = Arc::clone(&reg);
                    thread::spawn(move || {
                        for i in 0..PER_THREAD {
                            if (t + i) % 3 == 0 {
                                reg.record_error(FailureKind::Read);
                            } else {
                                reg.record_success(Duration::from_micros(1 + i % 2000));
                            }
                        }
                    })
                })
                .collect();

            // Scrape concurrently; every snapshot must be self-consistent.
            for _ in 0..200 {
                let h = reg.snapshot().read_time;
                assert!(h.cumulative.last().copied().unwrap_or(0) <= h.count);
                assert!(h.cumulative.windows(2).all(|w| w[0] <= w[1]));
            }

            for h in handles {
                h.join().unwrap();
            }

            let snap = reg.snapshot();
            assert_eq!(snap.errors_total + snap.read_time.count, THREADS * PER_THREAD);
            // Every observation is at most 2 ms, so the 0.0025 bucket holds all of them.
            let idx = DEFAULT_BUCKETS.iter().position(|&b| b == 0.0025).unwrap();
            assert_eq!(snap.read_time.cumulative[idx], snap.read_time.count);
        }
    }
}
