//! Latency tracking for the replay pipeline.
//!
//! Nanosecond-precision histogram over HdrHistogram, plus a quanta-backed
//! wall-clock timer.

use core::fmt;

use hdrhistogram::Histogram;

/// High-precision latency histogram.
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create a new histogram with 3 significant digits.
    pub fn new() -> Self {
        Self {
            histogram: Histogram::new(3).expect("failed to create histogram"),
        }
    }

    /// Record a latency value in nanoseconds.
    #[inline(always)]
    pub fn record(&mut self, nanos: u64) {
        let _ = self.histogram.record(nanos);
    }

    /// Get value at percentile (0.0 - 100.0).
    pub fn value_at_percentile(&self, percentile: f64) -> u64 {
        self.histogram.value_at_quantile(percentile / 100.0)
    }

    /// Get P50 (median) latency.
    pub fn p50(&self) -> u64 {
        self.value_at_percentile(50.0)
    }

    /// Get P90 latency.
    pub fn p90(&self) -> u64 {
        self.value_at_percentile(90.0)
    }

    /// Get P99 latency.
    pub fn p99(&self) -> u64 {
        self.value_at_percentile(99.0)
    }

    /// Get P99.9 latency.
    pub fn p999(&self) -> u64 {
        self.value_at_percentile(99.9)
    }

    /// Get maximum latency.
    pub fn max(&self) -> u64 {
        self.histogram.max()
    }

    /// Get mean latency.
    pub fn mean(&self) -> f64 {
        self.histogram.mean()
    }

    /// Get total count of recorded values.
    pub fn count(&self) -> u64 {
        self.histogram.len()
    }

    /// Snapshot the distribution for reporting.
    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            count: self.count(),
            p50: self.p50(),
            p90: self.p90(),
            p99: self.p99(),
            p999: self.p999(),
            max: self.max(),
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a latency distribution.
#[derive(Clone, Copy, Debug)]
pub struct LatencySummary {
    pub count: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p50={} p90={} p99={} p99.9={} max={}",
            format_latency(self.p50),
            format_latency(self.p90),
            format_latency(self.p99),
            format_latency(self.p999),
            format_latency(self.max),
        )
    }
}

/// Format a nanosecond latency with an appropriate unit.
pub fn format_latency(nanos: u64) -> String {
    if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}us", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", nanos as f64 / 1_000_000_000.0)
    }
}

/// Wall-clock timer for replay measurement.
pub struct ReplayTimer {
    clock: quanta::Clock,
    start: u64,
}

impl ReplayTimer {
    /// Start a new timer.
    pub fn start() -> Self {
        let clock = quanta::Clock::new();
        let start = clock.raw();
        Self { clock, start }
    }

    /// Raw timestamp for interval measurement.
    #[inline(always)]
    pub fn now_raw(&self) -> u64 {
        self.clock.raw()
    }

    /// Nanoseconds elapsed since `raw`.
    #[inline(always)]
    pub fn delta_ns(&self, raw: u64) -> u64 {
        self.clock.delta_as_nanos(raw, self.clock.raw())
    }

    /// Nanoseconds elapsed since the timer started.
    pub fn elapsed_ns(&self) -> u64 {
        self.clock.delta_as_nanos(self.start, self.clock.raw())
    }

    /// Seconds elapsed since the timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_ns() as f64 / 1_000_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_basic() {
        let mut h = LatencyHistogram::new();

        for i in 1..=100 {
            h.record(i * 100);
        }

        assert_eq!(h.count(), 100);
        assert!(h.p50() >= 4900 && h.p50() <= 5100);
        // HdrHistogram may round the max slightly.
        assert!(h.max() >= 10000 && h.max() <= 10100);
    }

    #[test]
    fn test_summary_display() {
        let mut h = LatencyHistogram::new();
        h.record(500);
        let text = h.summary().to_string();
        assert!(text.contains("p50="));
        assert!(text.contains("max="));
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(format_latency(500), "500ns");
        assert_eq!(format_latency(5000), "5.00us");
        assert_eq!(format_latency(5_000_000), "5.00ms");
        assert_eq!(format_latency(5_000_000_000), "5.00s");
    }

    #[test]
    fn test_timer_advances() {
        let timer = ReplayTimer::start();
        let t0 = timer.now_raw();
        let mut acc = 0u64;
        for i in 0..1000u64 {
            acc = acc.wrapping_add(i);
        }
        assert!(acc > 0);
        let _ = timer.delta_ns(t0);
        // elapsed is monotonic, not asserting a lower bound on fast machines
        let _ = timer.elapsed_ns();
    }
}
