use std::{fmt::Display, time::Duration};

pub mod math;
pub mod robot;

/// Keeps running timing statistics (in milliseconds) of some repeated operation, such as one
/// predict/update/resample cycle of the filter.
pub struct PerfStats {
    mean: f64,
    var_sum: f64,
    sample_count: usize,
    min: f64,
    max: f64,
    latest: f64,
    total: f64,
}

impl Default for PerfStats {
    fn default() -> Self {
        Self {
            mean: 0.0,
            var_sum: 0.0,
            sample_count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            latest: 0.0,
            total: 0.0,
        }
    }
}

impl PerfStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default()
    }

    /// Adds one sample using Welford's online algorithm.
    pub fn update(&mut self, duration: Duration) {
        let msecs = duration.as_secs_f64() * 1000.0;

        self.sample_count += 1;
        let delta = msecs - self.mean;
        self.mean += delta / self.sample_count as f64;
        self.var_sum += delta * (msecs - self.mean);

        self.min = self.min.min(msecs);
        self.max = self.max.max(msecs);
        self.latest = msecs;
        self.total += msecs;
    }

    pub fn latest(&self) -> f64 {
        self.latest
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std(&self) -> f64 {
        if self.sample_count < 2 {
            0.0
        } else {
            (self.var_sum / self.sample_count as f64).sqrt()
        }
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }
}

impl Display for PerfStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.sample_count == 0 {
            return write!(f, "no samples");
        }
        write!(
            f,
            "{:>5.2}ms ({:.2}±{:.2}, [{:.2}, {:.2}], {} samples, {:.1}ms total)",
            self.latest,
            self.mean,
            self.std(),
            self.min,
            self.max,
            self.sample_count,
            self.total
        )
    }
}
