//! Statistics over repeated transfer runs.

use std::fmt;

/// Summary of repeated transfer durations, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationStats {
    /// Fastest run.
    pub min: f64,
    /// Slowest run.
    pub max: f64,
    /// Mean duration.
    pub mean: f64,
    /// Median duration.
    pub median: f64,
    /// Number of runs.
    pub count: usize,
}

impl fmt::Display for DurationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "runs {} min {:.3} mean {:.3} median {:.3} max {:.3}",
            self.count, self.min, self.mean, self.median, self.max
        )
    }
}

/// Collects durations and computes statistics.
#[derive(Debug, Default)]
pub struct DurationCollector {
    samples: Vec<f64>,
}

impl DurationCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collector with room for `capacity` runs.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Records a duration in seconds.
    pub fn record(&mut self, seconds: f64) {
        self.samples.push(seconds);
    }

    /// Computes statistics, or `None` without samples.
    #[must_use]
    pub fn stats(&self) -> Option<DurationStats> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted = self.samples.clone();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        Some(DurationStats {
            min: sorted[0],
            max: sorted[count - 1],
            mean: sorted.iter().sum::<f64>() / count as f64,
            median,
            count,
        })
    }

    /// Returns the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
