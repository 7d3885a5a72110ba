//! Rolling processing-latency statistics.
//!
//! The tick processor records how long every decision took. The last
//! `window` samples feed the average/max figures; the violation counter
//! covers the whole session.

use std::collections::VecDeque;
use std::time::Duration;

/// A duration in fractional milliseconds.
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Rolling window of per-tick processing times.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    window: usize,
    samples: VecDeque<f64>,
    budget_ms: f64,
    total_samples: u64,
    violations: u64,
}

impl LatencyStats {
    /// Track the last `window` samples against a budget in milliseconds.
    pub fn new(window: usize, budget_ms: f64) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
            budget_ms,
            total_samples: 0,
            violations: 0,
        }
    }

    /// Record one tick's processing time. Returns `true` when it exceeded
    /// the budget.
    pub fn record(&mut self, elapsed_ms: f64) -> bool {
        while self.samples.len() >= self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed_ms);
        self.total_samples = self.total_samples.saturating_add(1);

        let violated = elapsed_ms > self.budget_ms;
        if violated {
            self.violations = self.violations.saturating_add(1);
        }
        violated
    }

    /// Mean of the samples in the window, `0.0` when empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        // Window sizes are small; usize -> f64 is exact here.
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Largest sample in the window, `0.0` when empty.
    pub fn max_ms(&self) -> f64 {
        self.samples.iter().copied().fold(0.0, f64::max)
    }

    /// Most recent sample.
    pub fn last_ms(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Budget breaches over the whole session.
    pub const fn violations(&self) -> u64 {
        self.violations
    }

    /// Samples recorded over the whole session.
    pub const fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Samples currently in the window.
    pub fn window_len(&self) -> usize {
        self.samples.len()
    }

    /// The configured budget in milliseconds.
    pub const fn budget_ms(&self) -> f64 {
        self.budget_ms
    }
}
