// THEORY:
// The `WindowAccumulator` is the temporal smoothing stage. Per-frame statistics
// are noisy; summing them over roughly one second of analyzed frames gives a
// signal that rises and falls with sustained motion instead of single frames.
//
// Between frames the accumulator keeps exactly `window_size - 1` values. On each
// frame the incoming value is appended, all `window_size` values are summed for
// emission, and the oldest is dropped again. The window starts out filled with
// zeros, so the first `window_size - 1` emissions are partial sums over the
// values seen so far. Exactly `window_size` samples contribute to every output.

use crate::core_modules::frame_stats::FrameStatistics;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct WindowAccumulator {
    window_size: usize,
    retained: VecDeque<f64>,
}

impl WindowAccumulator {
    /// # Panics
    /// If `window_size` is zero.
    pub fn new(window_size: usize) -> Self {
        assert!(window_size >= 1, "window size must be at least 1");
        let mut retained = VecDeque::with_capacity(window_size);
        retained.resize(window_size - 1, 0.0);
        Self { window_size, retained }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of values retained between frames. Always `window_size - 1`.
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// Feeds one frame's value and returns the sum over the last `window_size` values.
    pub fn observe(&mut self, value: f64) -> f64 {
        self.retained.push_back(value);
        debug_assert_eq!(self.retained.len(), self.window_size);

        let emitted: f64 = self.retained.iter().sum();

        self.retained.pop_front();
        debug_assert_eq!(self.retained.len(), self.window_size - 1);
        emitted
    }
}

/// The three window sums emitted for one analyzed frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowSums {
    pub mean: f64,
    pub variance: f64,
    pub max: f64,
}

/// One accumulator per statistic, always observed together.
#[derive(Debug, Clone)]
pub struct MotionWindows {
    mean: WindowAccumulator,
    variance: WindowAccumulator,
    max: WindowAccumulator,
}

impl MotionWindows {
    pub fn new(window_size: usize) -> Self {
        Self {
            mean: WindowAccumulator::new(window_size),
            variance: WindowAccumulator::new(window_size),
            max: WindowAccumulator::new(window_size),
        }
    }

    pub fn window_size(&self) -> usize {
        self.mean.window_size()
    }

    /// Observes mean, then variance, then max.
    pub fn observe(&mut self, stats: &FrameStatistics) -> WindowSums {
        let mean = self.mean.observe(stats.mean);
        let variance = self.variance.observe(stats.variance);
        let max = self.max.observe(stats.max);
        WindowSums { mean, variance, max }
    }
}
