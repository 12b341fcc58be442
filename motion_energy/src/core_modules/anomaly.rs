// THEORY:
// A scene cut, a dropped frame or a sensor glitch makes the tracker pair up
// unrelated features, and the resulting magnitudes scatter wildly. The anomaly
// filter treats an implausibly large variance as a sign of such a disordered
// frame and discards the frame's statistics outright. The frame still occupies
// its slot in the rolling windows, but it contributes nothing to them.
//
// This is a floor clip, not a clamp: a frame over the threshold becomes zero,
// it is not capped at the threshold.

use crate::core_modules::frame_stats::FrameStatistics;
use tracing::warn;

pub const DEFAULT_VARIANCE_THRESHOLD: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyFilter {
    pub variance_threshold: f64,
}

impl Default for AnomalyFilter {
    fn default() -> Self {
        Self { variance_threshold: DEFAULT_VARIANCE_THRESHOLD }
    }
}

impl AnomalyFilter {
    pub fn new(variance_threshold: f64) -> Self {
        Self { variance_threshold }
    }

    pub fn is_anomalous(&self, stats: &FrameStatistics) -> bool {
        stats.variance > self.variance_threshold
    }

    pub fn apply(&self, stats: FrameStatistics) -> FrameStatistics {
        if self.is_anomalous(&stats) {
            warn!(
                variance = stats.variance,
                threshold = self.variance_threshold,
                "variance: {}",
                stats.variance
            );
            return FrameStatistics::ZERO;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn over_threshold_frame_is_discarded() {
        let filter = AnomalyFilter::default();
        let stats = FrameStatistics { mean: 40.0, variance: 250.0, max: 90.0 };
        assert_eq!(filter.apply(stats), FrameStatistics::ZERO);
    }

    #[test]
    fn threshold_itself_is_accepted() {
        let filter = AnomalyFilter::new(200.0);
        let stats = FrameStatistics { mean: 12.0, variance: 200.0, max: 30.0 };
        assert_eq!(filter.apply(stats), stats);
    }

    #[test]
    fn calm_frame_passes_unchanged() {
        let filter = AnomalyFilter::new(10.0);
        let stats = FrameStatistics { mean: 1.5, variance: 0.25, max: 2.0 };
        assert!(!filter.is_anomalous(&stats));
        assert_eq!(filter.apply(stats), stats);
    }

    proptest! {
        #[test]
        fn filtering_is_idempotent(
            mean in 0.0f64..100.0,
            variance in 0.0f64..500.0,
            max in 0.0f64..200.0,
            threshold in 0.0f64..400.0,
        ) {
            let filter = AnomalyFilter::new(threshold);
            let once = filter.apply(FrameStatistics { mean, variance, max });
            prop_assert_eq!(filter.apply(once), once);
        }
    }
}
