// THEORY:
// `FrameStatistics` is the per-frame summary of a magnitude set: how much the
// tracked features moved on average, how uneven that motion was, and how far
// the fastest feature travelled. Variance is the population variance, since the
// magnitude set is the whole population of tracked features for that frame.
//
// A frame can end up with no tracked features at all. Mean and variance are
// undefined there, so the calculator reports `None` and the caller picks the
// values through an `EmptyFramePolicy`. A NaN must never reach the rolling
// windows: it would poison every sum it takes part in.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameStatistics {
    pub mean: f64,
    pub variance: f64,
    pub max: f64,
}

impl FrameStatistics {
    pub const ZERO: FrameStatistics = FrameStatistics { mean: 0.0, variance: 0.0, max: 0.0 };

    /// Returns `None` when the set is empty.
    pub fn from_magnitudes(magnitudes: &[f64]) -> Option<Self> {
        if magnitudes.is_empty() {
            return None;
        }
        let count = magnitudes.len() as f64;
        let mean = magnitudes.iter().sum::<f64>() / count;
        let variance = magnitudes.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
        let max = magnitudes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self { mean, variance, max })
    }
}

/// What a frame without any tracked feature contributes to the windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyFramePolicy {
    /// Mean, variance and max are all zero.
    #[default]
    Zero,
    /// Mean and variance repeat the previous analyzed frame; max is zero.
    HoldPrevious,
}

impl EmptyFramePolicy {
    pub fn resolve(&self, computed: Option<FrameStatistics>, previous: Option<FrameStatistics>) -> FrameStatistics {
        match (computed, self) {
            (Some(stats), _) => stats,
            (None, EmptyFramePolicy::Zero) => FrameStatistics::ZERO,
            (None, EmptyFramePolicy::HoldPrevious) => {
                let previous = previous.unwrap_or(FrameStatistics::ZERO);
                FrameStatistics { mean: previous.mean, variance: previous.variance, max: 0.0 }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn two_magnitudes() {
        let stats = FrameStatistics::from_magnitudes(&[3.0, 4.0]).unwrap();
        assert_relative_eq!(stats.mean, 3.5);
        assert_relative_eq!(stats.variance, 0.25);
        assert_relative_eq!(stats.max, 4.0);
    }

    #[test]
    fn single_magnitude_has_no_spread() {
        let stats = FrameStatistics::from_magnitudes(&[7.5]).unwrap();
        assert_eq!(stats, FrameStatistics { mean: 7.5, variance: 0.0, max: 7.5 });
    }

    #[test]
    fn empty_set_is_reported() {
        assert_eq!(FrameStatistics::from_magnitudes(&[]), None);
    }

    #[test]
    fn zero_policy_never_produces_nan() {
        let stats = EmptyFramePolicy::Zero.resolve(None, Some(FrameStatistics { mean: 2.0, variance: 1.0, max: 3.0 }));
        assert_eq!(stats, FrameStatistics::ZERO);
    }

    #[test]
    fn hold_previous_repeats_mean_and_variance() {
        let previous = FrameStatistics { mean: 2.0, variance: 1.0, max: 3.0 };
        let stats = EmptyFramePolicy::HoldPrevious.resolve(None, Some(previous));
        assert_eq!(stats, FrameStatistics { mean: 2.0, variance: 1.0, max: 0.0 });

        let first = EmptyFramePolicy::HoldPrevious.resolve(None, None);
        assert_eq!(first, FrameStatistics::ZERO);
    }

    #[test]
    fn computed_values_pass_through_any_policy() {
        let computed = FrameStatistics { mean: 1.0, variance: 0.5, max: 2.0 };
        assert_eq!(EmptyFramePolicy::Zero.resolve(Some(computed), None), computed);
        assert_eq!(EmptyFramePolicy::HoldPrevious.resolve(Some(computed), None), computed);
    }

    proptest! {
        #[test]
        fn variance_non_negative_and_max_exact(values in prop::collection::vec(0.0f64..1_000.0, 1..128)) {
            let stats = FrameStatistics::from_magnitudes(&values).unwrap();
            prop_assert!(stats.variance >= 0.0);
            prop_assert!(values.iter().all(|v| *v <= stats.max));
            prop_assert!(values.iter().any(|v| *v == stats.max));
        }
    }
}
