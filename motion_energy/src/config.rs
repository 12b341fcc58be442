// THEORY:
// `AnalysisConfig` is the whole tunable surface of a run. It can be loaded from
// a TOML file, where every field except the paths has a default, and the
// runner's command line can override any field after loading. Values that the
// frame rate decides (the window size, the number of skipped frames) are derived
// here from the `VideoInfo` so the pipeline never has to guess.

use crate::core_modules::anomaly::DEFAULT_VARIANCE_THRESHOLD;
use crate::core_modules::frame_stats::EmptyFramePolicy;
use crate::error::{MotionError, Result};
use crate::interfaces::DetectorParams;
use crate::render::DrawStyle;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Upper bound on the rolling window, in analyzed frames.
pub const MAX_WINDOW_SIZE: usize = 10_000;

/// Configuration for one analysis run.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub input: PathBuf,
    /// Directory receiving `mean.csv`, `var.csv`, `max.csv` and `summary.json`.
    pub stats_dir: PathBuf,
    /// Annotated video output. Rendering is disabled when absent.
    #[serde(default)]
    pub output_video: Option<PathBuf>,
    /// Seconds of footage discarded before analysis starts.
    #[serde(default = "default_start_offset_secs")]
    pub start_offset_secs: f64,
    /// Analyze every n-th decoded frame.
    #[serde(default = "default_skip_interval")]
    pub skip_interval: u32,
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    #[serde(default = "default_feature_quality")]
    pub feature_quality: f64,
    #[serde(default = "default_feature_min_distance")]
    pub feature_min_distance: f64,
    #[serde(default = "default_variance_threshold")]
    pub variance_threshold: f64,
    /// Explicit window length in analyzed frames. Derived from the frame rate when absent.
    #[serde(default)]
    pub window_size: Option<usize>,
    #[serde(default)]
    pub empty_frame_policy: EmptyFramePolicy,
    /// Frames decoded ahead on a background task. Zero decodes inline.
    #[serde(default)]
    pub prefetch_frames: usize,
    #[serde(default)]
    pub draw: DrawStyle,
}

fn default_start_offset_secs() -> f64 {
    4.0
}

fn default_skip_interval() -> u32 {
    1
}

fn default_max_features() -> usize {
    100
}

fn default_feature_quality() -> f64 {
    0.2
}

fn default_feature_min_distance() -> f64 {
    5.0
}

fn default_variance_threshold() -> f64 {
    DEFAULT_VARIANCE_THRESHOLD
}

impl AnalysisConfig {
    pub fn new(input: impl Into<PathBuf>, stats_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            stats_dir: stats_dir.into(),
            output_video: None,
            start_offset_secs: default_start_offset_secs(),
            skip_interval: default_skip_interval(),
            max_features: default_max_features(),
            feature_quality: default_feature_quality(),
            feature_min_distance: default_feature_min_distance(),
            variance_threshold: default_variance_threshold(),
            window_size: None,
            empty_frame_policy: EmptyFramePolicy::default(),
            prefetch_frames: 0,
            draw: DrawStyle::default(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.skip_interval == 0 {
            return Err(MotionError::InvalidConfig("skip_interval must be at least 1".into()));
        }
        if self.window_size == Some(0) {
            return Err(MotionError::InvalidConfig("window_size must be at least 1".into()));
        }
        if let Some(size) = self.window_size {
            check_window_size(size)?;
        }
        if !self.start_offset_secs.is_finite() || self.start_offset_secs < 0.0 {
            return Err(MotionError::InvalidConfig(format!(
                "start_offset_secs must be finite and non-negative, got {}",
                self.start_offset_secs
            )));
        }
        if !self.variance_threshold.is_finite() {
            return Err(MotionError::InvalidConfig("variance_threshold must be finite".into()));
        }
        Ok(())
    }

    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            max_points: self.max_features,
            quality: self.feature_quality,
            min_distance: self.feature_min_distance,
        }
    }

    /// `ceil(fps / skip_interval)`, at least 1, unless overridden.
    pub fn window_size_for(&self, fps: f64) -> Result<usize> {
        if let Some(size) = self.window_size {
            check_window_size(size)?;
            return Ok(size);
        }
        check_fps(fps)?;
        let size = ((fps / self.skip_interval as f64).ceil() as usize).max(1);
        check_window_size(size)?;
        Ok(size)
    }

    /// Number of leading frames discarded before analysis.
    pub fn frames_to_skip(&self, fps: f64) -> Result<u64> {
        check_fps(fps)?;
        Ok((self.start_offset_secs * fps) as u64)
    }
}

fn check_window_size(size: usize) -> Result<()> {
    if size > MAX_WINDOW_SIZE {
        return Err(MotionError::InvalidConfig(format!(
            "window_size {size} exceeds the limit of {MAX_WINDOW_SIZE} analyzed frames"
        )));
    }
    Ok(())
}

fn check_fps(fps: f64) -> Result<()> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(MotionError::InvalidConfig(format!(
            "source reports an unusable frame rate: {fps}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_file_takes_defaults() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            input = "clips/tank.mp4"
            stats_dir = "out/tank"
            "#,
        )
        .unwrap();

        assert_eq!(config.input, PathBuf::from("clips/tank.mp4"));
        assert_eq!(config.output_video, None);
        assert_eq!(config.start_offset_secs, 4.0);
        assert_eq!(config.skip_interval, 1);
        assert_eq!(config.max_features, 100);
        assert_eq!(config.variance_threshold, 200.0);
        assert_eq!(config.empty_frame_policy, EmptyFramePolicy::Zero);
        assert_eq!(config.draw, DrawStyle::default());
    }

    #[test]
    fn file_overrides_and_nested_style() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            input = "a.mp4"
            stats_dir = "stats"
            output_video = "annotated.mp4"
            skip_interval = 2
            variance_threshold = 150.0
            empty_frame_policy = "hold_previous"

            [draw]
            antialiased = false
            point_radius = 3
            "#
        )
        .unwrap();

        let config = AnalysisConfig::from_file(file.path()).unwrap();
        assert_eq!(config.output_video, Some(PathBuf::from("annotated.mp4")));
        assert_eq!(config.skip_interval, 2);
        assert_eq!(config.variance_threshold, 150.0);
        assert_eq!(config.empty_frame_policy, EmptyFramePolicy::HoldPrevious);
        assert!(!config.draw.antialiased);
        assert_eq!(config.draw.point_radius, 3);
        assert_eq!(config.draw.line_thickness, 2);
    }

    #[test]
    fn missing_paths_are_a_parse_error() {
        let err = AnalysisConfig::from_toml_str("skip_interval = 1").unwrap_err();
        assert!(matches!(err, MotionError::Config(_)));
    }

    #[test]
    fn zero_skip_interval_is_rejected() {
        let err = AnalysisConfig::from_toml_str("input = \"a\"\nstats_dir = \"b\"\nskip_interval = 0").unwrap_err();
        assert!(matches!(err, MotionError::InvalidConfig(_)));
    }

    #[test]
    fn window_size_follows_frame_rate() {
        let mut config = AnalysisConfig::new("a.mp4", "stats");
        assert_eq!(config.window_size_for(30.0).unwrap(), 30);
        assert_eq!(config.window_size_for(29.97).unwrap(), 30);

        config.skip_interval = 4;
        assert_eq!(config.window_size_for(30.0).unwrap(), 8);
        assert_eq!(config.window_size_for(0.5).unwrap(), 1);

        config.window_size = Some(5);
        assert_eq!(config.window_size_for(30.0).unwrap(), 5);
    }

    #[test]
    fn unusable_frame_rate_is_rejected() {
        let config = AnalysisConfig::new("a.mp4", "stats");
        assert!(matches!(config.window_size_for(0.0), Err(MotionError::InvalidConfig(_))));
        assert!(matches!(config.frames_to_skip(f64::NAN), Err(MotionError::InvalidConfig(_))));
    }

    #[test]
    fn skipped_frames_truncate() {
        let mut config = AnalysisConfig::new("a.mp4", "stats");
        assert_eq!(config.frames_to_skip(29.97).unwrap(), 119);
        config.start_offset_secs = 0.0;
        assert_eq!(config.frames_to_skip(30.0).unwrap(), 0);
    }

    #[test]
    fn oversized_window_is_rejected() {
        let mut config = AnalysisConfig::new("a.mp4", "stats");
        config.window_size = Some(usize::MAX);
        assert!(matches!(config.validate(), Err(MotionError::InvalidConfig(_))));
        assert!(matches!(config.window_size_for(30.0), Err(MotionError::InvalidConfig(_))));

        config.window_size = Some(MAX_WINDOW_SIZE);
        assert!(config.validate().is_ok());
        assert_eq!(config.window_size_for(30.0).unwrap(), MAX_WINDOW_SIZE);

        let err = AnalysisConfig::from_toml_str("input = \"a\"\nstats_dir = \"b\"\nwindow_size = 50000").unwrap_err();
        assert!(matches!(err, MotionError::InvalidConfig(_)));
    }

    #[test]
    fn derived_window_is_bounded_too() {
        let config = AnalysisConfig::new("a.mp4", "stats");
        assert!(matches!(config.window_size_for(1.0e6), Err(MotionError::InvalidConfig(_))));
        assert!(matches!(config.window_size_for(f64::MAX), Err(MotionError::InvalidConfig(_))));
    }

    #[test]
    fn infinite_start_offset_is_rejected() {
        let mut config = AnalysisConfig::new("a.mp4", "stats");
        config.start_offset_secs = f64::INFINITY;
        assert!(matches!(config.validate(), Err(MotionError::InvalidConfig(_))));

        let err = AnalysisConfig::from_toml_str("input = \"a\"\nstats_dir = \"b\"\nstart_offset_secs = inf").unwrap_err();
        assert!(matches!(err, MotionError::InvalidConfig(_)));
    }
}
