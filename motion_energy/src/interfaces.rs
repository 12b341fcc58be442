// THEORY:
// The engine never decodes video or searches for feature correspondences
// itself. Those jobs belong to collaborators behind the narrow traits in this
// module: a `FrameSource` that yields frames in order, a `FeatureTracker` that
// finds and follows salient points, and an optional `FrameSink` that receives
// annotated frames. The `flow_runner` binary implements all three on OpenCV;
// tests implement them with scripted fakes.

use crate::core_modules::flow::Point;
use crate::error::Result;
use image::{GrayImage, RgbImage};
use serde::Serialize;
use std::fmt;

/// Properties of the input video, read once when the source is opened.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub total_frames: u64,
    pub fps: f64,
    pub fourcc: i32,
}

impl VideoInfo {
    /// The FourCC code as its four ASCII characters.
    pub fn codec(&self) -> String {
        self.fourcc
            .to_le_bytes()
            .iter()
            .map(|b| if b.is_ascii_graphic() { *b as char } else { '?' })
            .collect()
    }
}

impl fmt::Display for VideoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}, {} frames @ {:.3} fps, codec {}",
            self.width,
            self.height,
            self.total_frames,
            self.fps,
            self.codec()
        )
    }
}

pub trait FrameSource {
    fn info(&self) -> VideoInfo;

    /// Returns `Ok(None)` once the input is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;
}

/// Parameters for salient point detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorParams {
    pub max_points: usize,
    pub quality: f64,
    pub min_distance: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self { max_points: 100, quality: 0.2, min_distance: 5.0 }
    }
}

/// Correspondence of a point set into a later frame. All three vectors are
/// aligned with the input points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackResult {
    pub points: Vec<Point>,
    pub found: Vec<bool>,
    pub errors: Vec<f32>,
}

pub trait FeatureTracker {
    /// Detects up to `params.max_points` salient points over the whole frame.
    fn detect(&mut self, gray: &GrayImage, params: &DetectorParams) -> Result<Vec<Point>>;

    fn track(&mut self, prev_gray: &GrayImage, curr_gray: &GrayImage, prev_points: &[Point]) -> Result<TrackResult>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn info(&self) -> VideoInfo {
        (**self).info()
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        (**self).next_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_is_decoded_from_fourcc() {
        let fourcc = i32::from_le_bytes(*b"mp4v");
        let info = VideoInfo { width: 640, height: 480, total_frames: 300, fps: 30.0, fourcc };
        assert_eq!(info.codec(), "mp4v");
        assert_eq!(info.to_string(), "640x480, 300 frames @ 30.000 fps, codec mp4v");
    }

    #[test]
    fn unprintable_fourcc_bytes_are_masked() {
        let info = VideoInfo { width: 1, height: 1, total_frames: 0, fps: 1.0, fourcc: 0 };
        assert_eq!(info.codec(), "????");
    }
}
