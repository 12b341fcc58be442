// THEORY:
// This file is the entry point for the `motion_energy` library crate. It turns a
// video into three aligned time series (rolling mean, rolling variance and
// rolling max of optical-flow magnitudes) that rise during disordered motion.
//
// `MotionPipeline` and its configuration are the high-level interface. The
// statistics stages live in `core_modules` and are usable on their own. Video
// decoding, encoding and feature tracking are collaborators behind the traits
// in `interfaces`; this crate carries no video or computer-vision backend.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod interfaces;
pub mod pipeline;
pub mod prefetch;
pub mod render;

pub use config::{AnalysisConfig, MAX_WINDOW_SIZE};
pub use core_modules::flow::Point;
pub use core_modules::frame_stats::{EmptyFramePolicy, FrameStatistics};
pub use error::{MotionError, Result};
pub use interfaces::{DetectorParams, FeatureTracker, FrameSink, FrameSource, TrackResult, VideoInfo};
pub use pipeline::{MotionPipeline, PipelineState, RunOutcome, RunSummary};
pub use prefetch::PrefetchSource;
pub use render::DrawStyle;
