// THEORY:
// The `pipeline` module is the top-level API of the engine. `MotionPipeline`
// pulls frames from a `FrameSource`, asks a `FeatureTracker` where the salient
// points of the previous analyzed frame went, and pushes the result through the
// statistics stack:
//
//   flow reduction -> frame statistics -> anomaly filter -> rolling windows -> series
//
// Data only ever moves forward through those stages. The driver owns the three
// rolling windows and the previous grayscale frame; nothing else holds state
// across frames.
//
// Every run walks the same phases. `Skip` discards the opening seconds of
// footage, `Warmup` is the first analyzed frame (there is nothing to compare it
// with yet), `Steady` covers every analyzed frame after that, and `Done` is
// reached when the source runs dry.

use crate::config::AnalysisConfig;
use crate::core_modules::anomaly::AnomalyFilter;
use crate::core_modules::flow::{Point, reduce_flow};
use crate::core_modules::frame_stats::FrameStatistics;
use crate::core_modules::series::{CsvSeriesWriter, SeriesEmitter, SeriesWriter};
use crate::core_modules::window::MotionWindows;
use crate::error::Result;
use crate::interfaces::{DetectorParams, FeatureTracker, FrameSink, FrameSource, VideoInfo};
use crate::render::TrajectoryCanvas;
use image::{GrayImage, RgbImage, imageops};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

const PROGRESS_INTERVAL: u64 = 100;
pub const SUMMARY_FILE: &str = "summary.json";

/// Phase of the pipeline after the most recent `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Skip,
    Warmup,
    Steady,
    Done,
}

/// Counters describing a run, written next to the series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub decoded_frames: u64,
    pub skipped_frames: u64,
    pub analyzed_frames: u64,
    pub rows_emitted: u64,
    /// Frames zeroed by the anomaly filter.
    pub suppressed_frames: u64,
    /// Frames in which no feature could be tracked.
    pub empty_frames: u64,
    pub window_size: usize,
    pub video: VideoInfo,
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub series: SeriesEmitter,
    pub summary: RunSummary,
}

impl RunOutcome {
    pub fn persist<W: SeriesWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        self.series.persist(writer)
    }

    /// Writes `mean.csv`, `var.csv`, `max.csv` and `summary.json` into `stats_dir`.
    pub fn write_to(&self, stats_dir: &Path) -> Result<()> {
        let mut writer = CsvSeriesWriter::new(stats_dir);
        self.persist(&mut writer)?;
        fs::create_dir_all(stats_dir)?;
        let out = BufWriter::new(File::create(stats_dir.join(SUMMARY_FILE))?);
        serde_json::to_writer_pretty(out, &self.summary)?;
        Ok(())
    }
}

pub struct MotionPipeline<S, T> {
    source: S,
    tracker: T,
    config: AnalysisConfig,
    info: VideoInfo,
    detector: DetectorParams,
    filter: AnomalyFilter,
    windows: MotionWindows,
    emitter: SeriesEmitter,
    sink: Option<Box<dyn FrameSink>>,
    canvas: Option<TrajectoryCanvas>,
    state: PipelineState,
    frames_to_skip: u64,
    canvas_reset_interval: u64,
    frame_number: u64,
    prev_gray: Option<GrayImage>,
    previous_stats: Option<FrameStatistics>,
    summary: RunSummary,
}

impl<S: FrameSource, T: FeatureTracker> MotionPipeline<S, T> {
    pub fn open(config: AnalysisConfig, source: S, tracker: T) -> Result<Self> {
        config.validate()?;
        let info = source.info();
        info!(input = %config.input.display(), "{}", info);

        let window_size = config.window_size_for(info.fps)?;
        let frames_to_skip = config.frames_to_skip(info.fps)?;
        info!(window_size, frames_to_skip, skip_interval = config.skip_interval, "analysis configured");

        Ok(Self {
            source,
            tracker,
            detector: config.detector_params(),
            filter: AnomalyFilter::new(config.variance_threshold),
            windows: MotionWindows::new(window_size),
            emitter: SeriesEmitter::new(),
            sink: None,
            canvas: None,
            state: PipelineState::Skip,
            frames_to_skip,
            canvas_reset_interval: (info.fps as u64).max(1),
            frame_number: 0,
            prev_gray: None,
            previous_stats: None,
            summary: RunSummary { window_size, video: info, ..RunSummary::default() },
            info,
            config,
        })
    }

    /// Renders trajectories onto every analyzed frame and hands the result to `sink`.
    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn series(&self) -> &SeriesEmitter {
        &self.emitter
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Pulls and processes one decoded frame.
    pub fn step(&mut self) -> Result<PipelineState> {
        if self.state == PipelineState::Done {
            return Ok(PipelineState::Done);
        }
        let Some(frame) = self.source.next_frame()? else {
            self.state = PipelineState::Done;
            info!(rows = self.emitter.rows(), "DONE: optical flow");
            return Ok(self.state);
        };

        self.frame_number += 1;
        self.summary.decoded_frames += 1;
        if self.frame_number % PROGRESS_INTERVAL == 0 {
            info!("frame number: {}/{}", self.frame_number, self.info.total_frames);
        }

        if self.frame_number <= self.frames_to_skip {
            self.summary.skipped_frames += 1;
            return Ok(self.state);
        }
        if self.state == PipelineState::Skip {
            self.state = PipelineState::Warmup;
        }
        if self.frame_number % self.config.skip_interval as u64 != 0 {
            return Ok(self.state);
        }

        let curr_gray = imageops::grayscale(&frame);
        if let Some(prev_gray) = self.prev_gray.take() {
            let rows = self.emitter.rows();
            if let Err(err) = self.analyze(&prev_gray, &curr_gray, &frame) {
                // No row emitted: keep the reference frame so the next step retries against it.
                if self.emitter.rows() == rows {
                    self.prev_gray = Some(prev_gray);
                } else {
                    self.prev_gray = Some(curr_gray);
                    self.state = PipelineState::Steady;
                }
                return Err(err);
            }
            self.state = PipelineState::Steady;
        }

        if self.frame_number % self.canvas_reset_interval == 0 {
            if let Some(canvas) = self.canvas.as_mut() {
                debug!(frame = self.frame_number, "trajectory canvas reset");
                canvas.clear();
            }
        }

        self.prev_gray = Some(curr_gray);
        Ok(self.state)
    }

    /// Drives the pipeline until the source is exhausted.
    pub fn run(mut self) -> Result<RunOutcome> {
        while self.step()? != PipelineState::Done {}
        Ok(RunOutcome { series: self.emitter, summary: self.summary })
    }

    fn analyze(
        &mut self,
        prev_gray: &GrayImage,
        curr_gray: &GrayImage,
        frame: &RgbImage,
    ) -> Result<()> {
        let prev_points = self.tracker.detect(prev_gray, &self.detector)?;
        let (curr_points, found) = if prev_points.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            let tracked = self.tracker.track(prev_gray, curr_gray, &prev_points)?;
            (tracked.points, tracked.found)
        };

        let magnitudes = reduce_flow(&prev_points, &curr_points, &found)?;
        let computed = FrameStatistics::from_magnitudes(&magnitudes);
        if computed.is_none() {
            self.summary.empty_frames += 1;
            debug!(frame = self.frame_number, detected = prev_points.len(), "no feature tracked");
        }
        let stats = self.config.empty_frame_policy.resolve(computed, self.previous_stats);
        if self.filter.is_anomalous(&stats) {
            self.summary.suppressed_frames += 1;
        }
        let stats = self.filter.apply(stats);
        self.previous_stats = Some(stats);

        let sums = self.windows.observe(&stats);
        self.emitter.emit(sums);
        self.summary.analyzed_frames += 1;
        self.summary.rows_emitted = self.emitter.rows() as u64;

        if self.sink.is_some() {
            let annotated = self.annotate(frame, &prev_points, &curr_points, &found);
            if let Some(sink) = self.sink.as_mut() {
                sink.write_frame(&annotated)?;
            }
        }
        Ok(())
    }

    fn annotate(&mut self, frame: &RgbImage, prev_points: &[Point], curr_points: &[Point], found: &[bool]) -> RgbImage {
        let (width, height) = frame.dimensions();
        let style = self.config.draw;
        let canvas = self
            .canvas
            .get_or_insert_with(|| TrajectoryCanvas::new(width, height, style));

        let mut tracked = Vec::with_capacity(curr_points.len());
        for ((prev, curr), _) in prev_points.iter().zip(curr_points).zip(found).filter(|(_, f)| **f) {
            canvas.add_trajectory(*prev, *curr);
            tracked.push(*curr);
        }
        canvas.compose(frame, &tracked)
    }
}
