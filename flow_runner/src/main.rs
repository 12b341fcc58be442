mod lk_tracker;
mod opencv_io;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use lk_tracker::LkTracker;
use motion_energy::{AnalysisConfig, EmptyFramePolicy, FrameSource, MotionPipeline, PrefetchSource};
use opencv_io::{OpenCvSink, OpenCvSource};
use std::path::PathBuf;
use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flow_runner", about = "Optical-flow motion statistics for a video file")]
struct Args {
    /// Input video. Optional when given in --config.
    input: Option<PathBuf>,
    /// Directory for mean.csv, var.csv, max.csv and summary.json.
    stats_dir: Option<PathBuf>,
    /// TOML file with an `AnalysisConfig`; flags below override it.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Write an annotated copy of the analyzed frames here.
    #[arg(long, value_name = "PATH")]
    output_video: Option<PathBuf>,
    /// Seconds discarded from the start of the input.
    #[arg(long)]
    start_offset: Option<f64>,
    #[arg(long)]
    skip_interval: Option<u32>,
    #[arg(long)]
    max_features: Option<usize>,
    #[arg(long)]
    variance_threshold: Option<f64>,
    /// Rolling window length in analyzed frames (default: one second of them).
    #[arg(long)]
    window_size: Option<usize>,
    #[arg(long, value_enum)]
    empty_frames: Option<EmptyFrames>,
    /// Decode this many frames ahead on a background task.
    #[arg(long)]
    prefetch: Option<usize>,
    /// Lucas-Kanade search window, in pixels.
    #[arg(long, default_value_t = 20)]
    lk_window: i32,
    #[arg(long, default_value_t = 5)]
    lk_levels: i32,
    #[arg(long)]
    no_antialias: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmptyFrames {
    Zero,
    HoldPrevious,
}

impl From<EmptyFrames> for EmptyFramePolicy {
    fn from(value: EmptyFrames) -> Self {
        match value {
            EmptyFrames::Zero => EmptyFramePolicy::Zero,
            EmptyFrames::HoldPrevious => EmptyFramePolicy::HoldPrevious,
        }
    }
}

fn resolve_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match (&args.config, &args.input, &args.stats_dir) {
        (Some(path), _, _) => AnalysisConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        (None, Some(input), Some(stats_dir)) => AnalysisConfig::new(input, stats_dir),
        (None, _, _) => bail!("Usage: flow_runner <input_video_path> <output_stats_dir> [--output-video PATH]"),
    };

    if let Some(input) = &args.input {
        config.input = input.clone();
    }
    if let Some(stats_dir) = &args.stats_dir {
        config.stats_dir = stats_dir.clone();
    }
    if args.output_video.is_some() {
        config.output_video = args.output_video.clone();
    }
    if let Some(v) = args.start_offset {
        config.start_offset_secs = v;
    }
    if let Some(v) = args.skip_interval {
        config.skip_interval = v;
    }
    if let Some(v) = args.max_features {
        config.max_features = v;
    }
    if let Some(v) = args.variance_threshold {
        config.variance_threshold = v;
    }
    if args.window_size.is_some() {
        config.window_size = args.window_size;
    }
    if let Some(v) = args.empty_frames {
        config.empty_frame_policy = v.into();
    }
    if let Some(v) = args.prefetch {
        config.prefetch_frames = v;
    }
    if args.no_antialias {
        config.draw.antialiased = false;
    }

    config.validate()?;
    Ok(config)
}

fn analyze(config: AnalysisConfig, tracker: LkTracker, runtime: Handle) -> Result<()> {
    let decoder = OpenCvSource::open(&config.input)?;
    let info = decoder.info();
    let source: Box<dyn FrameSource> = if config.prefetch_frames > 0 {
        Box::new(PrefetchSource::spawn(decoder, config.prefetch_frames, &runtime))
    } else {
        Box::new(decoder)
    };

    let stats_dir = config.stats_dir.clone();
    let output_video = config.output_video.clone();
    let skip_interval = config.skip_interval;

    let mut pipeline = MotionPipeline::open(config, source, tracker)?;
    if let Some(path) = output_video {
        let sink = OpenCvSink::create(&path, &info, info.fps / skip_interval as f64)?;
        info!("output file path: {}", path.display());
        pipeline = pipeline.with_sink(Box::new(sink));
    }

    let outcome = pipeline.run()?;
    outcome
        .write_to(&stats_dir)
        .with_context(|| format!("failed to write statistics to {}", stats_dir.display()))?;
    info!(
        rows = outcome.summary.rows_emitted,
        suppressed = outcome.summary.suppressed_frames,
        empty = outcome.summary.empty_frames,
        "statistics written to {}",
        stats_dir.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("motion_energy=info,flow_runner=info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = resolve_config(&args)?;
    let tracker = LkTracker::new(args.lk_window, args.lk_levels);
    let runtime = Handle::current();

    tokio::task::spawn_blocking(move || analyze(config, tracker, runtime))
        .await
        .context("analysis task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("flow_runner").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn positional_paths_with_defaults() {
        let config = resolve_config(&parse(&["clip.mp4", "out"])).unwrap();
        assert_eq!(config.input, PathBuf::from("clip.mp4"));
        assert_eq!(config.stats_dir, PathBuf::from("out"));
        assert_eq!(config.output_video, None);
        assert_eq!(config.start_offset_secs, 4.0);
        assert_eq!(config.variance_threshold, 200.0);
        assert!(config.draw.antialiased);
    }

    #[test]
    fn flags_override_defaults() {
        let config = resolve_config(&parse(&[
            "clip.mp4",
            "out",
            "--output-video",
            "annotated.mp4",
            "--skip-interval",
            "3",
            "--variance-threshold",
            "120.5",
            "--empty-frames",
            "hold-previous",
            "--no-antialias",
        ]))
        .unwrap();
        assert_eq!(config.output_video, Some(PathBuf::from("annotated.mp4")));
        assert_eq!(config.skip_interval, 3);
        assert_eq!(config.variance_threshold, 120.5);
        assert_eq!(config.empty_frame_policy, EmptyFramePolicy::HoldPrevious);
        assert!(!config.draw.antialiased);
    }

    #[test]
    fn paths_are_required_without_config_file() {
        assert!(resolve_config(&parse(&["clip.mp4"])).is_err());
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        assert!(resolve_config(&parse(&["clip.mp4", "out", "--skip-interval", "0"])).is_err());
        assert!(resolve_config(&parse(&["clip.mp4", "out", "--window-size", "18446744073709551615"])).is_err());
        assert!(resolve_config(&parse(&["clip.mp4", "out", "--start-offset", "inf"])).is_err());
    }
}
