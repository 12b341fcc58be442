// THEORY:
// Decoding is usually the slowest part of a run, and it does not depend on
// anything the analysis computes. `PrefetchSource` moves it onto a blocking
// tokio task that stays up to `capacity` frames ahead, connected to the
// pipeline by a bounded channel. The channel carries the source's own results,
// so the end marker (`Ok(None)`) and decode errors arrive in order with the
// frames. A channel that closes without the end marker means the decoder task
// died, and that is reported as an error rather than a short video.

use crate::error::{MotionError, Result};
use crate::interfaces::{FrameSource, VideoInfo};
use image::RgbImage;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

/// Decodes ahead of the pipeline on a blocking tokio task.
///
/// Frames still arrive strictly in decode order, so wrapping a source in a
/// `PrefetchSource` changes throughput only. `next_frame` blocks the calling
/// thread and must not be called from inside an async context.
pub struct PrefetchSource {
    info: VideoInfo,
    frames: mpsc::Receiver<Result<Option<RgbImage>>>,
    exhausted: bool,
}

impl PrefetchSource {
    pub fn spawn<S>(mut source: S, capacity: usize, runtime: &Handle) -> Self
    where
        S: FrameSource + Send + 'static,
    {
        let info = source.info();
        let (tx, frames) = mpsc::channel(capacity.max(1));
        runtime.spawn_blocking(move || {
            loop {
                let next = source.next_frame();
                // Stop after the end marker or the first error has been handed over.
                let last = !matches!(next, Ok(Some(_)));
                if tx.blocking_send(next).is_err() {
                    debug!("prefetch consumer dropped, stopping decoder");
                    return;
                }
                if last {
                    return;
                }
            }
        });
        Self { info, frames, exhausted: false }
    }
}

impl FrameSource for PrefetchSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.exhausted {
            return Ok(None);
        }
        match self.frames.blocking_recv() {
            Some(Ok(Some(frame))) => Ok(Some(frame)),
            Some(other) => {
                self.exhausted = true;
                other
            }
            None => {
                self.exhausted = true;
                Err(MotionError::Video("decoder stopped before the end of the input".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tokio::runtime::Runtime;

    struct Numbered {
        remaining: u8,
        fail_at: Option<u8>,
    }

    impl FrameSource for Numbered {
        fn info(&self) -> VideoInfo {
            VideoInfo { width: 2, height: 2, total_frames: self.remaining as u64, fps: 10.0, fourcc: 0 }
        }

        fn next_frame(&mut self) -> Result<Option<RgbImage>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            if self.fail_at == Some(self.remaining) {
                return Err(MotionError::Video("corrupt packet".into()));
            }
            self.remaining -= 1;
            Ok(Some(RgbImage::from_pixel(2, 2, Rgb([self.remaining, 0, 0]))))
        }
    }

    #[test]
    fn frames_arrive_in_decode_order() {
        let runtime = Runtime::new().unwrap();
        let mut source = PrefetchSource::spawn(Numbered { remaining: 5, fail_at: None }, 2, runtime.handle());
        assert_eq!(source.info().total_frames, 5);

        let mut seen = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            seen.push(frame.get_pixel(0, 0).0[0]);
        }
        assert_eq!(seen, vec![4, 3, 2, 1, 0]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn decode_errors_are_forwarded() {
        let runtime = Runtime::new().unwrap();
        let mut source = PrefetchSource::spawn(Numbered { remaining: 4, fail_at: Some(2) }, 1, runtime.handle());

        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(matches!(source.next_frame(), Err(MotionError::Video(_))));
        assert!(source.next_frame().unwrap().is_none());
    }
}
