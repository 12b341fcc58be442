// OpenCV-backed decode and encode collaborators. Frames cross into the engine
// as RGB `image` buffers, the same way the vision engine is fed raw buffers
// instead of `Mat`s.

use image::{GrayImage, RgbImage};
use motion_energy::{FrameSink, FrameSource, MotionError, VideoInfo};
use opencv::{
    core::{self, Mat, Scalar, Size},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::path::Path;

pub fn cv_err(e: opencv::Error) -> MotionError {
    MotionError::Video(e.to_string())
}

pub struct OpenCvSource {
    capture: VideoCapture,
    info: VideoInfo,
    bgr: Mat,
    rgb: Mat,
}

impl OpenCvSource {
    pub fn open(path: &Path) -> motion_energy::Result<Self> {
        let unavailable = || MotionError::SourceUnavailable(path.display().to_string());
        let name = path.to_str().ok_or_else(unavailable)?;
        let capture = VideoCapture::from_file(name, videoio::CAP_ANY).map_err(|_| unavailable())?;
        if !capture.is_opened().map_err(cv_err)? {
            return Err(unavailable());
        }

        let info = VideoInfo {
            width: capture.get(videoio::CAP_PROP_FRAME_WIDTH).map_err(cv_err)? as u32,
            height: capture.get(videoio::CAP_PROP_FRAME_HEIGHT).map_err(cv_err)? as u32,
            total_frames: capture.get(videoio::CAP_PROP_FRAME_COUNT).map_err(cv_err)?.max(0.0) as u64,
            fps: capture.get(videoio::CAP_PROP_FPS).map_err(cv_err)?,
            fourcc: capture.get(videoio::CAP_PROP_FOURCC).map_err(cv_err)? as i32,
        };
        Ok(Self { capture, info, bgr: Mat::default(), rgb: Mat::default() })
    }
}

impl FrameSource for OpenCvSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> motion_energy::Result<Option<RgbImage>> {
        if !self.capture.read(&mut self.bgr).map_err(cv_err)? || self.bgr.empty() {
            return Ok(None);
        }
        imgproc::cvt_color(&self.bgr, &mut self.rgb, imgproc::COLOR_BGR2RGB, 0).map_err(cv_err)?;
        let (cols, rows) = (self.rgb.cols() as u32, self.rgb.rows() as u32);
        let buffer: Vec<u8> = self.rgb.data_bytes().map_err(cv_err)?.to_vec();
        RgbImage::from_raw(cols, rows, buffer)
            .map(Some)
            .ok_or_else(|| MotionError::Video(format!("decoded frame is not {cols}x{rows} RGB")))
    }
}

pub struct OpenCvSink {
    writer: VideoWriter,
    bgr: Mat,
}

impl OpenCvSink {
    pub fn create(path: &Path, info: &VideoInfo, fps: f64) -> motion_energy::Result<Self> {
        let name = path
            .to_str()
            .ok_or_else(|| MotionError::Video(format!("unusable output path {}", path.display())))?;
        let writer = VideoWriter::new(
            name,
            info.fourcc,
            fps,
            Size::new(info.width as i32, info.height as i32),
            true,
        )
        .map_err(cv_err)?;
        if !writer.is_opened().map_err(cv_err)? {
            return Err(MotionError::Video(format!("cannot open {} for writing", path.display())));
        }
        Ok(Self { writer, bgr: Mat::default() })
    }
}

impl FrameSink for OpenCvSink {
    fn write_frame(&mut self, frame: &RgbImage) -> motion_energy::Result<()> {
        let rgb = mat_from_bytes(frame.height(), frame.width(), core::CV_8UC3, frame.as_raw())?;
        imgproc::cvt_color(&rgb, &mut self.bgr, imgproc::COLOR_RGB2BGR, 0).map_err(cv_err)?;
        self.writer.write(&self.bgr).map_err(cv_err)
    }
}

pub fn gray_mat(gray: &GrayImage) -> motion_energy::Result<Mat> {
    mat_from_bytes(gray.height(), gray.width(), core::CV_8UC1, gray.as_raw())
}

fn mat_from_bytes(rows: u32, cols: u32, typ: i32, bytes: &[u8]) -> motion_energy::Result<Mat> {
    let mut mat =
        Mat::new_rows_cols_with_default(rows as i32, cols as i32, typ, Scalar::all(0.0)).map_err(cv_err)?;
    mat.data_bytes_mut().map_err(cv_err)?.copy_from_slice(bytes);
    Ok(mat)
}
