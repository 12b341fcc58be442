use crate::opencv_io::{cv_err, gray_mat};
use image::GrayImage;
use motion_energy::{DetectorParams, FeatureTracker, Point, TrackResult};
use opencv::{
    core::{self, Point2f, Size, TermCriteria, Vector},
    imgproc,
    video,
};

const CORNER_BLOCK_SIZE: i32 = 3;
const HARRIS_K: f64 = 0.04;

/// Shi-Tomasi corners followed by pyramidal Lucas-Kanade tracking.
pub struct LkTracker {
    win_size: i32,
    max_level: i32,
}

impl LkTracker {
    pub fn new(win_size: i32, max_level: i32) -> Self {
        Self { win_size, max_level }
    }
}

impl FeatureTracker for LkTracker {
    fn detect(&mut self, gray: &GrayImage, params: &DetectorParams) -> motion_energy::Result<Vec<Point>> {
        let image = gray_mat(gray)?;
        let mut corners: Vector<Point2f> = Vector::new();
        imgproc::good_features_to_track(
            &image,
            &mut corners,
            params.max_points as i32,
            params.quality,
            params.min_distance,
            &core::no_array(), // whole frame
            CORNER_BLOCK_SIZE,
            false,
            HARRIS_K,
        )
        .map_err(cv_err)?;
        Ok(corners.iter().map(|p| Point::new(p.x, p.y)).collect())
    }

    fn track(
        &mut self,
        prev_gray: &GrayImage,
        curr_gray: &GrayImage,
        prev_points: &[Point],
    ) -> motion_energy::Result<TrackResult> {
        let prev = gray_mat(prev_gray)?;
        let curr = gray_mat(curr_gray)?;
        let prev_pts: Vector<Point2f> = prev_points.iter().map(|p| Point2f::new(p.x, p.y)).collect();
        let mut next_pts: Vector<Point2f> = Vector::new();
        let mut status: Vector<u8> = Vector::new();
        let mut errors: Vector<f32> = Vector::new();

        let criteria =
            TermCriteria::new(core::TermCriteria_COUNT + core::TermCriteria_EPS, 30, 0.01).map_err(cv_err)?;
        video::calc_optical_flow_pyr_lk(
            &prev,
            &curr,
            &prev_pts,
            &mut next_pts,
            &mut status,
            &mut errors,
            Size::new(self.win_size, self.win_size),
            self.max_level,
            criteria,
            0,
            1e-4,
        )
        .map_err(cv_err)?;

        Ok(TrackResult {
            points: next_pts.iter().map(|p| Point::new(p.x, p.y)).collect(),
            found: status.iter().map(|s| s == 1).collect(),
            errors: errors.to_vec(),
        })
    }
}
