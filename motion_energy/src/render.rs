// THEORY:
// Rendering is a visualization side feature and never feeds back into the
// statistics. A `TrajectoryCanvas` is a blank image the size of the video on
// which every analyzed frame adds one segment per tracked feature (from where
// it was to where it went). The canvas is composited onto the current frame,
// and a dot marks each feature's current position. The pipeline clears the
// canvas periodically so old trails fade out of the picture.
//
// All drawing choices travel in a `DrawStyle` value handed to the canvas.

use crate::core_modules::flow::Point;
use image::{Rgb, RgbImage};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DrawStyle {
    /// RGB colour used for trails and markers.
    pub color: [u8; 3],
    pub line_thickness: u32,
    pub point_radius: u32,
    /// Blend edge pixels by coverage instead of hard edges.
    pub antialiased: bool,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            color: [255, 0, 0],
            line_thickness: 2,
            point_radius: 5,
            antialiased: true,
        }
    }
}

pub struct TrajectoryCanvas {
    trails: RgbImage,
    style: DrawStyle,
}

impl TrajectoryCanvas {
    pub fn new(width: u32, height: u32, style: DrawStyle) -> Self {
        Self {
            trails: RgbImage::new(width, height),
            style,
        }
    }

    pub fn style(&self) -> &DrawStyle {
        &self.style
    }

    pub fn trails(&self) -> &RgbImage {
        &self.trails
    }

    /// Wipes all accumulated trails.
    pub fn clear(&mut self) {
        self.trails.pixels_mut().for_each(|p| *p = Rgb([0, 0, 0]));
    }

    pub fn add_trajectory(&mut self, from: Point, to: Point) {
        let radius = (self.style.line_thickness as f32 / 2.0).max(0.5);
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as u32;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            stamp_disc(
                &mut self.trails,
                from.x + t * dx,
                from.y + t * dy,
                radius,
                self.style.color,
                self.style.antialiased,
            );
        }
    }

    /// Returns `frame` with the trails added on top (saturating per channel)
    /// and a filled marker at each of `current_points`.
    pub fn compose(&self, frame: &RgbImage, current_points: &[Point]) -> RgbImage {
        let mut out = frame.clone();
        for (dst, src) in out.pixels_mut().zip(self.trails.pixels()) {
            for c in 0..3 {
                dst.0[c] = dst.0[c].saturating_add(src.0[c]);
            }
        }
        for point in current_points {
            stamp_disc(
                &mut out,
                point.x,
                point.y,
                self.style.point_radius as f32,
                self.style.color,
                self.style.antialiased,
            );
        }
        out
    }
}

fn stamp_disc(img: &mut RgbImage, cx: f32, cy: f32, radius: f32, color: [u8; 3], antialiased: bool) {
    let reach = radius + 1.0;
    let x0 = (cx - reach).floor().max(0.0) as i64;
    let y0 = (cy - reach).floor().max(0.0) as i64;
    let x1 = ((cx + reach).ceil() as i64).min(img.width() as i64 - 1);
    let y1 = ((cy + reach).ceil() as i64).min(img.height() as i64 - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let dist = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            let coverage = if antialiased {
                (radius + 0.5 - dist).clamp(0.0, 1.0)
            } else if dist <= radius {
                1.0
            } else {
                0.0
            };
            if coverage > 0.0 {
                blend(img.get_pixel_mut(x as u32, y as u32), color, coverage);
            }
        }
    }
}

fn blend(pixel: &mut Rgb<u8>, color: [u8; 3], coverage: f32) {
    for c in 0..3 {
        let base = pixel.0[c] as f32;
        pixel.0[c] = (base + (color[c] as f32 - base) * coverage).round() as u8;
    }
}
