// THEORY:
// The `flow` module is the first stage of the statistics engine. The feature
// tracker hands over two aligned point lists (where each feature was in the
// previous frame and where it was found in the current one) plus a found flag
// per feature. This module turns that correspondence into plain numbers: one
// displacement per successfully tracked feature, and then one magnitude per
// displacement.
//
// Features the tracker lost are dropped entirely rather than counted as zero
// motion, so the magnitude set can be shorter than the detected point list, or
// empty.

use crate::error::{MotionError, Result};
use serde::{Deserialize, Serialize};

/// A feature location in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The motion of one feature between two consecutive analyzed frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplacementVector {
    pub dx: f64,
    pub dy: f64,
}

impl DisplacementVector {
    pub fn between(from: Point, to: Point) -> Self {
        Self {
            dx: to.x as f64 - from.x as f64,
            dy: to.y as f64 - from.y as f64,
        }
    }

    /// Euclidean length of the displacement.
    pub fn norm(&self) -> f64 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }
}

/// One non-negative magnitude per successfully tracked feature.
pub type MagnitudeSet = Vec<f64>;

fn check_lengths(prev: &[Point], curr: &[Point], found: &[bool]) -> Result<()> {
    if prev.len() != curr.len() || prev.len() != found.len() {
        return Err(MotionError::InvalidInput {
            prev: prev.len(),
            curr: curr.len(),
            found: found.len(),
        });
    }
    Ok(())
}

/// Displacements of every feature whose correspondence was found, in input order.
pub fn displacements(
    prev_points: &[Point],
    curr_points: &[Point],
    found_flags: &[bool],
) -> Result<Vec<DisplacementVector>> {
    check_lengths(prev_points, curr_points, found_flags)?;
    Ok(prev_points
        .iter()
        .zip(curr_points)
        .zip(found_flags)
        .filter(|(_, found)| **found)
        .map(|((prev, curr), _)| DisplacementVector::between(*prev, *curr))
        .collect())
}

/// Reduces a tracked point correspondence to the magnitudes of its displacements.
pub fn reduce_flow(
    prev_points: &[Point],
    curr_points: &[Point],
    found_flags: &[bool],
) -> Result<MagnitudeSet> {
    let flow = displacements(prev_points, curr_points, found_flags)?;
    let magnitudes: MagnitudeSet = flow.iter().map(DisplacementVector::norm).collect();
    debug_assert_eq!(flow.len(), magnitudes.len());
    Ok(magnitudes)
}
