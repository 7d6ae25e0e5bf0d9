//! Frame arithmetic in device-independent points.

use serde::{Deserialize, Serialize};

/// Sub-point differences come out of AX reads all the time; anything under
/// half a point is the same frame.
pub const FRAME_EPSILON: f64 = 0.5;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Frame {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self { Frame { x, y, w, h } }

    pub fn x2(&self) -> f64 { self.x + self.w }

    pub fn y2(&self) -> f64 { self.y + self.h }

    pub fn center_x(&self) -> f64 { self.x + self.w / 2.0 }

    pub fn center_y(&self) -> f64 { self.y + self.h / 2.0 }

    /// Approximate equality; see [`FRAME_EPSILON`].
    pub fn same_as(&self, other: &Frame) -> bool {
        (self.x - other.x).abs() < FRAME_EPSILON
            && (self.y - other.y).abs() < FRAME_EPSILON
            && (self.w - other.w).abs() < FRAME_EPSILON
            && (self.h - other.h).abs() < FRAME_EPSILON
    }

    /// Shrink by per-side insets, clamping to a degenerate frame rather than
    /// going negative.
    pub fn inset(&self, top: f64, bottom: f64, left: f64, right: f64) -> Frame {
        Frame {
            x: self.x + left,
            y: self.y + top,
            w: (self.w - left - right).max(0.0),
            h: (self.h - top - bottom).max(0.0),
        }
    }

    /// Clamp our size to fit inside `bounds`; position is untouched.
    pub fn clamp_size_to(&self, bounds: &Frame) -> Frame {
        Frame {
            x: self.x,
            y: self.y,
            w: self.w.min(bounds.w),
            h: self.h.min(bounds.h),
        }
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x2() && y >= self.y && y < self.y2()
    }
}
