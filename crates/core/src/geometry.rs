use crate::types::{FrameDimensions, Point, Pose};

/// Resolution assumed when the video has not reported its size yet.
pub const DEFAULT_VIDEO_DIMENSIONS: FrameDimensions = FrameDimensions::new(640, 480);

/// Rescales keypoints from one surface's pixel space into another's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    scale_x: f64,
    scale_y: f64,
}

impl CoordinateMapper {
    /// Unknown (zero) source dimensions fall back to 640x480, so the scale is always finite.
    pub fn new(source: FrameDimensions, target: FrameDimensions) -> Self {
        Self::with_fallback(source, target, DEFAULT_VIDEO_DIMENSIONS)
    }

    /// Like [`CoordinateMapper::new`] with a caller-chosen size for unknown sources.
    /// A zero fallback still resolves to 640x480.
    pub fn with_fallback(
        source: FrameDimensions,
        target: FrameDimensions,
        fallback: FrameDimensions,
    ) -> Self {
        let source = source.or(fallback).or(DEFAULT_VIDEO_DIMENSIONS);
        Self {
            scale_x: target.width as f64 / source.width as f64,
            scale_y: target.height as f64 / source.height as f64,
        }
    }

    pub fn identity() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    pub fn map_point(&self, point: Point) -> Point {
        Point::new(point.x * self.scale_x, point.y * self.scale_y)
    }

    pub fn map(&self, point: Option<Point>) -> Option<Point> {
        point.map(|p| self.map_point(p))
    }

    pub fn map_pose(&self, pose: &Pose) -> Pose {
        pose.map(|p| self.map_point(p))
    }

    /// `None` when the target is degenerate and the mapping cannot be undone.
    pub fn inverse(&self) -> Option<Self> {
        if self.scale_x == 0.0 || self.scale_y == 0.0 {
            return None;
        }
        Some(Self {
            scale_x: 1.0 / self.scale_x,
            scale_y: 1.0 / self.scale_y,
        })
    }
}
