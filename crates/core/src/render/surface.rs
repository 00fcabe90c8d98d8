use image::RgbaImage;
use serde::Serialize;

use crate::types::{FrameDimensions, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn rgba(&self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, 255])
    }
}

/// A 2D target the skeleton can be painted on.
pub trait DrawSurface {
    fn dimensions(&self) -> FrameDimensions;

    /// Wipe everything drawn so far. `None` clears to transparent.
    fn clear(&mut self, background: Option<Rgb>);

    /// Paint a video frame scaled to the whole surface.
    fn blit(&mut self, frame: &RgbaImage);

    fn fill_circle(&mut self, center: Point, radius: f64, color: Rgb);

    fn stroke_ring(&mut self, center: Point, radius: f64, width: f64, color: Rgb);

    fn stroke_line(&mut self, from: Point, to: Point, width: f64, color: Rgb);

    fn draw_label(&mut self, at: Point, text: &str, fill: Rgb, outline: Rgb);
}
