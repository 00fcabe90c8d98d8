use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::{Rgba, RgbaImage, imageops};
use imageproc::{
    drawing::{
        draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut,
        draw_line_segment_mut,
    },
    rect::Rect,
};

use crate::{
    encode::encode_jpeg_data_url,
    error::Result,
    render::{DrawSurface, Rgb},
    types::{FrameDimensions, Point},
};

/// Each 8x8 font cell is drawn as 2x2 pixel blocks.
const GLYPH_SCALE: u32 = 2;
const GLYPH_SIZE: u32 = 8 * GLYPH_SCALE;
const LABEL_PADDING: u32 = 2;

/// Text drawn on the canvas, kept alongside the pixels for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub at: Point,
    pub text: String,
    pub fill: Rgb,
}

/// RGBA raster implementing [`DrawSurface`], used for the overlay and history snapshots.
pub struct RasterCanvas {
    pixels: RgbaImage,
    labels: Vec<Label>,
}

impl RasterCanvas {
    pub fn new(dimensions: FrameDimensions) -> Self {
        Self {
            pixels: RgbaImage::new(dimensions.width, dimensions.height),
            labels: Vec::new(),
        }
    }

    /// Match the canvas to the video geometry; a size change starts from a blank raster.
    pub fn resize(&mut self, dimensions: FrameDimensions) {
        if self.dimensions() != dimensions {
            self.pixels = RgbaImage::new(dimensions.width, dimensions.height);
            self.labels.clear();
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn to_jpeg_data_url(&self, quality: u8) -> Result<String> {
        encode_jpeg_data_url(&self.pixels, quality)
    }

    /// True when the box `[x0, x1] x [y0, y1]` overlaps the raster.
    fn overlaps(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> bool {
        let w = self.pixels.width() as f64;
        let h = self.pixels.height() as f64;
        x1 >= 0.0 && y1 >= 0.0 && x0 < w && y0 < h
    }

    /// Integer center and radius of a disc that touches the raster, else `None`.
    fn disc(&self, center: Point, radius: f64) -> Option<((i32, i32), i32)> {
        if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
            return None;
        }
        if !self.overlaps(
            center.x - radius,
            center.y - radius,
            center.x + radius,
            center.y + radius,
        ) {
            return None;
        }
        Some((
            (center.x.round() as i32, center.y.round() as i32),
            radius.round() as i32,
        ))
    }

    /// The part of a segment inside the raster, padded by one pixel on every side.
    fn clip(&self, from: Point, to: Point) -> Option<(Point, Point)> {
        let min = Point::new(-1.0, -1.0);
        let max = Point::new(self.pixels.width() as f64, self.pixels.height() as f64);
        clip_segment(from, to, min, max)
    }
}

/// Liang-Barsky clipping of `from -> to` against the box `[min, max]`.
fn clip_segment(from: Point, to: Point, min: Point, max: Point) -> Option<(Point, Point)> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let mut enter = 0.0_f64;
    let mut exit = 1.0_f64;

    for (p, q) in [
        (-dx, from.x - min.x),
        (dx, max.x - from.x),
        (-dy, from.y - min.y),
        (dy, max.y - from.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > exit {
                return None;
            }
            enter = enter.max(t);
        } else {
            if t < enter {
                return None;
            }
            exit = exit.min(t);
        }
    }

    Some((
        Point::new(from.x + enter * dx, from.y + enter * dy),
        Point::new(from.x + exit * dx, from.y + exit * dy),
    ))
}

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .unwrap_or([0; 8])
}

impl DrawSurface for RasterCanvas {
    fn dimensions(&self) -> FrameDimensions {
        FrameDimensions::new(self.pixels.width(), self.pixels.height())
    }

    fn clear(&mut self, background: Option<Rgb>) {
        let fill = background.map_or(Rgba([0, 0, 0, 0]), |c| c.rgba());
        for pixel in self.pixels.pixels_mut() {
            *pixel = fill;
        }
        self.labels.clear();
    }

    fn blit(&mut self, frame: &RgbaImage) {
        if frame.dimensions() == self.pixels.dimensions() {
            self.pixels.copy_from_slice(frame.as_raw());
        } else if self.pixels.width() > 0 && self.pixels.height() > 0 {
            self.pixels = imageops::resize(
                frame,
                self.pixels.width(),
                self.pixels.height(),
                imageops::FilterType::Triangle,
            );
        }
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: Rgb) {
        if let Some((center, radius)) = self.disc(center, radius) {
            draw_filled_circle_mut(&mut self.pixels, center, radius, color.rgba());
        }
    }

    fn stroke_ring(&mut self, center: Point, radius: f64, width: f64, color: Rgb) {
        let half = (width / 2.0).max(0.5);
        let Some((center, outer)) = self.disc(center, radius + half) else {
            return;
        };
        let inner = (radius - half).round().max(0.0) as i32;
        for r in inner..=outer {
            draw_hollow_circle_mut(&mut self.pixels, center, r, color.rgba());
        }
    }

    /// Thick lines are stacked one-pixel lines, clipped first so far-away endpoints cost
    /// no more than the visible part.
    fn stroke_line(&mut self, from: Point, to: Point, width: f64, color: Rgb) {
        if !from.is_finite() || !to.is_finite() {
            return;
        }
        let rgba = color.rgba();
        let spread = ((width - 1.0) / 2.0).round().max(0.0) as i32;

        for offset in -spread..=spread {
            let o = offset as f64;
            for (dx, dy) in [(o, 0.0), (0.0, o)] {
                let shifted_from = Point::new(from.x + dx, from.y + dy);
                let shifted_to = Point::new(to.x + dx, to.y + dy);
                if let Some((a, b)) = self.clip(shifted_from, shifted_to) {
                    draw_line_segment_mut(
                        &mut self.pixels,
                        (a.x as f32, a.y as f32),
                        (b.x as f32, b.y as f32),
                        rgba,
                    );
                }
            }
        }

        let cap = (width / 2.0).max(0.5);
        self.fill_circle(from, cap, color);
        self.fill_circle(to, cap, color);
    }

    /// `at` is the left end of the baseline; the text sits above it on an `outline` plate.
    fn draw_label(&mut self, at: Point, text: &str, fill: Rgb, outline: Rgb) {
        let chars = text.chars().count() as u32;
        if !at.is_finite() || chars == 0 {
            return;
        }
        let pad = LABEL_PADDING as f64;
        let text_width = (chars * GLYPH_SIZE) as f64;
        if !self.overlaps(
            at.x - pad,
            at.y - GLYPH_SIZE as f64 - pad,
            at.x + text_width + pad,
            at.y + pad,
        ) {
            return;
        }

        let left = at.x.round() as i32;
        let top = at.y.round() as i32 - GLYPH_SIZE as i32;
        let plate = Rect::at(left - LABEL_PADDING as i32, top - LABEL_PADDING as i32)
            .of_size(chars * GLYPH_SIZE + 2 * LABEL_PADDING, GLYPH_SIZE + 2 * LABEL_PADDING);
        draw_filled_rect_mut(&mut self.pixels, plate, outline.rgba());

        let ink = fill.rgba();
        for (i, c) in text.chars().enumerate() {
            let cell_left = left + (i as u32 * GLYPH_SIZE) as i32;
            for (row, bits) in glyph(c).into_iter().enumerate() {
                for col in 0..8_i32 {
                    if (bits >> col) & 1 == 0 {
                        continue;
                    }
                    let block = Rect::at(
                        cell_left + col * GLYPH_SCALE as i32,
                        top + row as i32 * GLYPH_SCALE as i32,
                    )
                    .of_size(GLYPH_SCALE, GLYPH_SCALE);
                    draw_filled_rect_mut(&mut self.pixels, block, ink);
                }
            }
        }

        self.labels.push(Label {
            at,
            text: text.to_string(),
            fill,
        });
    }
}
