use image::RgbaImage;

use crate::{
    render::{DrawSurface, Rgb},
    types::{FrameDimensions, Point},
};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Option<Rgb>),
    Blit(FrameDimensions),
    Circle {
        center: Point,
        radius: f64,
        color: Rgb,
    },
    Ring {
        center: Point,
        radius: f64,
        color: Rgb,
    },
    Line {
        from: Point,
        to: Point,
        color: Rgb,
    },
    Label {
        at: Point,
        text: String,
    },
}

/// Headless surface that records what would have been drawn.
#[derive(Debug, Clone)]
pub struct DrawRecorder {
    dimensions: FrameDimensions,
    commands: Vec<DrawCommand>,
}

impl DrawRecorder {
    pub fn new(dimensions: FrameDimensions) -> Self {
        Self {
            dimensions,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn lines(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Line { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
    }

    pub fn circles(&self) -> impl Iterator<Item = (Point, Rgb)> + '_ {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Circle { center, color, .. } => Some((*center, *color)),
            _ => None,
        })
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Label { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl DrawSurface for DrawRecorder {
    fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    /// Drops everything recorded before, like a real clear would.
    fn clear(&mut self, background: Option<Rgb>) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear(background));
    }

    fn blit(&mut self, frame: &RgbaImage) {
        let (width, height) = frame.dimensions();
        self.commands
            .push(DrawCommand::Blit(FrameDimensions::new(width, height)));
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: Rgb) {
        self.commands.push(DrawCommand::Circle {
            center,
            radius,
            color,
        });
    }

    fn stroke_ring(&mut self, center: Point, radius: f64, _width: f64, color: Rgb) {
        self.commands.push(DrawCommand::Ring {
            center,
            radius,
            color,
        });
    }

    fn stroke_line(&mut self, from: Point, to: Point, _width: f64, color: Rgb) {
        self.commands.push(DrawCommand::Line { from, to, color });
    }

    fn draw_label(&mut self, at: Point, text: &str, _fill: Rgb, _outline: Rgb) {
        self.commands.push(DrawCommand::Label {
            at,
            text: text.to_string(),
        });
    }
}
