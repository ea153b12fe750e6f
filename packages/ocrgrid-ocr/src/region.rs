use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Bounding quadrilateral in reading order: top-left, top-right,
/// bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    /// Axis-aligned quad covering `x..x + width` and `y..y + height`.
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Quad([
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ])
    }

    pub fn top_left(&self) -> Point {
        self.0[0]
    }

    pub fn top_right(&self) -> Point {
        self.0[1]
    }

    pub fn bottom_right(&self) -> Point {
        self.0[2]
    }

    /// Vertical extent measured from the top-left to the bottom-right corner.
    pub fn height(&self) -> f32 {
        self.bottom_right().y - self.top_left().y
    }
}

/// One recognized text fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub text: String,
    #[serde(rename = "box")]
    pub quad: Quad,
    #[serde(rename = "score")]
    pub confidence: f32,
}

impl TextRegion {
    pub fn new(text: impl Into<String>, quad: Quad, confidence: f32) -> Self {
        Self {
            text: text.into(),
            quad,
            confidence,
        }
    }

    /// Left edge of the top side.
    pub fn left(&self) -> f32 {
        self.quad.top_left().x
    }

    /// Right edge of the top side.
    pub fn right(&self) -> f32 {
        self.quad.top_right().x
    }

    pub fn top(&self) -> f32 {
        self.quad.top_left().y
    }

    pub fn height(&self) -> f32 {
        self.quad.height()
    }
}
