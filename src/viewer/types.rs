use serde::{Deserialize, Serialize};

/// A point in any of the viewer's coordinate spaces; the space is implied by
/// the call site (page-space, layout-space or viewport-space).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle with a top-left origin. Annotation rectangles are
/// stored in page-space at scale 1; on-screen rectangles use the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// Inclusive on every edge.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }

    pub fn intersects_vertical(&self, top: f32, bottom: f32) -> bool {
        self.bottom() >= top && self.top <= bottom
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            left: self.left * factor,
            top: self.top * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            ..*self
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// Page dimensions at reference scale 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Size of a page at a given scale. Used both for layout-space containers and
/// for device-pixel render targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl Viewport {
    pub const EMPTY: Viewport = Viewport {
        width: 0.0,
        height: 0.0,
        scale: 0.0,
    };

    /// Whole-pixel dimensions of a raster target for this viewport.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.ceil().clamp(0.0, u32::MAX as f32) as u32,
            self.height.ceil().clamp(0.0, u32::MAX as f32) as u32,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Requested document scale. All pages share one scale at any instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleRequest {
    Fixed(f32),
    FitWidth,
}

impl From<f32> for ScaleRequest {
    fn from(value: f32) -> Self {
        Self::Fixed(value)
    }
}

pub type AnnotationId = u64;

/// A review annotation as the viewer sees it. The viewer never mutates these;
/// it only receives full replacement lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub page_number: u32,
    pub category_name: String,
    pub highlight_rects: Vec<Rect>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub selected_text: String,
}

/// Geometry computed from a finished text selection, ready for the
/// annotation-creation flow.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionGeometry {
    pub page_number: u32,
    pub selected_text: String,
    /// Page-space rectangles at scale 1, one per visual line.
    pub rects: Vec<Rect>,
    /// Pointer position in viewport space when the selection ended.
    pub pointer: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    PageChanged(u32),
    TextSelected(SelectionGeometry),
    HighlightClicked {
        annotation: Annotation,
        context_menu: bool,
    },
}
