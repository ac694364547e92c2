//! Text layer, selection tracking and the selection-to-annotation mapper.

use super::Viewer;
use super::document::TextSpan;
use super::geometry;
use super::types::{Point, Rect, SelectionGeometry, Viewport, ViewerEvent};

/// Rects on the same visual line closer than this (page-space units) merge.
pub const MERGE_TOLERANCE: f32 = 5.0;

const HIT_TOLERANCE: f32 = 2.0;
const NEAREST_GLYPH_LIMIT: f32 = 50.0;

#[derive(Debug, Clone, PartialEq)]
struct LaidOutGlyph {
    span: usize,
    text: String,
    rect: Rect,
}

impl LaidOutGlyph {
    fn contains(&self, point: Point) -> bool {
        point.x >= self.rect.left - HIT_TOLERANCE
            && point.x <= self.rect.right() + HIT_TOLERANCE
            && point.y >= self.rect.top - HIT_TOLERANCE
            && point.y <= self.rect.bottom() + HIT_TOLERANCE
    }
}

/// Text content of a rendered page, positioned for the layout viewport it was
/// laid out with. Glyph rects are kept in page-space.
#[derive(Debug, Clone, Default)]
pub struct TextLayer {
    glyphs: Vec<LaidOutGlyph>,
    span_bounds: Vec<Option<Rect>>,
    layout: Option<Viewport>,
}

impl TextLayer {
    pub fn lay_out(spans: &[TextSpan], layout: Viewport) -> Self {
        let mut glyphs = Vec::new();
        for (span_ix, span) in spans.iter().enumerate() {
            for glyph in &span.glyphs {
                glyphs.push(LaidOutGlyph {
                    span: span_ix,
                    text: glyph.text.clone(),
                    rect: glyph.rect,
                });
            }
        }

        Self {
            glyphs,
            span_bounds: spans.iter().map(TextSpan::bounds).collect(),
            layout: Some(layout),
        }
    }

    /// A laid-out layer with no text, used when extraction fails.
    pub fn empty(layout: Viewport) -> Self {
        Self {
            layout: Some(layout),
            ..Self::default()
        }
    }

    pub fn is_laid_out(&self) -> bool {
        self.layout.is_some()
    }

    pub fn layout_viewport(&self) -> Option<Viewport> {
        self.layout
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    pub fn span_count(&self) -> usize {
        self.span_bounds.len()
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    /// Glyph under a page-space point, or the nearest glyph within a short
    /// distance of it.
    pub fn glyph_at(&self, point: Point) -> Option<usize> {
        if let Some(index) = self.glyphs.iter().position(|glyph| glyph.contains(point)) {
            return Some(index);
        }

        let mut closest = None;
        let mut closest_distance = f32::INFINITY;
        for (index, glyph) in self.glyphs.iter().enumerate() {
            let center = glyph.rect.center();
            let dx = point.x - center.x;
            let dy = point.y - center.y;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance < closest_distance {
                closest_distance = distance;
                closest = Some(index);
            }
        }

        if closest_distance < NEAREST_GLYPH_LIMIT {
            closest
        } else {
            None
        }
    }

    /// Text of the glyph range `[a, b]` in either order. A span change on a
    /// new line becomes a newline, otherwise a space.
    pub fn text_between(&self, a: usize, b: usize) -> String {
        let Some((start, end)) = self.ordered_range(a, b) else {
            return String::new();
        };

        let mut text = String::new();
        let mut previous_span = None;
        for glyph in &self.glyphs[start..=end] {
            if let Some(previous) = previous_span
                && previous != glyph.span
            {
                text.push(if self.same_line(previous, glyph.span) {
                    ' '
                } else {
                    '\n'
                });
            }
            text.push_str(&glyph.text);
            previous_span = Some(glyph.span);
        }
        text
    }

    /// One page-space rect per span fragment covered by `[a, b]`.
    pub fn fragment_rects(&self, a: usize, b: usize) -> Vec<Rect> {
        let Some((start, end)) = self.ordered_range(a, b) else {
            return Vec::new();
        };

        let mut rects: Vec<Rect> = Vec::new();
        let mut current: Option<(usize, Rect)> = None;
        for glyph in &self.glyphs[start..=end] {
            current = match current {
                Some((span, rect)) if span == glyph.span => Some((span, union(rect, glyph.rect))),
                Some((_, rect)) => {
                    rects.push(rect);
                    Some((glyph.span, glyph.rect))
                }
                None => Some((glyph.span, glyph.rect)),
            };
        }
        if let Some((_, rect)) = current {
            rects.push(rect);
        }
        rects
    }

    fn ordered_range(&self, a: usize, b: usize) -> Option<(usize, usize)> {
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        (end < self.glyphs.len()).then_some((start, end))
    }

    fn same_line(&self, a: usize, b: usize) -> bool {
        match (
            self.span_bounds.get(a).copied().flatten(),
            self.span_bounds.get(b).copied().flatten(),
        ) {
            (Some(first), Some(second)) => {
                (first.top - second.top).abs() < first.height.min(second.height) / 2.0
            }
            _ => false,
        }
    }
}

fn union(a: Rect, b: Rect) -> Rect {
    let left = a.left.min(b.left);
    let top = a.top.min(b.top);
    let right = a.right().max(b.right());
    let bottom = a.bottom().max(b.bottom());
    Rect::new(left, top, right - left, bottom - top)
}

/// Merges fragments into one rect per visual line. Input order does not
/// matter; rects are sorted by top, then left.
pub fn merge_rects(mut rects: Vec<Rect>) -> Vec<Rect> {
    if rects.is_empty() {
        return rects;
    }

    rects.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.left.total_cmp(&b.left)));

    let mut merged = Vec::with_capacity(rects.len());
    let mut current = rects[0];
    for rect in rects.into_iter().skip(1) {
        if (rect.top - current.top).abs() < MERGE_TOLERANCE
            && rect.left <= current.right() + MERGE_TOLERANCE
        {
            current.width = current.right().max(rect.right()) - current.left;
            current.height = current.height.max(rect.height);
        } else {
            merged.push(current);
            current = rect;
        }
    }
    merged.push(current);
    merged
}

/// A selection as a native selection engine reports it: viewport-space
/// client rects plus the point where the selection was anchored.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSelection {
    pub anchor: Point,
    pub text: String,
    pub client_rects: Vec<Rect>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SelectionDrag {
    page_number: u32,
    anchor_point: Point,
    anchor: usize,
    focus: usize,
}

impl Viewer {
    /// Converts a raw selection into page-space geometry. Returns `None` for
    /// an empty selection or one not anchored in a rendered page.
    pub fn map_selection(&self, raw: &RawSelection, pointer: Point) -> Option<SelectionGeometry> {
        let selected_text = raw.text.trim();
        if selected_text.is_empty() || raw.client_rects.is_empty() {
            return None;
        }

        let page_number = self.page_at_viewport_point(raw.anchor)?;
        let slot = self.layout.slot(page_number)?;
        if !slot.text_layer().is_laid_out() {
            return None;
        }

        let origin = self.viewport_origin(page_number)?;
        let scale = self.state.scale;
        let rects = raw
            .client_rects
            .iter()
            .map(|rect| geometry::rect_to_page_space(*rect, origin, scale))
            .collect();

        Some(SelectionGeometry {
            page_number,
            selected_text: selected_text.to_string(),
            rects: merge_rects(rects),
            pointer,
        })
    }

    /// Starts a text selection at a viewport-space point. Any previous
    /// selection is dropped.
    pub fn pointer_down(&mut self, point: Point) {
        self.selection = None;
        let Some(page_number) = self.page_at_viewport_point(point) else {
            return;
        };
        let Some(glyph) = self.glyph_at(page_number, point) else {
            return;
        };

        self.selection = Some(SelectionDrag {
            page_number,
            anchor_point: point,
            anchor: glyph,
            focus: glyph,
        });
    }

    /// Extends the active selection. Points past the last glyph in range
    /// keep the previous focus.
    pub fn pointer_drag(&mut self, point: Point) {
        let Some(drag) = self.selection else {
            return;
        };
        if let Some(glyph) = self.glyph_at(drag.page_number, point) {
            self.selection = Some(SelectionDrag {
                focus: glyph,
                ..drag
            });
        }
    }

    /// Finishes the selection. In highlight mode a non-empty selection is
    /// mapped to page-space and emitted as `TextSelected`.
    pub fn pointer_up(&mut self, point: Point) -> Option<SelectionGeometry> {
        self.pointer_drag(point);
        if !self.state.highlight_mode {
            return None;
        }

        let raw = self.current_selection()?;
        let geometry = self.map_selection(&raw, point)?;
        crate::debug_log!(
            "[selection] page {} -> {} rect(s)",
            geometry.page_number,
            geometry.rects.len()
        );
        self.events.push(ViewerEvent::TextSelected(geometry.clone()));
        Some(geometry)
    }

    /// The active selection in the shape a native selection engine reports.
    pub fn current_selection(&self) -> Option<RawSelection> {
        let drag = self.selection?;
        let layer = self.layout.slot(drag.page_number)?.text_layer();
        let origin = self.viewport_origin(drag.page_number)?;
        let scale = self.state.scale;

        let client_rects = layer
            .fragment_rects(drag.anchor, drag.focus)
            .into_iter()
            .map(|rect| geometry::rect_to_viewport_space(rect, origin, scale))
            .collect();

        Some(RawSelection {
            anchor: drag.anchor_point,
            text: layer.text_between(drag.anchor, drag.focus),
            client_rects,
        })
    }

    pub fn selected_text(&self) -> Option<String> {
        self.current_selection().map(|selection| selection.text)
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn glyph_at(&self, page_number: u32, point: Point) -> Option<usize> {
        let layer = self.layout.slot(page_number)?.text_layer();
        if !layer.is_laid_out() {
            return None;
        }
        let origin = self.viewport_origin(page_number)?;
        layer.glyph_at(geometry::point_to_page_space(point, origin, self.state.scale))
    }
}
