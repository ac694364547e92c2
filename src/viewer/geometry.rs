//! Conversions between page-space (scale 1), layout-space (current zoom) and
//! device-pixel space (layout × device pixel ratio).

use super::types::{PageSize, Point, Rect, Viewport};

/// Layout-space size of a page at `scale`. Pure: the same (size, scale) pair
/// always yields the same viewport.
pub fn viewport_at(size: PageSize, scale: f32) -> Viewport {
    Viewport {
        width: size.width * scale,
        height: size.height * scale,
        scale,
    }
}

/// The layout viewport and the device-pixel viewport used for raster output.
pub fn render_viewports(size: PageSize, scale: f32, pixel_ratio: f32) -> (Viewport, Viewport) {
    let layout = viewport_at(size, scale);
    let device = viewport_at(size, scale * pixel_ratio);
    (layout, device)
}

/// Converts a viewport-space point into page-space, given the on-screen origin
/// of the page container.
pub fn point_to_page_space(point: Point, page_origin: Point, scale: f32) -> Point {
    Point::new(
        (point.x - page_origin.x) / scale,
        (point.y - page_origin.y) / scale,
    )
}

pub fn point_to_viewport_space(point: Point, page_origin: Point, scale: f32) -> Point {
    Point::new(
        point.x * scale + page_origin.x,
        point.y * scale + page_origin.y,
    )
}

pub fn rect_to_page_space(rect: Rect, page_origin: Point, scale: f32) -> Rect {
    Rect::new(
        (rect.left - page_origin.x) / scale,
        (rect.top - page_origin.y) / scale,
        rect.width / scale,
        rect.height / scale,
    )
}

pub fn rect_to_viewport_space(rect: Rect, page_origin: Point, scale: f32) -> Rect {
    rect.scaled(scale).translated(page_origin.x, page_origin.y)
}

/// Device-pixel rectangle for drawing a page-space rect onto a raster surface.
pub fn rect_to_device_space(rect: Rect, scale: f32, pixel_ratio: f32) -> Rect {
    rect.scaled(scale * pixel_ratio)
}

/// Scale at which the first page (or a spread of two) fills the usable width.
pub fn fit_width_scale(
    container_width: f32,
    horizontal_padding: f32,
    spread_gap: f32,
    first_page: Option<PageSize>,
    dual_page: bool,
) -> f32 {
    let Some(page) = first_page else {
        return 1.0;
    };
    if page.width <= 0.0 {
        return 1.0;
    }

    let usable = container_width - horizontal_padding;
    let scale = if dual_page {
        (usable - spread_gap) / (page.width * 2.0)
    } else {
        usable / page.width
    };

    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}
