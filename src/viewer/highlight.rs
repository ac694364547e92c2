//! Per-page annotation overlay. Surfaces are raster buffers at device-pixel
//! resolution, redrawn from scratch from page-space annotation rects.

use super::Viewer;
use super::geometry;
use super::layout::RenderState;
use super::types::{Annotation, AnnotationId, Rect, Viewport};
use image::{Rgba, RgbaImage};
use std::time::Duration;

pub type Rgb = [u8; 3];

pub const NORMAL_ALPHA: f32 = 0.25;
pub const FLASH_ALPHA: f32 = 0.55;

pub const CATEGORY_COLORS: [(&str, Rgb); 5] = [
    ("critical", [220, 38, 38]),
    ("major", [234, 88, 12]),
    ("minor", [202, 138, 4]),
    ("suggestion", [37, 99, 235]),
    ("question", [124, 58, 237]),
];

/// Case-insensitive lookup. Unknown categories have no color.
pub fn category_color(category_name: &str) -> Option<Rgb> {
    CATEGORY_COLORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(category_name))
        .map(|(_, color)| *color)
}

/// A 2D surface with the two operations the overlay needs.
pub trait DrawSurface {
    fn clear(&mut self);

    /// Blends a filled rectangle (device pixels) over the existing content.
    fn fill_rect(&mut self, rect: Rect, color: Rgb, alpha: f32);
}

impl DrawSurface for RgbaImage {
    fn clear(&mut self) {
        for pixel in self.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgb, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha == 0.0 || rect.width <= 0.0 || rect.height <= 0.0 {
            return;
        }

        let width = self.width() as f32;
        let height = self.height() as f32;
        let x0 = rect.left.round().clamp(0.0, width) as u32;
        let x1 = rect.right().round().clamp(0.0, width) as u32;
        let y0 = rect.top.round().clamp(0.0, height) as u32;
        let y1 = rect.bottom().round().clamp(0.0, height) as u32;

        for y in y0..y1 {
            for x in x0..x1 {
                let pixel = self.get_pixel_mut(x, y);
                *pixel = blend_over(*pixel, color, alpha);
            }
        }
    }
}

fn blend_over(dst: Rgba<u8>, color: Rgb, alpha: f32) -> Rgba<u8> {
    let dst_alpha = dst.0[3] as f32 / 255.0;
    let out_alpha = alpha + dst_alpha * (1.0 - alpha);
    if out_alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for channel in 0..3 {
        let src = color[channel] as f32;
        let below = dst.0[channel] as f32;
        let value = (src * alpha + below * dst_alpha * (1.0 - alpha)) / out_alpha;
        out[channel] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

/// Draws every rect of `annotation` at `scale × pixel_ratio`. Returns false
/// (drawing nothing) for an unknown category.
pub fn draw_annotation_rects(
    surface: &mut impl DrawSurface,
    annotation: &Annotation,
    scale: f32,
    pixel_ratio: f32,
    alpha: f32,
) -> bool {
    let Some(color) = category_color(&annotation.category_name) else {
        return false;
    };

    for rect in &annotation.highlight_rects {
        surface.fill_rect(
            geometry::rect_to_device_space(*rect, scale, pixel_ratio),
            color,
            alpha,
        );
    }
    true
}

/// Highlight surface of one page slot. Zero-sized until the page renders.
#[derive(Debug, Clone, Default)]
pub struct HighlightCanvas {
    surface: Option<RgbaImage>,
    revision: u64,
}

impl HighlightCanvas {
    pub fn is_sized(&self) -> bool {
        self.surface
            .as_ref()
            .is_some_and(|surface| surface.width() > 0 && surface.height() > 0)
    }

    pub fn surface(&self) -> Option<&RgbaImage> {
        self.surface.as_ref()
    }

    /// Bumped on every redraw so hosts can tell when to re-upload the image.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn size_to(&mut self, device: Viewport) {
        let (width, height) = device.pixel_size();
        self.surface = Some(RgbaImage::new(width, height));
        self.revision += 1;
    }

    pub(crate) fn reset(&mut self) {
        self.surface = None;
        self.revision += 1;
    }

    fn surface_mut(&mut self) -> Option<&mut RgbaImage> {
        self.revision += 1;
        self.surface.as_mut()
    }
}

impl Viewer {
    /// Replaces the annotation list and redraws already-rendered pages only.
    /// Unrendered pages pick their highlights up when they render.
    pub fn set_annotations(&mut self, annotations: Vec<Annotation>) {
        self.annotations = annotations;
        self.redraw_rendered_highlights();
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|annotation| annotation.id == id)
    }

    pub(crate) fn redraw_rendered_highlights(&mut self) {
        let rendered: Vec<u32> = self
            .layout
            .slots()
            .iter()
            .filter(|slot| slot.is_rendered())
            .map(|slot| slot.page_number())
            .collect();
        for page_number in rendered {
            self.redraw_page_highlights(page_number);
        }
    }

    /// Clears the page's surface and repaints every matching annotation at
    /// normal opacity. Does nothing while the surface is unsized.
    pub fn redraw_page_highlights(&mut self, page_number: u32) {
        let scale = self.state.scale;
        let pixel_ratio = self.state.pixel_ratio;
        let Some(slot) = self.layout.slot_mut(page_number) else {
            return;
        };
        if !slot.highlights.is_sized() {
            return;
        }
        let Some(surface) = slot.highlights.surface_mut() else {
            return;
        };

        surface.clear();
        for annotation in self
            .annotations
            .iter()
            .filter(|annotation| annotation.page_number == page_number)
        {
            draw_annotation_rects(surface, annotation, scale, pixel_ratio, NORMAL_ALPHA);
        }
    }

    fn draw_flash_overlay(&mut self, annotation: &Annotation) {
        let scale = self.state.scale;
        let pixel_ratio = self.state.pixel_ratio;
        let Some(slot) = self.layout.slot_mut(annotation.page_number) else {
            return;
        };
        if !slot.highlights.is_sized() {
            return;
        }
        if let Some(surface) = slot.highlights.surface_mut() {
            draw_annotation_rects(surface, annotation, scale, pixel_ratio, FLASH_ALPHA);
        }
    }

    /// Flash-to-locate. Requests a render of the owning page if needed,
    /// scrolls so the first rect is vertically centered, and returns the
    /// animation the host drives with [`FlashAnimation::step`]. Returns
    /// `None` for an unknown id.
    pub fn highlight_annotation(&mut self, id: AnnotationId) -> Option<FlashAnimation> {
        let annotation = self.annotation(id)?.clone();
        let slot = self.layout.slot(annotation.page_number)?;

        let origin_y = slot.origin().y;
        let slot_height = slot.container().height;
        let scale = self.state.scale;
        let container_height = self.state.container_height;

        let target = match annotation.highlight_rects.first() {
            Some(rect) => {
                let center = origin_y + (rect.top + rect.height / 2.0) * scale;
                center - container_height / 2.0
            }
            None => origin_y - (container_height - slot_height) / 2.0,
        };

        self.request_render(annotation.page_number);
        self.jump_to(target);

        crate::debug_log!(
            "[highlight] locate annotation {} on page {}",
            annotation.id,
            annotation.page_number
        );

        Some(FlashAnimation {
            annotation,
            frame: 0,
            count: self.config.flash_count,
            interval: self.config.flash_interval,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashStep {
    /// The owning page is still rendering; call again after the delay.
    Waiting(Duration),
    /// A frame was drawn; call again after the delay.
    Next(Duration),
    Done,
}

/// Alternates a high-opacity overlay of one annotation with the normal
/// redraw, `count` times, then leaves the page at normal opacity.
#[derive(Debug, Clone)]
pub struct FlashAnimation {
    annotation: Annotation,
    frame: u32,
    count: u32,
    interval: Duration,
}

impl FlashAnimation {
    pub fn annotation_id(&self) -> AnnotationId {
        self.annotation.id
    }

    pub fn page_number(&self) -> u32 {
        self.annotation.page_number
    }

    pub fn step(&mut self, viewer: &mut Viewer) -> FlashStep {
        let page_number = self.annotation.page_number;
        let Some(slot) = viewer.layout.slot(page_number) else {
            return FlashStep::Done;
        };

        match slot.render_state() {
            RenderState::Pending { .. } => return FlashStep::Waiting(self.interval),
            RenderState::Unrendered => {
                crate::debug_log!(
                    "[highlight] page {} not rendered, dropping flash for {}",
                    page_number,
                    self.annotation.id
                );
                return FlashStep::Done;
            }
            RenderState::Rendered { .. } => {}
        }

        viewer.redraw_page_highlights(page_number);
        if self.frame >= self.count {
            return FlashStep::Done;
        }

        if self.frame % 2 == 0 {
            viewer.draw_flash_overlay(&self.annotation);
        }
        self.frame += 1;
        FlashStep::Next(self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(category: &str, rects: Vec<Rect>) -> Annotation {
        Annotation {
            id: 1,
            page_number: 1,
            category_name: category.to_string(),
            highlight_rects: rects,
            comment: String::new(),
            selected_text: String::new(),
        }
    }

    #[test]
    fn category_lookup_ignores_case() {
        assert_eq!(category_color("Critical"), Some([220, 38, 38]));
        assert_eq!(category_color("QUESTION"), Some([124, 58, 237]));
        assert_eq!(category_color("nitpick"), None);
    }

    #[test]
    fn unknown_category_draws_nothing() {
        let mut surface = RgbaImage::new(20, 20);
        let drawn = draw_annotation_rects(
            &mut surface,
            &annotation("Nitpick", vec![Rect::new(0.0, 0.0, 10.0, 10.0)]),
            1.0,
            1.0,
            NORMAL_ALPHA,
        );
        assert!(!drawn);
        assert!(surface.pixels().all(|pixel| pixel.0[3] == 0));
    }

    #[test]
    fn rects_are_scaled_by_scale_and_pixel_ratio() {
        let mut surface = RgbaImage::new(40, 40);
        draw_annotation_rects(
            &mut surface,
            &annotation("minor", vec![Rect::new(2.0, 3.0, 4.0, 2.0)]),
            1.5,
            2.0,
            NORMAL_ALPHA,
        );

        // page rect (2,3,4,2) becomes device rect (6,9,12,6)
        assert_eq!(surface.get_pixel(5, 9).0[3], 0);
        assert_ne!(surface.get_pixel(6, 9).0[3], 0);
        assert_ne!(surface.get_pixel(17, 14).0[3], 0);
        assert_eq!(surface.get_pixel(18, 14).0[3], 0);
        assert_eq!(surface.get_pixel(17, 15).0[3], 0);

        let pixel = surface.get_pixel(10, 10);
        assert_eq!(&pixel.0[..3], &[202, 138, 4]);
        assert_eq!(pixel.0[3], 64);
    }

    #[test]
    fn overlapping_fills_blend() {
        let mut surface = RgbaImage::new(4, 4);
        let rect = Rect::new(0.0, 0.0, 4.0, 4.0);
        surface.fill_rect(rect, [37, 99, 235], NORMAL_ALPHA);
        let single = surface.get_pixel(0, 0).0[3];
        surface.fill_rect(rect, [37, 99, 235], FLASH_ALPHA);
        assert!(surface.get_pixel(0, 0).0[3] > single);

        surface.clear();
        assert!(surface.pixels().all(|pixel| pixel.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn fill_is_clipped_to_surface() {
        let mut surface = RgbaImage::new(4, 4);
        surface.fill_rect(Rect::new(-10.0, 2.0, 100.0, 100.0), [0, 0, 0], 1.0);
        assert_eq!(surface.get_pixel(0, 1).0[3], 0);
        assert_eq!(surface.get_pixel(3, 3).0[3], 255);
    }

    #[test]
    fn canvas_is_unsized_until_sized() {
        let mut canvas = HighlightCanvas::default();
        assert!(!canvas.is_sized());
        canvas.size_to(Viewport {
            width: 10.2,
            height: 5.0,
            scale: 1.0,
        });
        assert!(canvas.is_sized());
        assert_eq!(canvas.surface().map(|s| s.dimensions()), Some((11, 5)));
        let revision = canvas.revision();
        canvas.reset();
        assert!(!canvas.is_sized());
        assert!(canvas.revision() > revision);
    }
}
