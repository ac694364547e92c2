//! Placeholder slots for every page, sized before any pixel content exists,
//! and their arrangement into rows (single pages or two-page spreads).

use super::config::ViewerConfig;
use super::document::{Document, Page};
use super::error::{ViewerError, ViewerResult};
use super::highlight::HighlightCanvas;
use super::text_selection::TextLayer;
use super::types::{Point, Rect, Viewport};
use image::RgbaImage;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    #[default]
    Unrendered,
    /// A render started under `generation` is in flight.
    Pending { generation: u64 },
    Rendered { generation: u64 },
}

impl RenderState {
    pub fn is_marked(&self) -> bool {
        !matches!(self, Self::Unrendered)
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered { .. })
    }
}

/// Raster target for a page. Device size is zero until a render sizes it.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    device: Viewport,
    layout: Viewport,
    bitmap: Option<Arc<RgbaImage>>,
}

impl Default for PixelCanvas {
    fn default() -> Self {
        Self {
            device: Viewport::EMPTY,
            layout: Viewport::EMPTY,
            bitmap: None,
        }
    }
}

impl PixelCanvas {
    pub fn device_viewport(&self) -> Viewport {
        self.device
    }

    pub fn layout_viewport(&self) -> Viewport {
        self.layout
    }

    pub fn bitmap(&self) -> Option<&Arc<RgbaImage>> {
        self.bitmap.as_ref()
    }

    pub fn is_populated(&self) -> bool {
        self.bitmap.is_some()
    }

    pub(crate) fn size_for(&mut self, layout: Viewport, device: Viewport) {
        self.layout = layout;
        self.device = device;
        self.bitmap = None;
    }

    pub(crate) fn install(&mut self, bitmap: RgbaImage) {
        self.bitmap = Some(Arc::new(bitmap));
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

pub struct PageSlot {
    page_number: u32,
    page: Arc<dyn Page>,
    container: Viewport,
    origin: Point,
    pub(crate) canvas: PixelCanvas,
    pub(crate) text_layer: TextLayer,
    pub(crate) highlights: HighlightCanvas,
    pub(crate) state: RenderState,
}

impl PageSlot {
    fn new(page_number: u32, page: Arc<dyn Page>, scale: f32) -> Self {
        let container = page.viewport(scale);
        Self {
            page_number,
            page,
            container,
            origin: Point::default(),
            canvas: PixelCanvas::default(),
            text_layer: TextLayer::default(),
            highlights: HighlightCanvas::default(),
            state: RenderState::Unrendered,
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    /// Layout-space size of the page container at the current scale.
    pub fn container(&self) -> Viewport {
        self.container
    }

    /// Top-left corner of the container in scroll-content space.
    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.origin.x,
            self.origin.y,
            self.container.width,
            self.container.height,
        )
    }

    pub fn canvas(&self) -> &PixelCanvas {
        &self.canvas
    }

    pub fn text_layer(&self) -> &TextLayer {
        &self.text_layer
    }

    pub fn highlights(&self) -> &HighlightCanvas {
        &self.highlights
    }

    pub fn render_state(&self) -> RenderState {
        self.state
    }

    pub fn is_rendered(&self) -> bool {
        self.state.is_rendered()
    }

    fn resize(&mut self, scale: f32) {
        self.container = self.page.viewport(scale);
    }

    /// Drops pixel, text and highlight content and the rendered marker.
    pub(crate) fn clear_content(&mut self) {
        self.canvas.clear();
        self.text_layer.clear();
        self.highlights.reset();
        self.state = RenderState::Unrendered;
    }
}

/// Groups page numbers into rows. In dual-page mode page 1 stands alone and
/// the rest pair up as (2,3), (4,5), ...
pub fn group_rows(page_count: u32, dual_page: bool) -> Vec<Vec<u32>> {
    if !dual_page {
        return (1..=page_count).map(|page| vec![page]).collect();
    }

    let mut rows = Vec::new();
    if page_count == 0 {
        return rows;
    }
    rows.push(vec![1]);
    let mut page = 2;
    while page <= page_count {
        if page < page_count {
            rows.push(vec![page, page + 1]);
        } else {
            rows.push(vec![page]);
        }
        page += 2;
    }
    rows
}

#[derive(Default)]
pub struct PageLayout {
    slots: Vec<PageSlot>,
    rows: Vec<Vec<u32>>,
    dual_page: bool,
    padding: f32,
    gap: f32,
    content_width: f32,
    content_height: f32,
}

impl PageLayout {
    /// Creates one correctly sized, empty slot per page, in page order. Fails
    /// without returning a partial layout if any page cannot be fetched.
    pub fn build(
        document: &dyn Document,
        scale: f32,
        dual_page: bool,
        container_width: f32,
        config: &ViewerConfig,
    ) -> ViewerResult<Self> {
        let page_count = document.page_count();
        let mut slots = Vec::with_capacity(page_count as usize);

        for page_number in 1..=page_count {
            let page = document.page(page_number).map_err(|err| {
                ViewerError::DocumentLoad(format!("page {page_number}: {err:#}"))
            })?;
            slots.push(PageSlot::new(page_number, page, scale));
        }

        let mut layout = Self {
            slots,
            rows: group_rows(page_count, dual_page),
            dual_page,
            padding: config.page_padding,
            gap: config.page_gap,
            content_width: 0.0,
            content_height: 0.0,
        };
        layout.arrange(container_width);
        Ok(layout)
    }

    pub fn page_count(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, page_number: u32) -> Option<&PageSlot> {
        let index = page_number.checked_sub(1)? as usize;
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, page_number: u32) -> Option<&mut PageSlot> {
        let index = page_number.checked_sub(1)? as usize;
        self.slots.get_mut(index)
    }

    pub fn slots(&self) -> &[PageSlot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [PageSlot] {
        &mut self.slots
    }

    pub fn rows(&self) -> &[Vec<u32>] {
        &self.rows
    }

    pub fn is_dual_page(&self) -> bool {
        self.dual_page
    }

    pub fn content_width(&self) -> f32 {
        self.content_width
    }

    pub fn content_height(&self) -> f32 {
        self.content_height
    }

    pub fn first_page(&self) -> Option<&PageSlot> {
        self.slots.first()
    }

    /// Regroups slots into spreads or single rows. Page numbering and
    /// per-page geometry are untouched.
    pub fn set_dual_page(&mut self, dual_page: bool, container_width: f32) {
        self.dual_page = dual_page;
        self.rows = group_rows(self.page_count(), dual_page);
        self.arrange(container_width);
    }

    /// Resizes every container to `scale` and recomputes positions.
    pub fn rescale(&mut self, scale: f32, container_width: f32) {
        for slot in &mut self.slots {
            slot.resize(scale);
        }
        self.arrange(container_width);
    }

    /// Positions each row, centering it horizontally within the container.
    pub fn arrange(&mut self, container_width: f32) {
        let mut cursor_y = self.padding;
        let mut widest = 0.0_f32;

        for row in &self.rows {
            let mut row_width = 0.0;
            let mut row_height = 0.0_f32;
            for (ix, page_number) in row.iter().enumerate() {
                let Some(slot) = page_number
                    .checked_sub(1)
                    .and_then(|index| self.slots.get(index as usize))
                else {
                    continue;
                };
                if ix > 0 {
                    row_width += self.gap;
                }
                row_width += slot.container.width;
                row_height = row_height.max(slot.container.height);
            }
            widest = widest.max(row_width);

            let mut cursor_x = ((container_width - row_width) / 2.0).max(self.padding);
            for page_number in row {
                let Some(slot) = page_number
                    .checked_sub(1)
                    .and_then(|index| self.slots.get_mut(index as usize))
                else {
                    continue;
                };
                slot.origin = Point::new(cursor_x, cursor_y);
                cursor_x += slot.container.width + self.gap;
            }

            cursor_y += row_height + self.gap;
        }

        if self.rows.is_empty() {
            self.content_width = 0.0;
            self.content_height = 0.0;
        } else {
            self.content_width = widest + self.padding * 2.0;
            self.content_height = cursor_y - self.gap + self.padding;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::testing::FakeDocument;

    fn config() -> ViewerConfig {
        ViewerConfig::default()
    }

    #[test]
    fn spreads_keep_first_page_alone() {
        assert_eq!(group_rows(0, true), Vec::<Vec<u32>>::new());
        assert_eq!(group_rows(1, true), vec![vec![1]]);
        assert_eq!(group_rows(4, true), vec![vec![1], vec![2, 3], vec![4]]);
        assert_eq!(
            group_rows(5, true),
            vec![vec![1], vec![2, 3], vec![4, 5]]
        );
        assert_eq!(group_rows(3, false), vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn placeholders_are_sized_before_rendering() {
        let document = FakeDocument::uniform(3, 600.0, 800.0);
        let layout = PageLayout::build(&document, 1.5, false, 1000.0, &config()).unwrap();

        assert_eq!(layout.page_count(), 3);
        for slot in layout.slots() {
            assert_eq!(slot.container().width, 900.0);
            assert_eq!(slot.container().height, 1200.0);
            assert!(!slot.canvas().is_populated());
            assert_eq!(slot.canvas().device_viewport(), Viewport::EMPTY);
            assert_eq!(slot.render_state(), RenderState::Unrendered);
        }
        assert_eq!(document.paint_count(), 0);
    }

    #[test]
    fn rows_stack_with_padding_and_gap() {
        let document = FakeDocument::uniform(3, 500.0, 700.0);
        let layout = PageLayout::build(&document, 1.0, false, 1000.0, &config()).unwrap();

        assert_eq!(layout.slot(1).unwrap().origin(), Point::new(250.0, 24.0));
        assert_eq!(layout.slot(2).unwrap().origin(), Point::new(250.0, 740.0));
        assert_eq!(layout.slot(3).unwrap().origin(), Point::new(250.0, 1456.0));
        assert_eq!(layout.content_height(), 24.0 + 3.0 * 700.0 + 2.0 * 16.0 + 24.0);
    }

    #[test]
    fn narrow_container_pins_rows_to_padding() {
        let document = FakeDocument::uniform(1, 500.0, 700.0);
        let layout = PageLayout::build(&document, 1.0, false, 300.0, &config()).unwrap();
        assert_eq!(layout.slot(1).unwrap().origin().x, 24.0);
        assert_eq!(layout.content_width(), 548.0);
    }

    #[test]
    fn dual_page_regroups_without_changing_geometry() {
        let document = FakeDocument::uniform(3, 400.0, 600.0);
        let mut layout = PageLayout::build(&document, 1.0, false, 1000.0, &config()).unwrap();
        let single_sizes: Vec<_> = layout.slots().iter().map(|s| s.container()).collect();

        layout.set_dual_page(true, 1000.0);
        let dual_sizes: Vec<_> = layout.slots().iter().map(|s| s.container()).collect();
        assert_eq!(single_sizes, dual_sizes);

        let page_two = layout.slot(2).unwrap().origin();
        let page_three = layout.slot(3).unwrap().origin();
        assert_eq!(page_two.y, page_three.y);
        assert_eq!(page_three.x - page_two.x, 416.0);
        assert_eq!(page_two.x, (1000.0 - 816.0) / 2.0);
        assert_eq!(layout.slot(3).unwrap().page_number(), 3);
    }

    #[test]
    fn rescale_updates_every_container() {
        let document = FakeDocument::uniform(2, 400.0, 600.0);
        let mut layout = PageLayout::build(&document, 1.0, false, 1000.0, &config()).unwrap();
        layout.rescale(2.0, 1000.0);
        for slot in layout.slots() {
            assert_eq!(slot.container().width, 800.0);
            assert_eq!(slot.container().height, 1200.0);
        }
        assert_eq!(layout.slot(2).unwrap().origin().y, 24.0 + 1200.0 + 16.0);
    }

    #[test]
    fn failing_page_fetch_is_a_load_error() {
        let document = FakeDocument::uniform(3, 400.0, 600.0).with_missing_page(2);
        let result = PageLayout::build(&document, 1.0, false, 1000.0, &config());
        assert!(matches!(result, Err(ViewerError::DocumentLoad(_))));
    }
}
