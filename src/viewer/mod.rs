//! Incremental page rendering and page-space coordinate mapping.
//!
//! [`Viewer`] is the single owner of [`ViewerState`]. Scale, generation and
//! layout change only through its methods, each of which runs to completion
//! without yielding, so no render can observe a half-applied zoom.

pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod highlight;
pub mod layout;
pub mod page_rendering;
pub mod scheduler;
pub mod text_selection;
pub mod types;

pub use config::ViewerConfig;
pub use document::{Document, DocumentLoader, Page, TextGlyph, TextSpan};
pub use error::{ViewerError, ViewerResult};
pub use highlight::{FlashAnimation, FlashStep};
pub use layout::{PageLayout, PageSlot, RenderState};
pub use page_rendering::{PaintOutcome, RenderOutcome, RenderTicket, TextLayerTicket};
pub use text_selection::RawSelection;
pub use types::{
    Annotation, AnnotationId, PageSize, Point, Rect, ScaleRequest, SelectionGeometry, Viewport,
    ViewerEvent,
};

use scheduler::Debouncer;
use std::sync::Arc;
use text_selection::SelectionDrag;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    pub scale: f32,
    /// Bumped by every scale change, pixel-ratio change, load and unload.
    pub generation: u64,
    pub pixel_ratio: f32,
    pub highlight_mode: bool,
    pub dual_page: bool,
    pub scroll_top: f32,
    pub container_width: f32,
    pub container_height: f32,
    /// 0 while no document is loaded.
    pub current_page: u32,
}

pub struct Viewer {
    config: ViewerConfig,
    state: ViewerState,
    document: Option<Arc<dyn Document>>,
    layout: PageLayout,
    annotations: Vec<Annotation>,
    render_queue: Vec<RenderTicket>,
    events: Vec<ViewerEvent>,
    debounce: Debouncer,
    selection: Option<SelectionDrag>,
    hovered: Option<AnnotationId>,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        let state = ViewerState {
            scale: config.initial_scale,
            generation: 0,
            pixel_ratio: config.pixel_ratio,
            highlight_mode: false,
            dual_page: false,
            scroll_top: 0.0,
            container_width: 0.0,
            container_height: 0.0,
            current_page: 0,
        };

        Self {
            config,
            state,
            document: None,
            layout: PageLayout::default(),
            annotations: Vec::new(),
            render_queue: Vec::new(),
            events: Vec::new(),
            debounce: Debouncer::default(),
            selection: None,
            hovered: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn slot(&self, page_number: u32) -> Option<&PageSlot> {
        self.layout.slot(page_number)
    }

    pub fn document(&self) -> Option<&Arc<dyn Document>> {
        self.document.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn page_count(&self) -> u32 {
        self.layout.page_count()
    }

    pub fn scale(&self) -> f32 {
        self.state.scale
    }

    pub fn current_page(&self) -> u32 {
        self.state.current_page
    }

    /// Decodes `bytes` and builds placeholders for every page. Returns the
    /// page count. On failure the viewer is left empty.
    pub fn load(&mut self, loader: &dyn DocumentLoader, bytes: &[u8]) -> ViewerResult<u32> {
        self.unload();
        let document = loader.load(bytes)?;
        self.open_document(document)
    }

    pub fn open_document(&mut self, document: Arc<dyn Document>) -> ViewerResult<u32> {
        self.unload();

        let layout = PageLayout::build(
            document.as_ref(),
            self.state.scale,
            self.state.dual_page,
            self.state.container_width,
            &self.config,
        )?;
        let page_count = layout.page_count();

        self.layout = layout;
        self.document = Some(document);
        crate::debug_log!(
            "[viewer] loaded {} page(s) at scale {:.3}",
            page_count,
            self.state.scale
        );

        self.update_current_page();
        self.schedule();
        Ok(page_count)
    }

    /// Drops the document and every slot. In-flight tickets become stale.
    pub fn unload(&mut self) {
        self.state.generation += 1;
        self.state.scroll_top = 0.0;
        self.state.current_page = 0;
        self.document = None;
        self.layout = PageLayout::default();
        self.annotations.clear();
        self.render_queue.clear();
        self.selection = None;
        self.hovered = None;
    }

    /// Changes the document scale in one step: bump the generation, resize
    /// every container, clear all rendered content, restore the relative
    /// scroll position and reschedule. Fixed and fit-width scales are both
    /// clamped to the configured zoom range.
    pub fn set_scale(&mut self, request: impl Into<ScaleRequest>) -> ViewerResult<()> {
        let scale = match request.into() {
            ScaleRequest::Fixed(scale) => scale,
            ScaleRequest::FitWidth => geometry::fit_width_scale(
                self.state.container_width,
                self.config.page_padding * 2.0,
                self.config.page_gap,
                self.layout.first_page().map(|slot| slot.page().size()),
                self.state.dual_page,
            ),
        };

        if !scale.is_finite() || scale <= 0.0 {
            return Err(ViewerError::InvalidScale(scale));
        }

        let scale = scale.clamp(self.config.zoom_min, self.config.zoom_max);
        self.apply_scale(scale);
        Ok(())
    }

    pub fn zoom_in(&mut self) -> ViewerResult<()> {
        let scale = (self.state.scale * self.config.zoom_step).min(self.config.zoom_max);
        self.set_scale(scale)
    }

    pub fn zoom_out(&mut self) -> ViewerResult<()> {
        let scale = (self.state.scale / self.config.zoom_step).max(self.config.zoom_min);
        self.set_scale(scale)
    }

    /// A new device pixel ratio invalidates every raster surface, the same
    /// way a scale change does.
    pub fn set_pixel_ratio(&mut self, pixel_ratio: f32) -> ViewerResult<()> {
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(ViewerError::InvalidScale(pixel_ratio));
        }
        if pixel_ratio == self.state.pixel_ratio {
            return Ok(());
        }

        self.state.pixel_ratio = pixel_ratio;
        self.apply_scale(self.state.scale);
        Ok(())
    }

    fn apply_scale(&mut self, scale: f32) {
        let scroll_ratio = self.scroll_ratio();

        self.state.scale = scale;
        self.state.generation += 1;
        self.layout.rescale(scale, self.state.container_width);
        for slot in self.layout.slots_mut() {
            slot.clear_content();
        }
        self.render_queue.clear();
        self.selection = None;

        self.state.scroll_top = self.clamp_scroll(scroll_ratio * self.layout.content_height());
        crate::debug_log!(
            "[viewer] scale -> {:.3} (generation {})",
            scale,
            self.state.generation
        );

        self.update_current_page();
        self.schedule();
    }

    /// Regroups pages into spreads (1 | 2,3 | 4,5 ...) or single rows.
    pub fn set_dual_page(&mut self, enabled: bool) {
        if self.state.dual_page == enabled {
            return;
        }
        self.state.dual_page = enabled;
        if self.layout.is_empty() {
            return;
        }

        let scroll_ratio = self.scroll_ratio();
        self.layout.set_dual_page(enabled, self.state.container_width);
        self.state.scroll_top = self.clamp_scroll(scroll_ratio * self.layout.content_height());

        self.update_current_page();
        self.schedule();
    }

    pub fn set_highlight_mode(&mut self, enabled: bool) {
        self.state.highlight_mode = enabled;
        if enabled {
            self.hovered = None;
        }
    }

    /// Records new container dimensions. Horizontal placement updates at
    /// once; the visibility pass waits for `settle` with the returned epoch.
    pub fn resize(&mut self, width: f32, height: f32) -> u64 {
        let width = width.max(0.0);
        let height = height.max(0.0);
        if width != self.state.container_width {
            self.layout.arrange(width);
        }
        self.state.container_width = width;
        self.state.container_height = height;
        self.state.scroll_top = self.clamp_scroll(self.state.scroll_top);
        self.debounce.bump()
    }

    /// User scroll. The visibility pass waits for `settle` with the returned
    /// epoch.
    pub fn scroll_to(&mut self, scroll_top: f32) -> u64 {
        self.state.scroll_top = self.clamp_scroll(scroll_top);
        self.debounce.bump()
    }

    pub fn scroll_by(&mut self, delta: f32) -> u64 {
        self.scroll_to(self.state.scroll_top + delta)
    }

    /// Aligns the top of the page's container with the top of the viewport.
    pub fn scroll_to_page(&mut self, page_number: u32) -> ViewerResult<()> {
        if self.layout.is_empty() {
            return Err(ViewerError::NoDocument);
        }
        let Some(slot) = self.layout.slot(page_number) else {
            return Err(ViewerError::PageOutOfRange {
                page: page_number,
                total: self.layout.page_count(),
            });
        };
        let target = slot.origin().y;
        self.jump_to(target);
        Ok(())
    }

    /// Programmatic scroll; the visibility pass runs immediately.
    pub(crate) fn jump_to(&mut self, scroll_top: f32) {
        self.state.scroll_top = self.clamp_scroll(scroll_top);
        self.update_current_page();
        self.schedule();
    }

    pub fn content_height(&self) -> f32 {
        self.layout.content_height()
    }

    pub fn max_scroll_top(&self) -> f32 {
        (self.layout.content_height() - self.state.container_height).max(0.0)
    }

    fn clamp_scroll(&self, scroll_top: f32) -> f32 {
        if scroll_top.is_finite() {
            scroll_top.clamp(0.0, self.max_scroll_top())
        } else {
            0.0
        }
    }

    fn scroll_ratio(&self) -> f32 {
        let content_height = self.layout.content_height();
        if content_height > 0.0 {
            self.state.scroll_top / content_height
        } else {
            0.0
        }
    }

    pub fn take_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Page whose container holds the viewport-space point.
    pub fn page_at_viewport_point(&self, point: Point) -> Option<u32> {
        let content = Point::new(point.x, point.y + self.state.scroll_top);
        self.layout
            .slots()
            .iter()
            .find(|slot| slot.bounds().contains(content))
            .map(|slot| slot.page_number())
    }

    /// Top-left corner of the page's container in viewport space.
    pub fn viewport_origin(&self, page_number: u32) -> Option<Point> {
        let origin = self.layout.slot(page_number)?.origin();
        Some(Point::new(origin.x, origin.y - self.state.scroll_top))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeDocument;
    use super::*;

    struct FailingLoader;

    impl DocumentLoader for FailingLoader {
        fn load(&self, _bytes: &[u8]) -> ViewerResult<Arc<dyn Document>> {
            Err(ViewerError::DocumentLoad("not a pdf".to_string()))
        }
    }

    fn viewer_with(document: FakeDocument) -> (Viewer, Arc<FakeDocument>) {
        let document = Arc::new(document);
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.resize(1000.0, 800.0);
        viewer.open_document(document.clone()).unwrap();
        (viewer, document)
    }

    #[test]
    fn load_emits_first_page_and_queues_visible_renders() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(10, 500.0, 700.0));
        assert_eq!(viewer.page_count(), 10);
        assert_eq!(viewer.take_events(), vec![ViewerEvent::PageChanged(1)]);

        // 800px container, 1600px margin: pages overlapping [-1600, 2400].
        let pages: Vec<u32> = viewer
            .take_render_tickets()
            .iter()
            .map(RenderTicket::page_number)
            .collect();
        assert_eq!(pages, vec![1, 2, 3, 4]);
    }

    #[test]
    fn failed_load_leaves_viewer_empty() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(3, 500.0, 700.0));
        let result = viewer.load(&FailingLoader, b"garbage");
        assert!(matches!(result, Err(ViewerError::DocumentLoad(_))));
        assert!(!viewer.is_loaded());
        assert_eq!(viewer.page_count(), 0);
        assert_eq!(viewer.content_height(), 0.0);
        assert!(viewer.take_render_tickets().is_empty());
    }

    #[test]
    fn missing_page_fails_without_partial_layout() {
        let mut viewer = Viewer::new(ViewerConfig::default());
        let document = Arc::new(FakeDocument::uniform(3, 500.0, 700.0).with_missing_page(3));
        assert!(viewer.open_document(document).is_err());
        assert_eq!(viewer.page_count(), 0);
    }

    #[test]
    fn scale_change_resizes_before_rendering() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(3, 500.0, 700.0));
        viewer.run_pending_renders().unwrap();
        let generation = viewer.state().generation;

        viewer.set_scale(2.0).unwrap();
        assert_eq!(viewer.state().generation, generation + 1);
        for slot in viewer.layout().slots() {
            assert_eq!(slot.container().width, 1000.0);
            assert_eq!(slot.container().height, 1400.0);
            assert!(!slot.canvas().is_populated());
            assert!(!slot.is_rendered());
        }
    }

    #[test]
    fn invalid_scales_are_rejected() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(1, 500.0, 700.0));
        assert!(matches!(
            viewer.set_scale(0.0),
            Err(ViewerError::InvalidScale(_))
        ));
        assert!(viewer.set_scale(f32::NAN).is_err());
        assert!(viewer.set_pixel_ratio(-1.0).is_err());
        assert_eq!(viewer.scale(), 1.0);
    }

    #[test]
    fn fit_width_uses_first_page() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(2, 476.0, 700.0));
        viewer.set_scale(ScaleRequest::FitWidth).unwrap();
        assert_eq!(viewer.scale(), 2.0);

        viewer.set_dual_page(true);
        viewer.set_scale(ScaleRequest::FitWidth).unwrap();
        assert_eq!(viewer.scale(), (1000.0 - 48.0 - 16.0) / (476.0 * 2.0));
    }

    #[test]
    fn oversized_scales_are_clamped_before_rendering() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(1, 500.0, 700.0));
        viewer.take_render_tickets();

        viewer.set_scale(1.0e7).unwrap();
        assert_eq!(viewer.scale(), 3.0);
        let tickets = viewer.take_render_tickets();
        assert_eq!(tickets[0].device_viewport().width, 1500.0);
        assert!(!viewer.slot(1).unwrap().highlights().is_sized());

        viewer.set_scale(1.0e-7).unwrap();
        assert_eq!(viewer.scale(), 0.25);
    }

    #[test]
    fn fit_width_on_a_sliver_page_is_clamped() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(2, 0.01, 700.0));
        viewer.set_scale(ScaleRequest::FitWidth).unwrap();
        assert_eq!(viewer.scale(), 3.0);
        assert_eq!(viewer.slot(1).unwrap().container().height, 2100.0);

        viewer.run_pending_renders().unwrap();
        let surface = viewer.slot(1).unwrap().highlights().surface().unwrap();
        assert_eq!(surface.height(), 2100);
    }

    #[test]
    fn zoom_is_clamped() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(1, 500.0, 700.0));
        for _ in 0..10 {
            viewer.zoom_in().unwrap();
        }
        assert_eq!(viewer.scale(), 3.0);
        for _ in 0..20 {
            viewer.zoom_out().unwrap();
        }
        assert_eq!(viewer.scale(), 0.25);
    }

    #[test]
    fn scale_change_keeps_relative_scroll_position() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(10, 500.0, 700.0));
        let epoch = viewer.scroll_to(3000.0);
        assert!(viewer.settle(epoch));
        let ratio = viewer.state().scroll_top / viewer.content_height();

        viewer.set_scale(2.0).unwrap();
        let after = viewer.state().scroll_top / viewer.content_height();
        assert!((ratio - after).abs() < 1e-4);
    }

    #[test]
    fn superseded_scroll_does_not_settle() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(10, 500.0, 700.0));
        viewer.take_render_tickets();
        viewer.take_events();

        let first = viewer.scroll_to(2000.0);
        let second = viewer.scroll_to(5000.0);
        assert!(!viewer.settle(first));
        assert!(viewer.take_render_tickets().is_empty());

        assert!(viewer.settle(second));
        assert!(!viewer.take_render_tickets().is_empty());
        assert!(matches!(
            viewer.take_events().as_slice(),
            [ViewerEvent::PageChanged(page)] if *page > 1
        ));
    }

    #[test]
    fn taller_container_widens_render_margin_once_settled() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(10, 500.0, 700.0));
        viewer.take_render_tickets();

        let epoch = viewer.resize(1000.0, 1600.0);
        assert!(viewer.take_render_tickets().is_empty());

        // 1600px container, 3200px margin: pages overlapping [-3200, 4800].
        assert!(viewer.settle(epoch));
        let pages: Vec<u32> = viewer
            .take_render_tickets()
            .iter()
            .map(RenderTicket::page_number)
            .collect();
        assert_eq!(pages, vec![5, 6, 7]);
    }

    #[test]
    fn superseded_resize_schedules_nothing() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(10, 500.0, 700.0));
        viewer.take_render_tickets();

        let first = viewer.resize(1000.0, 1600.0);
        let second = viewer.resize(1000.0, 2400.0);
        assert!(!viewer.settle(first));
        assert!(viewer.take_render_tickets().is_empty());

        assert!(viewer.settle(second));
        let pages: Vec<u32> = viewer
            .take_render_tickets()
            .iter()
            .map(RenderTicket::page_number)
            .collect();
        assert_eq!(pages, vec![5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn scroll_to_page_aligns_container_top() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(10, 500.0, 700.0));
        viewer.take_events();
        viewer.scroll_to_page(5).unwrap();
        assert_eq!(viewer.state().scroll_top, 24.0 + 4.0 * 716.0);
        assert_eq!(viewer.current_page(), 5);
        assert!(matches!(
            viewer.scroll_to_page(11),
            Err(ViewerError::PageOutOfRange { page: 11, total: 10 })
        ));
    }

    #[test]
    fn scroll_is_clamped_to_content() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(2, 500.0, 700.0));
        viewer.scroll_to(1e9);
        assert_eq!(viewer.state().scroll_top, viewer.max_scroll_top());
        viewer.scroll_to(-50.0);
        assert_eq!(viewer.state().scroll_top, 0.0);
    }

    #[test]
    fn dual_page_keeps_numbering() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(5, 400.0, 600.0));
        viewer.run_pending_renders().unwrap();
        viewer.set_dual_page(true);

        assert_eq!(viewer.layout().rows(), &[vec![1], vec![2, 3], vec![4, 5]]);
        assert!(viewer.slot(2).unwrap().is_rendered());
        viewer.scroll_to_page(3).unwrap();
        assert_eq!(
            viewer.state().scroll_top,
            viewer.slot(2).unwrap().origin().y.min(viewer.max_scroll_top())
        );
    }

    #[test]
    fn pixel_ratio_change_rerenders_at_device_size() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(1, 500.0, 700.0));
        viewer.run_pending_renders().unwrap();
        viewer.set_pixel_ratio(2.0).unwrap();

        let tickets = viewer.take_render_tickets();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].device_viewport().width, 1000.0);
        assert_eq!(tickets[0].layout_viewport().width, 500.0);
    }

    #[test]
    fn pixel_ratio_change_alone_requeues_without_settling() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(1, 500.0, 700.0));
        viewer.run_pending_renders().unwrap();
        let generation = viewer.state().generation;

        viewer.set_pixel_ratio(1.0).unwrap();
        assert_eq!(viewer.state().generation, generation);
        assert_eq!(viewer.queued_render_count(), 0);

        viewer.set_pixel_ratio(1.5).unwrap();
        assert_eq!(viewer.state().generation, generation + 1);
        assert_eq!(viewer.state().container_width, 1000.0);
        assert_eq!(viewer.queued_render_count(), 1);
    }

    #[test]
    fn page_lookup_accounts_for_scroll() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(3, 500.0, 700.0));
        assert_eq!(viewer.page_at_viewport_point(Point::new(300.0, 100.0)), Some(1));
        assert_eq!(viewer.page_at_viewport_point(Point::new(10.0, 100.0)), None);

        let epoch = viewer.scroll_to(740.0);
        viewer.settle(epoch);
        assert_eq!(viewer.page_at_viewport_point(Point::new(300.0, 10.0)), Some(2));
        assert_eq!(viewer.viewport_origin(2), Some(Point::new(250.0, 0.0)));
    }

    #[test]
    fn selection_in_highlight_mode_emits_page_space_rects() {
        let (mut viewer, _) =
            viewer_with(FakeDocument::uniform(1, 500.0, 700.0).with_text("Hello world", 50.0, 100.0));
        viewer.set_scale(2.0).unwrap();
        viewer.run_pending_renders().unwrap();
        viewer.take_events();
        viewer.set_highlight_mode(true);

        // Page origin is (24, 24) at scale 2 in a 1000px container.
        let origin = viewer.viewport_origin(1).unwrap();
        let at = |x: f32, y: f32| Point::new(origin.x + x * 2.0, origin.y + y * 2.0);
        viewer.pointer_down(at(51.0, 105.0));
        viewer.pointer_drag(at(80.0, 105.0));
        let geometry = viewer.pointer_up(at(81.0, 105.0)).unwrap();

        assert_eq!(geometry.page_number, 1);
        assert_eq!(geometry.selected_text, "Hello");
        assert_eq!(geometry.rects.len(), 1);
        let rect = geometry.rects[0];
        assert!((rect.left - 50.0).abs() < 1e-3);
        assert!((rect.top - 100.0).abs() < 1e-3);
        assert!((rect.width - 30.0).abs() < 1e-3);
        assert!((rect.height - 10.0).abs() < 1e-3);
        assert!(matches!(
            viewer.take_events().as_slice(),
            [ViewerEvent::TextSelected(_)]
        ));
    }

    #[test]
    fn selection_outside_highlight_mode_emits_nothing() {
        let (mut viewer, _) =
            viewer_with(FakeDocument::uniform(1, 500.0, 700.0).with_text("Hello", 50.0, 100.0));
        viewer.run_pending_renders().unwrap();
        viewer.take_events();

        let origin = viewer.viewport_origin(1).unwrap();
        viewer.pointer_down(Point::new(origin.x + 51.0, origin.y + 105.0));
        assert!(
            viewer
                .pointer_up(Point::new(origin.x + 79.0, origin.y + 105.0))
                .is_none()
        );
        assert_eq!(viewer.selected_text().as_deref(), Some("Hello"));
        assert!(viewer.take_events().is_empty());
    }

    #[test]
    fn selection_anchored_outside_pages_is_ignored() {
        let (viewer, _) = viewer_with(FakeDocument::uniform(1, 500.0, 700.0));
        let raw = RawSelection {
            anchor: Point::new(5.0, 5.0),
            text: "stray".to_string(),
            client_rects: vec![Rect::new(5.0, 5.0, 10.0, 10.0)],
        };
        assert!(viewer.map_selection(&raw, Point::new(5.0, 5.0)).is_none());
    }

    #[test]
    fn click_and_hover_hit_annotations_outside_highlight_mode() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(1, 500.0, 700.0));
        viewer.set_scale(2.0).unwrap();
        viewer.set_annotations(vec![Annotation {
            id: 9,
            page_number: 1,
            category_name: "Suggestion".to_string(),
            highlight_rects: vec![Rect::new(10.0, 20.0, 30.0, 10.0)],
            comment: "tighten".to_string(),
            selected_text: String::new(),
        }]);
        viewer.take_events();

        let origin = viewer.viewport_origin(1).unwrap();
        let edge = Point::new(origin.x + 40.0 * 2.0, origin.y + 30.0 * 2.0);
        assert!(viewer.hover(edge));
        assert!(viewer.click(edge, true));
        assert!(matches!(
            viewer.take_events().as_slice(),
            [ViewerEvent::HighlightClicked { annotation, context_menu: true }] if annotation.id == 9
        ));

        viewer.set_highlight_mode(true);
        assert!(!viewer.hover(edge));
        assert!(!viewer.click(edge, false));
        assert!(viewer.take_events().is_empty());
    }

    #[test]
    fn flash_alternates_then_settles_to_normal() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(6, 500.0, 700.0));
        viewer.run_pending_renders().unwrap();
        viewer.set_annotations(vec![Annotation {
            id: 4,
            page_number: 6,
            category_name: "Critical".to_string(),
            highlight_rects: vec![Rect::new(100.0, 300.0, 50.0, 20.0)],
            comment: String::new(),
            selected_text: String::new(),
        }]);

        let mut flash = viewer.highlight_annotation(4).unwrap();
        assert_eq!(flash.page_number(), 6);

        // First rect center in content space sits at the viewport center.
        let origin_y = viewer.slot(6).unwrap().origin().y;
        let expected = (origin_y + 310.0 - 400.0).min(viewer.max_scroll_top());
        assert_eq!(viewer.state().scroll_top, expected);

        assert!(matches!(flash.step(&mut viewer), FlashStep::Waiting(_)));
        viewer.run_pending_renders().unwrap();

        let alpha = |viewer: &Viewer| {
            viewer
                .slot(6)
                .unwrap()
                .highlights()
                .surface()
                .unwrap()
                .get_pixel(120, 310)
                .0[3]
        };
        let normal = alpha(&viewer);
        let mut frames = Vec::new();
        loop {
            match flash.step(&mut viewer) {
                FlashStep::Next(_) => frames.push(alpha(&viewer)),
                FlashStep::Done => break,
                FlashStep::Waiting(_) => panic!("page already rendered"),
            }
        }
        assert_eq!(frames.len(), 4);
        assert!(frames[0] > normal);
        assert_eq!(frames[1], normal);
        assert!(frames[2] > normal);
        assert_eq!(frames[3], normal);
        assert_eq!(alpha(&viewer), normal);
        assert!(viewer.highlight_annotation(999).is_none());
    }

    #[test]
    fn unload_resets_state() {
        let (mut viewer, _) = viewer_with(FakeDocument::uniform(2, 500.0, 700.0));
        let generation = viewer.state().generation;
        viewer.unload();
        assert!(!viewer.is_loaded());
        assert_eq!(viewer.current_page(), 0);
        assert_eq!(viewer.state().generation, generation + 1);
        assert!(viewer.annotations().is_empty());
    }
}
