//! Materializing one page: paint, then text layer, then highlights.
//!
//! Each suspension point is a ticket the host runs wherever it likes. The
//! generation captured in a ticket is compared against the viewer's current
//! generation when the ticket completes; a mismatch means the scale changed
//! mid-flight and the result is dropped.

use super::Viewer;
use super::document::{Page, TextSpan};
use super::error::{ViewerError, ViewerResult};
use super::geometry;
use super::layout::RenderState;
use super::text_selection::TextLayer;
use super::types::Viewport;
use image::RgbaImage;
use std::sync::Arc;

/// Paint request for one page, captured at a specific generation.
#[derive(Clone)]
pub struct RenderTicket {
    page_number: u32,
    generation: u64,
    layout: Viewport,
    device: Viewport,
    page: Arc<dyn Page>,
}

impl std::fmt::Debug for RenderTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTicket")
            .field("page_number", &self.page_number)
            .field("generation", &self.generation)
            .field("layout", &self.layout)
            .field("device", &self.device)
            .finish()
    }
}

impl RenderTicket {
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn layout_viewport(&self) -> Viewport {
        self.layout
    }

    /// Raster target size: layout viewport times the device pixel ratio.
    pub fn device_viewport(&self) -> Viewport {
        self.device
    }

    /// Paints the page at device resolution. Safe to call off the UI thread.
    pub fn paint(&self) -> anyhow::Result<RgbaImage> {
        self.page.render(self.device)
    }
}

/// Text extraction for a page whose paint finished at a still-current
/// generation. Carries the painted bitmap so pixels and text are installed
/// together.
pub struct TextLayerTicket {
    page_number: u32,
    generation: u64,
    layout: Viewport,
    page: Arc<dyn Page>,
    bitmap: RgbaImage,
}

impl TextLayerTicket {
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn extract(&self) -> anyhow::Result<Vec<TextSpan>> {
        self.page.text_content()
    }
}

pub enum PaintOutcome {
    /// Paint landed at the current generation; extract text next.
    TextLayer(TextLayerTicket),
    /// A scale change superseded the render.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    Discarded,
}

impl Viewer {
    /// Queues a render for `page_number` unless it is already rendered or in
    /// flight. The marker is taken before any work starts.
    pub(crate) fn request_render(&mut self, page_number: u32) -> bool {
        let scale = self.state.scale;
        let pixel_ratio = self.state.pixel_ratio;
        let generation = self.state.generation;
        let Some(slot) = self.layout.slot_mut(page_number) else {
            return false;
        };
        if slot.state.is_marked() {
            return false;
        }

        slot.state = RenderState::Pending { generation };
        let (layout, device) = geometry::render_viewports(slot.page().size(), scale, pixel_ratio);
        slot.canvas.size_for(layout, device);

        self.render_queue.push(RenderTicket {
            page_number,
            generation,
            layout,
            device,
            page: slot.page().clone(),
        });
        true
    }

    /// Explicit render trigger. Idempotent: returns false when the page is
    /// already rendered or in flight.
    pub fn render_page(&mut self, page_number: u32) -> ViewerResult<bool> {
        if self.layout.is_empty() {
            return Err(ViewerError::NoDocument);
        }
        if self.layout.slot(page_number).is_none() {
            return Err(ViewerError::PageOutOfRange {
                page: page_number,
                total: self.layout.page_count(),
            });
        }
        Ok(self.request_render(page_number))
    }

    /// Hands queued paint work to the host.
    pub fn take_render_tickets(&mut self) -> Vec<RenderTicket> {
        std::mem::take(&mut self.render_queue)
    }

    pub fn queued_render_count(&self) -> usize {
        self.render_queue.len()
    }

    /// Applies a finished paint. A paint error releases the page so a later
    /// visibility pass retries it, and is returned to the caller.
    pub fn complete_paint(
        &mut self,
        ticket: RenderTicket,
        result: anyhow::Result<RgbaImage>,
    ) -> ViewerResult<PaintOutcome> {
        if self.is_stale(ticket.page_number, ticket.generation) {
            self.release(ticket.page_number, ticket.generation);
            crate::debug_log!(
                "[render] page {} paint discarded (generation {} != {})",
                ticket.page_number,
                ticket.generation,
                self.state.generation
            );
            return Ok(PaintOutcome::Discarded);
        }

        match result {
            Ok(bitmap) => Ok(PaintOutcome::TextLayer(TextLayerTicket {
                page_number: ticket.page_number,
                generation: ticket.generation,
                layout: ticket.layout,
                page: ticket.page,
                bitmap,
            })),
            Err(err) => {
                self.release(ticket.page_number, ticket.generation);
                crate::warn_log!("[render] page {} paint failed: {:#}", ticket.page_number, err);
                Err(ViewerError::Paint {
                    page: ticket.page_number,
                    message: format!("{err:#}"),
                })
            }
        }
    }

    /// Installs pixels and text together and redraws the page's highlights.
    /// A text extraction error leaves an empty text layer; the page still
    /// counts as rendered.
    pub fn complete_text_layer(
        &mut self,
        ticket: TextLayerTicket,
        result: anyhow::Result<Vec<TextSpan>>,
    ) -> RenderOutcome {
        if self.is_stale(ticket.page_number, ticket.generation) {
            self.release(ticket.page_number, ticket.generation);
            crate::debug_log!(
                "[render] page {} text layer discarded (generation {})",
                ticket.page_number,
                ticket.generation
            );
            return RenderOutcome::Discarded;
        }

        let text_layer = match result {
            Ok(spans) => TextLayer::lay_out(&spans, ticket.layout),
            Err(err) => {
                crate::warn_log!(
                    "[render] page {} text layer failed: {:#}",
                    ticket.page_number,
                    err
                );
                TextLayer::empty(ticket.layout)
            }
        };

        let Some(slot) = self.layout.slot_mut(ticket.page_number) else {
            return RenderOutcome::Discarded;
        };
        let device = slot.canvas.device_viewport();
        slot.canvas.install(ticket.bitmap);
        slot.highlights.size_to(device);
        slot.text_layer = text_layer;
        slot.state = RenderState::Rendered {
            generation: ticket.generation,
        };

        self.redraw_page_highlights(ticket.page_number);
        crate::debug_log!(
            "[render] page {} rendered at generation {}",
            ticket.page_number,
            ticket.generation
        );
        RenderOutcome::Rendered
    }

    /// Paints and lays out one ticket on the calling thread.
    pub fn run_ticket(&mut self, ticket: RenderTicket) -> ViewerResult<RenderOutcome> {
        let painted = ticket.paint();
        match self.complete_paint(ticket, painted)? {
            PaintOutcome::TextLayer(text_ticket) => {
                let spans = text_ticket.extract();
                Ok(self.complete_text_layer(text_ticket, spans))
            }
            PaintOutcome::Discarded => Ok(RenderOutcome::Discarded),
        }
    }

    /// Drains and runs every queued ticket on the calling thread. Every
    /// ticket is attempted; the first paint error is returned afterwards.
    pub fn run_pending_renders(&mut self) -> ViewerResult<usize> {
        let mut rendered = 0;
        let mut first_error = None;
        loop {
            let tickets = self.take_render_tickets();
            if tickets.is_empty() {
                break;
            }
            for ticket in tickets {
                match self.run_ticket(ticket) {
                    Ok(RenderOutcome::Rendered) => rendered += 1,
                    Ok(RenderOutcome::Discarded) => {}
                    Err(err) => {
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(rendered),
        }
    }

    /// A ticket is stale once the generation moved on or its slot no longer
    /// holds the marker it took.
    fn is_stale(&self, page_number: u32, generation: u64) -> bool {
        if generation != self.state.generation {
            return true;
        }
        !matches!(
            self.layout.slot(page_number).map(|slot| slot.render_state()),
            Some(RenderState::Pending { generation: pending }) if pending == generation
        )
    }

    /// Clears the page's marker and content, but only while the marker is
    /// still the one taken under `generation`.
    fn release(&mut self, page_number: u32, generation: u64) {
        let Some(slot) = self.layout.slot_mut(page_number) else {
            return;
        };
        if slot.state == (RenderState::Pending { generation }) {
            slot.clear_content();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::ViewerConfig;
    use crate::viewer::testing::FakeDocument;
    use crate::viewer::types::{Annotation, Rect};

    fn loaded(document: &Arc<FakeDocument>) -> Viewer {
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.resize(1000.0, 800.0);
        viewer.open_document(document.clone()).unwrap();
        viewer
    }

    #[test]
    fn double_trigger_paints_once() {
        let document = Arc::new(FakeDocument::uniform(3, 500.0, 700.0));
        let mut viewer = loaded(&document);
        viewer.take_render_tickets();
        viewer.set_scale(1.5).unwrap();

        let queued = viewer.take_render_tickets();
        assert!(!queued.is_empty());
        assert!(!viewer.render_page(1).unwrap());
        assert!(viewer.take_render_tickets().is_empty());

        for ticket in queued {
            viewer.run_ticket(ticket).unwrap();
        }
        assert!(!viewer.render_page(1).unwrap());
        assert_eq!(document.paint_count(), 3);
    }

    #[test]
    fn scale_change_mid_paint_discards_result() {
        let document = Arc::new(FakeDocument::uniform(3, 500.0, 700.0));
        let mut viewer = loaded(&document);
        let ticket = viewer
            .take_render_tickets()
            .into_iter()
            .find(|ticket| ticket.page_number() == 1)
            .unwrap();
        let bitmap = ticket.paint();

        viewer.set_scale(2.0).unwrap();
        viewer.take_render_tickets();
        let outcome = viewer.complete_paint(ticket, bitmap).unwrap();
        assert!(matches!(outcome, PaintOutcome::Discarded));

        let slot = viewer.slot(1).unwrap();
        assert!(!slot.is_rendered());
        assert!(!slot.text_layer().is_laid_out());
        assert!(!slot.canvas().is_populated());
    }

    #[test]
    fn stale_completion_keeps_newer_marker() {
        let document = Arc::new(FakeDocument::uniform(1, 500.0, 700.0));
        let mut viewer = loaded(&document);
        let old = viewer.take_render_tickets().remove(0);

        viewer.set_scale(2.0).unwrap();
        let new = viewer.take_render_tickets().remove(0);
        assert_eq!(new.generation(), old.generation() + 1);

        let painted = old.paint();
        assert!(matches!(
            viewer.complete_paint(old, painted).unwrap(),
            PaintOutcome::Discarded
        ));
        assert_eq!(
            viewer.slot(1).unwrap().render_state(),
            RenderState::Pending {
                generation: new.generation()
            }
        );

        assert_eq!(viewer.run_ticket(new).unwrap(), RenderOutcome::Rendered);
        assert_eq!(
            viewer.slot(1).unwrap().canvas().bitmap().map(|b| b.dimensions()),
            Some((1000, 1400))
        );
    }

    #[test]
    fn stale_text_layer_is_dropped() {
        let document = Arc::new(FakeDocument::uniform(1, 500.0, 700.0));
        let mut viewer = loaded(&document);
        let ticket = viewer.take_render_tickets().remove(0);
        let painted = ticket.paint();
        let PaintOutcome::TextLayer(text_ticket) = viewer.complete_paint(ticket, painted).unwrap()
        else {
            panic!("expected text layer ticket");
        };

        viewer.zoom_in().unwrap();
        let spans = text_ticket.extract();
        assert_eq!(
            viewer.complete_text_layer(text_ticket, spans),
            RenderOutcome::Discarded
        );
        assert!(!viewer.slot(1).unwrap().text_layer().is_laid_out());
    }

    #[test]
    fn paint_failure_leaves_page_retryable() {
        let document = Arc::new(FakeDocument::uniform(2, 500.0, 700.0));
        document.fail_paints(true);
        let mut viewer = loaded(&document);

        let err = viewer.run_pending_renders().unwrap_err();
        assert!(matches!(err, ViewerError::Paint { .. }));
        assert_eq!(viewer.slot(1).unwrap().render_state(), RenderState::Unrendered);
        assert!(!viewer.slot(1).unwrap().highlights().is_sized());

        document.fail_paints(false);
        viewer.schedule();
        assert_eq!(viewer.run_pending_renders().unwrap(), 2);
        assert!(viewer.slot(1).unwrap().is_rendered());
    }

    #[test]
    fn text_failure_still_renders_page() {
        let document = Arc::new(FakeDocument::uniform(1, 500.0, 700.0).with_failing_text());
        let mut viewer = loaded(&document);
        viewer.run_pending_renders().unwrap();

        let slot = viewer.slot(1).unwrap();
        assert!(slot.is_rendered());
        assert!(slot.canvas().is_populated());
        assert!(slot.text_layer().is_laid_out());
        assert_eq!(slot.text_layer().glyph_count(), 0);
    }

    #[test]
    fn render_draws_pending_annotations() {
        let document = Arc::new(FakeDocument::uniform(1, 100.0, 100.0));
        let mut viewer = loaded(&document);
        viewer.set_annotations(vec![Annotation {
            id: 1,
            page_number: 1,
            category_name: "critical".to_string(),
            highlight_rects: vec![Rect::new(10.0, 10.0, 20.0, 5.0)],
            comment: String::new(),
            selected_text: String::new(),
        }]);
        assert!(viewer.slot(1).unwrap().highlights().surface().is_none());

        viewer.run_pending_renders().unwrap();
        let surface = viewer.slot(1).unwrap().highlights().surface().unwrap();
        assert_ne!(surface.get_pixel(15, 12).0[3], 0);
        assert_eq!(surface.get_pixel(5, 5).0[3], 0);
    }

    #[test]
    fn render_page_rejects_unknown_pages() {
        let mut viewer = Viewer::new(ViewerConfig::default());
        assert!(matches!(viewer.render_page(1), Err(ViewerError::NoDocument)));

        let document = Arc::new(FakeDocument::uniform(2, 100.0, 100.0));
        viewer.open_document(document).unwrap();
        assert!(matches!(
            viewer.render_page(3),
            Err(ViewerError::PageOutOfRange { page: 3, total: 2 })
        ));
    }
}
