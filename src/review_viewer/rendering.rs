use super::{PageImages, ReviewViewer};
use anyhow::{Context as _, Result};
use gpui::*;
use image::{Frame as RasterFrame, RgbaImage};
use kreview::pdfium::PdfiumLoader;
use kreview::viewer::{
    AnnotationId, Document, DocumentLoader, FlashStep, PaintOutcome, RenderOutcome, RenderTicket,
};
use std::path::Path;
use std::sync::Arc;

/// Reads and decodes a PDF. Runs on the background executor.
pub(super) fn decode_document(path: &Path) -> Result<Arc<dyn Document>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read failed: {}", path.display()))?;
    Ok(PdfiumLoader.load(&bytes)?)
}

/// Converts an RGBA buffer into a GPU image. gpui expects BGRA.
fn to_render_image(rgba: &RgbaImage) -> Option<Arc<RenderImage>> {
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let mut bytes = rgba.as_raw().clone();
    for pixel in bytes.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
    let buffer = RgbaImage::from_raw(width, height, bytes)?;
    Some(Arc::new(RenderImage::new([RasterFrame::new(buffer)])))
}

impl ReviewViewer {
    /// Hands queued render tickets to the background executor and applies
    /// the queued viewer events.
    pub(super) fn after_viewer_change(&mut self, cx: &mut Context<Self>) {
        for ticket in self.viewer.take_render_tickets() {
            self.spawn_render(ticket, cx);
        }
        self.drain_viewer_events(cx);
        cx.notify();
    }

    fn spawn_render(&mut self, ticket: RenderTicket, cx: &mut Context<Self>) {
        cx.spawn(async move |view, cx| {
            let paint_ticket = ticket.clone();
            let painted = cx
                .background_executor()
                .spawn(async move { paint_ticket.paint() })
                .await;

            let Ok(outcome) = view.update(cx, |this, _| this.viewer.complete_paint(ticket, painted))
            else {
                return;
            };
            let text_ticket = match outcome {
                Ok(PaintOutcome::TextLayer(text_ticket)) => text_ticket,
                Ok(PaintOutcome::Discarded) => return,
                Err(err) => {
                    kreview::debug_log!("[app] {}", err);
                    return;
                }
            };

            let (text_ticket, spans) = cx
                .background_executor()
                .spawn(async move {
                    let spans = text_ticket.extract();
                    (text_ticket, spans)
                })
                .await;

            let _ = view.update(cx, |this, cx| {
                if this.viewer.complete_text_layer(text_ticket, spans) == RenderOutcome::Rendered {
                    cx.notify();
                }
            });
        })
        .detach();
    }

    /// Waits out the scroll debounce, then runs the deferred visibility pass
    /// if no newer scroll or resize arrived meanwhile.
    pub(super) fn schedule_settle(&mut self, epoch: u64, cx: &mut Context<Self>) {
        let delay = self.viewer.config().scroll_debounce;
        cx.spawn(async move |view, cx| {
            cx.background_executor().timer(delay).await;
            let _ = view.update(cx, |this, cx| {
                if this.viewer.settle(epoch) {
                    this.after_viewer_change(cx);
                }
            });
        })
        .detach();
    }

    /// Rebuilds GPU images whose source bitmap or highlight surface changed,
    /// and drops images of pages that lost their content.
    pub(super) fn refresh_page_images(&mut self) {
        let mut live = Vec::new();
        for slot in self.viewer.layout().slots() {
            let page_number = slot.page_number();
            let bitmap = slot.canvas().bitmap();
            let highlights = slot.highlights();
            if bitmap.is_none() && highlights.surface().is_none() {
                continue;
            }
            live.push(page_number);

            let images = self.page_images.entry(page_number).or_insert_with(PageImages::default);
            match bitmap {
                Some(bitmap) => {
                    let key = Arc::as_ptr(bitmap) as usize;
                    if images.bitmap.as_ref().map(|(cached, _)| *cached) != Some(key) {
                        images.bitmap = to_render_image(bitmap).map(|image| (key, image));
                    }
                }
                None => images.bitmap = None,
            }

            let revision = highlights.revision();
            match highlights.surface() {
                Some(surface) if slot.is_rendered() => {
                    if images.highlights.as_ref().map(|(cached, _)| *cached) != Some(revision) {
                        images.highlights = to_render_image(surface).map(|image| (revision, image));
                    }
                }
                _ => images.highlights = None,
            }
        }
        self.page_images.retain(|page_number, _| live.contains(page_number));
    }

    /// Scrolls to an annotation and flashes it. A newer flash cancels an
    /// older one.
    pub(super) fn locate_annotation(&mut self, id: AnnotationId, cx: &mut Context<Self>) {
        let Some(mut animation) = self.viewer.highlight_annotation(id) else {
            kreview::debug_log!("[app] annotation {} not loaded in viewer", id);
            return;
        };
        self.active_annotation = None;
        self.flash_epoch = self.flash_epoch.wrapping_add(1);
        let epoch = self.flash_epoch;
        self.after_viewer_change(cx);

        cx.spawn(async move |view, cx| {
            loop {
                let step = view.update(cx, |this, cx| {
                    if this.flash_epoch != epoch {
                        this.viewer.redraw_page_highlights(animation.page_number());
                        return FlashStep::Done;
                    }
                    let step = animation.step(&mut this.viewer);
                    cx.notify();
                    step
                });
                match step {
                    Ok(FlashStep::Waiting(delay)) | Ok(FlashStep::Next(delay)) => {
                        cx.background_executor().timer(delay).await;
                    }
                    _ => break,
                }
            }
        })
        .detach();
    }
}
