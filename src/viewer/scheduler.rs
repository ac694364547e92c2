//! Which pages need pixels now: viewport intersection widened by a
//! look-ahead margin, re-run on load, settled scroll, zoom and layout changes.

use super::Viewer;
use super::layout::PageLayout;

/// Look-ahead in pixels, derived from the container's current height.
pub fn render_margin(container_height: f32, buffer_viewports: f32) -> f32 {
    container_height.max(0.0) * buffer_viewports
}

/// Pages whose containers overlap `[scroll_top - margin, scroll_top +
/// container_height + margin]`, in page order.
pub fn pages_near_viewport(
    layout: &PageLayout,
    scroll_top: f32,
    container_height: f32,
    margin: f32,
) -> Vec<u32> {
    let top = scroll_top - margin;
    let bottom = scroll_top + container_height + margin;
    layout
        .slots()
        .iter()
        .filter(|slot| slot.bounds().intersects_vertical(top, bottom))
        .map(|slot| slot.page_number())
        .collect()
}

/// Page whose center is closest to the center of the visible region.
pub fn closest_page(layout: &PageLayout, scroll_top: f32, container_height: f32) -> Option<u32> {
    let center = scroll_top + container_height / 2.0;
    let mut closest = None;
    let mut closest_distance = f32::INFINITY;
    for slot in layout.slots() {
        let distance = (slot.bounds().center().y - center).abs();
        if distance < closest_distance {
            closest_distance = distance;
            closest = Some(slot.page_number());
        }
    }
    closest
}

/// Epoch counter for trailing-edge debouncing. Every event bumps the epoch;
/// only the latest epoch is allowed to settle.
#[derive(Debug, Default, Clone, Copy)]
pub struct Debouncer {
    epoch: u64,
}

impl Debouncer {
    pub fn bump(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    pub fn current(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }
}

impl Viewer {
    /// Requests a render for every near-viewport page that is not already
    /// rendered or in flight.
    pub fn schedule(&mut self) {
        if self.layout.is_empty() {
            return;
        }

        let margin = render_margin(
            self.state.container_height,
            self.config.render_buffer_viewports,
        );
        let pages = pages_near_viewport(
            &self.layout,
            self.state.scroll_top,
            self.state.container_height,
            margin,
        );

        let mut requested = 0;
        for page_number in pages {
            if self.request_render(page_number) {
                requested += 1;
            }
        }
        if requested > 0 {
            crate::debug_log!(
                "[scheduler] scroll_top={:.1} margin={:.1} queued {} page(s)",
                self.state.scroll_top,
                margin,
                requested
            );
        }
    }

    pub(crate) fn update_current_page(&mut self) {
        let Some(page) = closest_page(
            &self.layout,
            self.state.scroll_top,
            self.state.container_height,
        ) else {
            return;
        };

        if page != self.state.current_page {
            self.state.current_page = page;
            self.events.push(super::types::ViewerEvent::PageChanged(page));
        }
    }

    /// Runs the deferred work of a scroll or resize once the host's debounce
    /// timer for `epoch` fires. Returns false for a superseded epoch.
    pub fn settle(&mut self, epoch: u64) -> bool {
        if !self.debounce.is_current(epoch) {
            return false;
        }
        self.update_current_page();
        self.schedule();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::config::ViewerConfig;
    use crate::viewer::testing::FakeDocument;

    fn layout(pages: u32) -> PageLayout {
        let document = FakeDocument::uniform(pages, 500.0, 700.0);
        PageLayout::build(&document, 1.0, false, 1000.0, &ViewerConfig::default()).unwrap()
    }

    #[test]
    fn margin_scales_with_container() {
        assert_eq!(render_margin(600.0, 2.0), 1200.0);
        assert_eq!(render_margin(-5.0, 2.0), 0.0);
    }

    #[test]
    fn near_viewport_includes_buffer() {
        let layout = layout(10);
        // Page n spans [24 + (n-1) * 716, 24 + (n-1) * 716 + 700].
        assert_eq!(pages_near_viewport(&layout, 0.0, 600.0, 0.0), vec![1]);
        assert_eq!(pages_near_viewport(&layout, 0.0, 600.0, 1200.0), vec![1, 2, 3]);
        assert_eq!(
            pages_near_viewport(&layout, 3000.0, 600.0, 1200.0),
            vec![3, 4, 5, 6, 7]
        );
    }

    #[test]
    fn closest_page_follows_viewport_center() {
        let layout = layout(3);
        assert_eq!(closest_page(&layout, 0.0, 600.0), Some(1));
        assert_eq!(closest_page(&layout, 800.0, 600.0), Some(2));
        assert_eq!(closest_page(&layout, 10_000.0, 600.0), Some(3));
        assert_eq!(closest_page(&PageLayout::default(), 0.0, 600.0), None);
    }

    #[test]
    fn debouncer_only_settles_latest_epoch() {
        let mut debouncer = Debouncer::default();
        let first = debouncer.bump();
        let second = debouncer.bump();
        assert!(!debouncer.is_current(first));
        assert!(debouncer.is_current(second));
    }
}
