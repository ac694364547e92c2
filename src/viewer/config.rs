use std::time::Duration;

pub const RENDER_BUFFER_VIEWPORTS: f32 = 2.0;
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(100);
pub const PAGE_PADDING: f32 = 24.0;
pub const PAGE_GAP: f32 = 16.0;
pub const ZOOM_STEP: f32 = 1.25;
pub const ZOOM_MIN: f32 = 0.25;
pub const ZOOM_MAX: f32 = 3.0;
pub const FLASH_COUNT: u32 = 4;
pub const FLASH_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Pages within this many container heights above or below the visible
    /// region are rendered ahead of time.
    pub render_buffer_viewports: f32,
    pub scroll_debounce: Duration,
    /// Space around the page column, on every side.
    pub page_padding: f32,
    /// Space between rows, and between the two pages of a spread.
    pub page_gap: f32,
    pub zoom_step: f32,
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub flash_count: u32,
    pub flash_interval: Duration,
    pub initial_scale: f32,
    pub pixel_ratio: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            render_buffer_viewports: RENDER_BUFFER_VIEWPORTS,
            scroll_debounce: SCROLL_DEBOUNCE,
            page_padding: PAGE_PADDING,
            page_gap: PAGE_GAP,
            zoom_step: ZOOM_STEP,
            zoom_min: ZOOM_MIN,
            zoom_max: ZOOM_MAX,
            flash_count: FLASH_COUNT,
            flash_interval: FLASH_INTERVAL,
            initial_scale: 1.0,
            pixel_ratio: 1.0,
        }
    }
}
