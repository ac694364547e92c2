mod annotations;
mod library;
mod rendering;

use crate::{DisableLoggingMenu, EnableLoggingMenu, OpenLogsMenu, OpenPdfMenu, configure_app_menus};
use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::input::{InputEvent, InputState};
use gpui_component::{button::*, *};
use kreview::review::{
    AnnotationRecord, Category, PdfRecord, ReviewSettings, ReviewStore, SortBy,
};
use kreview::viewer::{
    AnnotationId, Point as ViewPoint, ScaleRequest, SelectionGeometry, Viewer, ViewerConfig,
    ViewerEvent,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TOOLBAR_HEIGHT: f32 = 44.0;
const SIDEBAR_WIDTH: f32 = 300.0;
const POPUP_WIDTH: f32 = 220.0;

/// Cached GPU images for one page, keyed by the source they were built from.
#[derive(Default)]
struct PageImages {
    bitmap: Option<(usize, Arc<RenderImage>)>,
    highlights: Option<(u64, Arc<RenderImage>)>,
}

pub struct ReviewViewer {
    focus_handle: FocusHandle,
    viewer: Viewer,
    store: Option<ReviewStore>,
    settings: ReviewSettings,
    categories: Vec<Category>,
    path: Option<PathBuf>,
    /// Library entry of the open document.
    pdf: Option<PdfRecord>,
    library: Vec<PdfRecord>,
    library_query: String,
    records: Vec<AnnotationRecord>,
    category_filter: HashSet<u32>,
    sort_by: SortBy,
    page_images: HashMap<u32, PageImages>,
    pending_selection: Option<SelectionGeometry>,
    active_annotation: Option<(AnnotationId, ViewPoint)>,
    status: Option<SharedString>,
    review_report: Option<SharedString>,
    review_inflight: bool,
    open_epoch: u64,
    flash_epoch: u64,
    last_window_size: Option<(f32, f32)>,
    selecting: bool,
    comment_input: Entity<InputState>,
    decision_input: Entity<InputState>,
    library_search_input: Entity<InputState>,
    /// Values to push into inputs on the next render, where a window is at
    /// hand.
    input_seeds: Vec<(Entity<InputState>, String)>,
    _subscriptions: Vec<Subscription>,
}

impl ReviewViewer {
    pub fn new(store: Option<ReviewStore>, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let settings = store
            .as_ref()
            .and_then(|store| match store.settings() {
                Ok(settings) => Some(settings),
                Err(err) => {
                    kreview::warn_log!("[app] failed to read settings: {:#}", err);
                    None
                }
            })
            .unwrap_or_default();
        let categories = store
            .as_ref()
            .and_then(|store| store.categories().ok())
            .unwrap_or_default();

        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.set_dual_page(settings.dual_page);

        let comment_input = cx.new(|cx| {
            InputState::new(window, cx)
                .multi_line(true)
                .rows(3)
                .placeholder("Comment")
        });
        let decision_input =
            cx.new(|cx| InputState::new(window, cx).placeholder("e.g. Accept with revisions"));
        let library_search_input =
            cx.new(|cx| InputState::new(window, cx).placeholder("Search library"));
        let library_search_subscription = cx.subscribe(
            &library_search_input,
            |this, input, event: &InputEvent, cx| {
                if !matches!(event, InputEvent::Change) {
                    return;
                }
                let query = input.read(cx).value().to_string();
                if this.library_query != query {
                    this.library_query = query;
                    this.refresh_library();
                    cx.notify();
                }
            },
        );

        let mut this = Self {
            focus_handle: cx.focus_handle(),
            viewer,
            store,
            settings,
            categories,
            path: None,
            pdf: None,
            library: Vec::new(),
            library_query: String::new(),
            records: Vec::new(),
            category_filter: HashSet::new(),
            sort_by: SortBy::default(),
            page_images: HashMap::new(),
            pending_selection: None,
            active_annotation: None,
            status: None,
            review_report: None,
            review_inflight: false,
            open_epoch: 0,
            flash_epoch: 0,
            last_window_size: None,
            selecting: false,
            comment_input,
            decision_input,
            library_search_input,
            input_seeds: Vec::new(),
            _subscriptions: vec![library_search_subscription],
        };
        this.refresh_library();
        this
    }

    fn pdf_id(&self) -> Option<u64> {
        self.pdf.as_ref().map(|pdf| pdf.id)
    }

    fn seed_input(&mut self, input: Entity<InputState>, value: String) {
        self.input_seeds.push((input, value));
    }

    fn apply_input_seeds(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        for (input, value) in std::mem::take(&mut self.input_seeds) {
            input.update(cx, |input, cx| input.set_value(value, window, cx));
        }
    }

    fn set_status(&mut self, message: impl Into<SharedString>, cx: &mut Context<Self>) {
        self.status = Some(message.into());
        cx.notify();
    }

    fn open_pdf_dialog(&mut self, cx: &mut Context<Self>) {
        let picker = cx.prompt_for_paths(PathPromptOptions {
            files: true,
            directories: false,
            multiple: false,
            prompt: Some("Open PDF".into()),
        });

        cx.spawn(async move |view, cx| {
            if let Ok(Ok(Some(paths))) = picker.await
                && let Some(path) = paths.into_iter().next()
            {
                let _ = view.update(cx, |this, cx| this.open_pdf_path(path, cx));
            }
        })
        .detach();
    }

    fn open_pdf_path(&mut self, path: PathBuf, cx: &mut Context<Self>) {
        self.open_epoch = self.open_epoch.wrapping_add(1);
        let epoch = self.open_epoch;
        self.set_status(format!("Opening {}", display_file_name(&path)), cx);

        cx.spawn(async move |view, cx| {
            let load_path = path.clone();
            let loaded = cx
                .background_executor()
                .spawn(async move { rendering::decode_document(&load_path) })
                .await;

            let _ = view.update(cx, |this, cx| {
                if this.open_epoch != epoch {
                    return;
                }
                match loaded {
                    Ok(document) => this.install_document(path, document, cx),
                    Err(err) => {
                        kreview::warn_log!("[app] open failed: {} | {:#}", path.display(), err);
                        this.set_status(format!("Cannot open {}: {err:#}", path.display()), cx);
                    }
                }
            });
        })
        .detach();
    }

    fn install_document(
        &mut self,
        path: PathBuf,
        document: Arc<dyn kreview::viewer::Document>,
        cx: &mut Context<Self>,
    ) {
        self.page_images.clear();
        self.pending_selection = None;
        self.active_annotation = None;
        self.review_report = None;

        match self.viewer.open_document(document) {
            Ok(page_count) => {
                kreview::debug_log!("[app] opened {} ({} pages)", path.display(), page_count);
                self.register_pdf(&path, page_count);
                self.path = Some(path);
                let scale = match self.settings.default_scale {
                    Some(scale) => ScaleRequest::Fixed(scale),
                    None => ScaleRequest::FitWidth,
                };
                if let Err(err) = self.viewer.set_scale(scale) {
                    kreview::warn_log!("[app] ignoring saved scale: {}", err);
                }
                self.reload_annotations(cx);
                self.status = None;
            }
            Err(err) => {
                self.path = None;
                self.pdf = None;
                self.records.clear();
                self.status = Some(format!("Cannot open {}: {err}", path.display()).into());
            }
        }
        self.after_viewer_change(cx);
    }

    fn zoom(&mut self, request: Option<ScaleRequest>, zoom_in: bool, cx: &mut Context<Self>) {
        let result = match request {
            Some(request) => self.viewer.set_scale(request),
            None if zoom_in => self.viewer.zoom_in(),
            None => self.viewer.zoom_out(),
        };
        if let Err(err) = result {
            kreview::debug_log!("[app] zoom rejected: {}", err);
        }
        self.page_images.clear();
        self.pending_selection = None;
        self.after_viewer_change(cx);
    }

    fn toggle_dual_page(&mut self, cx: &mut Context<Self>) {
        let enabled = !self.viewer.state().dual_page;
        self.viewer.set_dual_page(enabled);
        self.settings.dual_page = enabled;
        self.persist_settings();
        self.after_viewer_change(cx);
    }

    fn toggle_highlight_mode(&mut self, cx: &mut Context<Self>) {
        let enabled = !self.viewer.state().highlight_mode;
        self.viewer.set_highlight_mode(enabled);
        if !enabled {
            self.viewer.clear_selection();
            self.pending_selection = None;
        }
        self.active_annotation = None;
        cx.notify();
    }

    fn persist_settings(&self) {
        if let Some(store) = self.store.as_ref()
            && let Err(err) = store.save_settings(&self.settings)
        {
            kreview::warn_log!("[app] failed to save settings: {:#}", err);
        }
    }

    fn save_window_size(&self, width: f32, height: f32) {
        if let Some(store) = self.store.as_ref()
            && let Err(err) = store.save_window_size(width, height)
        {
            kreview::debug_log!("[app] failed to save window size: {:#}", err);
        }
    }

    /// Converts a window position into the document panel's coordinate space.
    fn panel_point(position: gpui::Point<Pixels>) -> ViewPoint {
        ViewPoint::new(
            f32::from(position.x),
            f32::from(position.y) - TOOLBAR_HEIGHT,
        )
    }

    fn on_panel_mouse_down(
        &mut self,
        event: &MouseDownEvent,
        context_menu: bool,
        cx: &mut Context<Self>,
    ) {
        let point = Self::panel_point(event.position);
        self.active_annotation = None;

        if context_menu {
            self.viewer.click(point, true);
        } else if self.viewer.state().highlight_mode {
            self.pending_selection = None;
            self.selecting = true;
            self.viewer.pointer_down(point);
        } else {
            self.viewer.click(point, false);
        }
        self.drain_viewer_events(cx);
        cx.notify();
    }

    fn on_panel_mouse_move(&mut self, event: &MouseMoveEvent, cx: &mut Context<Self>) {
        let point = Self::panel_point(event.position);
        if self.selecting && event.pressed_button == Some(MouseButton::Left) {
            self.viewer.pointer_drag(point);
            cx.notify();
            return;
        }

        let was_over = self.viewer.is_over_highlight();
        if self.viewer.hover(point) != was_over {
            cx.notify();
        }
    }

    fn on_panel_mouse_up(&mut self, event: &MouseUpEvent, cx: &mut Context<Self>) {
        if !self.selecting {
            return;
        }
        self.selecting = false;
        self.viewer.pointer_up(Self::panel_point(event.position));
        self.drain_viewer_events(cx);
        cx.notify();
    }

    fn on_panel_scroll(&mut self, event: &ScrollWheelEvent, window: &Window, cx: &mut Context<Self>) {
        let delta = event.delta.pixel_delta(window.line_height());
        let epoch = self.viewer.scroll_by(-f32::from(delta.y));
        self.active_annotation = None;
        self.schedule_settle(epoch, cx);
        cx.notify();
    }

    /// Applies queued viewer events to the view.
    fn drain_viewer_events(&mut self, cx: &mut Context<Self>) {
        for event in self.viewer.take_events() {
            match event {
                ViewerEvent::PageChanged(page) => {
                    kreview::debug_log!("[app] current page {}", page);
                }
                ViewerEvent::TextSelected(geometry) => {
                    if self.categories.is_empty() {
                        self.set_status("No categories available", cx);
                    } else {
                        self.pending_selection = Some(geometry);
                    }
                }
                ViewerEvent::HighlightClicked { annotation, .. } => {
                    let anchor = annotation
                        .highlight_rects
                        .first()
                        .and_then(|rect| {
                            let origin = self.viewer.viewport_origin(annotation.page_number)?;
                            let scale = self.viewer.scale();
                            Some(ViewPoint::new(
                                origin.x + rect.left * scale,
                                origin.y + rect.bottom() * scale,
                            ))
                        })
                        .unwrap_or_default();
                    self.open_annotation_popup(annotation.id, anchor);
                }
            }
        }
    }

    fn sync_window_metrics(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        // A move to another display can change the scale factor alone.
        let scale_factor = window.scale_factor();
        if scale_factor != self.viewer.state().pixel_ratio {
            match self.viewer.set_pixel_ratio(scale_factor) {
                Ok(()) => self.after_viewer_change(cx),
                Err(err) => kreview::debug_log!("[app] pixel ratio rejected: {}", err),
            }
        }

        let bounds = window.bounds();
        let current_size = (f32::from(bounds.size.width), f32::from(bounds.size.height));
        if self.last_window_size == Some(current_size) {
            return;
        }
        self.last_window_size = Some(current_size);
        if !window.is_maximized() && !window.is_fullscreen() {
            self.save_window_size(current_size.0, current_size.1);
        }

        let panel_width = (current_size.0 - SIDEBAR_WIDTH).max(0.0);
        let panel_height = (current_size.1 - TOOLBAR_HEIGHT).max(0.0);
        let epoch = self.viewer.resize(panel_width, panel_height);
        self.schedule_settle(epoch, cx);
    }

    fn render_toolbar(&self, cx: &mut Context<Self>) -> impl IntoElement {
        let state = self.viewer.state();
        let loaded = self.viewer.is_loaded();
        let page_label = if loaded {
            format!("{} / {}", state.current_page, self.viewer.page_count())
        } else {
            "-".to_string()
        };
        let zoom_label = format!("{:.0}%", state.scale * 100.0);
        let highlight_mode = state.highlight_mode;
        let dual_page = state.dual_page;

        div()
            .id("toolbar")
            .h(px(TOOLBAR_HEIGHT))
            .w_full()
            .px_2()
            .flex()
            .items_center()
            .justify_between()
            .border_b_1()
            .border_color(cx.theme().border)
            .child(
                div()
                    .flex()
                    .items_center()
                    .gap_2()
                    .child(
                        Button::new("library")
                            .ghost()
                            .small()
                            .label("Library")
                            .selected(!loaded)
                            .on_click(cx.listener(|this, _, _, cx| this.close_document(cx))),
                    )
                    .child(
                        Button::new("open-pdf")
                            .ghost()
                            .small()
                            .label("Open")
                            .on_click(cx.listener(|this, _, _, cx| this.open_pdf_dialog(cx))),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(cx.theme().muted_foreground)
                            .child(
                                self.path
                                    .as_deref()
                                    .map(display_file_name)
                                    .unwrap_or_else(|| "No document".to_string()),
                            ),
                    ),
            )
            .child(
                div()
                    .flex()
                    .items_center()
                    .gap_1()
                    .child(
                        div()
                            .min_w(px(60.))
                            .text_sm()
                            .text_color(cx.theme().muted_foreground)
                            .child(page_label),
                    )
                    .child(
                        Button::new("zoom-out")
                            .ghost()
                            .small()
                            .label("-")
                            .disabled(!loaded)
                            .on_click(cx.listener(|this, _, _, cx| this.zoom(None, false, cx))),
                    )
                    .child(
                        div()
                            .min_w(px(50.))
                            .text_sm()
                            .text_color(cx.theme().muted_foreground)
                            .child(zoom_label),
                    )
                    .child(
                        Button::new("zoom-in")
                            .ghost()
                            .small()
                            .label("+")
                            .disabled(!loaded)
                            .on_click(cx.listener(|this, _, _, cx| this.zoom(None, true, cx))),
                    )
                    .child(
                        Button::new("fit-width")
                            .ghost()
                            .small()
                            .label("Fit width")
                            .disabled(!loaded)
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.zoom(Some(ScaleRequest::FitWidth), false, cx)
                            })),
                    )
                    .child(
                        Button::new("dual-page")
                            .ghost()
                            .small()
                            .selected(dual_page)
                            .label("Two pages")
                            .on_click(cx.listener(|this, _, _, cx| this.toggle_dual_page(cx))),
                    )
                    .child(
                        Button::new("highlight-mode")
                            .ghost()
                            .small()
                            .selected(highlight_mode)
                            .label("Highlight")
                            .disabled(!loaded)
                            .on_click(cx.listener(|this, _, _, cx| this.toggle_highlight_mode(cx))),
                    ),
            )
    }

    fn render_document_panel(&self, cx: &mut Context<Self>) -> AnyElement {
        let state = self.viewer.state();
        let scroll_top = state.scroll_top;
        let visible_bottom = scroll_top + state.container_height;
        let highlight_mode = state.highlight_mode;
        let over_highlight = self.viewer.is_over_highlight();

        let pages = self
            .viewer
            .layout()
            .slots()
            .iter()
            .filter(|slot| slot.bounds().intersects_vertical(scroll_top, visible_bottom))
            .map(|slot| self.render_page(slot, scroll_top, cx))
            .collect::<Vec<_>>();

        let selection_rects = self
            .viewer
            .current_selection()
            .map(|selection| selection.client_rects)
            .unwrap_or_default();

        div()
            .id("document-panel")
            .relative()
            .flex_1()
            .h_full()
            .overflow_hidden()
            .bg(cx.theme().muted)
            .when(highlight_mode, |this| this.cursor(CursorStyle::IBeam))
            .when(!highlight_mode && over_highlight, |this| {
                this.cursor(CursorStyle::PointingHand)
            })
            .on_scroll_wheel(cx.listener(|this, event: &ScrollWheelEvent, window, cx| {
                this.on_panel_scroll(event, window, cx);
            }))
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, event: &MouseDownEvent, window, cx| {
                    window.focus(&this.focus_handle);
                    this.on_panel_mouse_down(event, false, cx);
                }),
            )
            .on_mouse_down(
                MouseButton::Right,
                cx.listener(|this, event: &MouseDownEvent, _, cx| {
                    this.on_panel_mouse_down(event, true, cx);
                }),
            )
            .on_mouse_move(cx.listener(|this, event: &MouseMoveEvent, _, cx| {
                this.on_panel_mouse_move(event, cx);
            }))
            .on_mouse_up(
                MouseButton::Left,
                cx.listener(|this, event: &MouseUpEvent, _, cx| {
                    this.on_panel_mouse_up(event, cx);
                }),
            )
            .children(pages)
            .children(selection_rects.into_iter().map(|rect| {
                div()
                    .absolute()
                    .left(px(rect.left))
                    .top(px(rect.top))
                    .w(px(rect.width))
                    .h(px(rect.height))
                    .bg(gpui::rgb(0x3390FF))
                    .opacity(0.3)
                    .into_any_element()
            }))
            .when(!self.viewer.is_loaded(), |this| this.child(self.render_library(cx)))
            .children(self.render_selection_popup(cx))
            .children(self.render_annotation_popup(cx))
            .into_any_element()
    }

    fn render_page(
        &self,
        slot: &kreview::viewer::PageSlot,
        scroll_top: f32,
        cx: &mut Context<Self>,
    ) -> AnyElement {
        let bounds = slot.bounds();
        let page_number = slot.page_number();
        let images = self.page_images.get(&page_number);
        let bitmap = images.and_then(|images| images.bitmap.as_ref().map(|(_, image)| image.clone()));
        let highlights = images.and_then(|images| {
            images
                .highlights
                .as_ref()
                .map(|(_, image)| image.clone())
        });

        div()
            .id(("page", page_number as usize))
            .absolute()
            .left(px(bounds.left))
            .top(px(bounds.top - scroll_top))
            .w(px(bounds.width))
            .h(px(bounds.height))
            .bg(gpui::white())
            .shadow_sm()
            .overflow_hidden()
            .when_some(bitmap, |this, bitmap| {
                this.child(img(bitmap).absolute().size_full().object_fit(ObjectFit::Fill))
            })
            .when_some(highlights, |this, highlights| {
                this.child(
                    img(highlights)
                        .absolute()
                        .size_full()
                        .object_fit(ObjectFit::Fill),
                )
            })
            .when(!slot.is_rendered(), |this| {
                this.child(
                    div()
                        .size_full()
                        .flex()
                        .items_center()
                        .justify_center()
                        .text_xs()
                        .text_color(cx.theme().muted_foreground)
                        .child(format!("Page {page_number}")),
                )
            })
            .into_any_element()
    }
}

impl Focusable for ReviewViewer {
    fn focus_handle(&self, _: &App) -> FocusHandle {
        self.focus_handle.clone()
    }
}

impl Render for ReviewViewer {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        window.set_rem_size(cx.theme().font_size);
        self.apply_input_seeds(window, cx);
        self.sync_window_metrics(window, cx);
        self.refresh_page_images();

        let toolbar = self.render_toolbar(cx);
        let document_panel = self.render_document_panel(cx);
        let sidebar = self.render_sidebar(cx);

        div()
            .size_full()
            .on_action(cx.listener(|this, _: &OpenPdfMenu, _, cx| {
                this.open_pdf_dialog(cx);
            }))
            .on_action(cx.listener(|_, _: &EnableLoggingMenu, _, cx| {
                if kreview::logger::enable_file_logging() {
                    configure_app_menus(cx);
                }
            }))
            .on_action(cx.listener(|_, _: &DisableLoggingMenu, _, cx| {
                kreview::logger::disable_file_logging();
                configure_app_menus(cx);
            }))
            .on_action(cx.listener(|_, _: &OpenLogsMenu, _, _| {
                open_logs_directory();
            }))
            .child(
                div()
                    .v_flex()
                    .size_full()
                    .bg(cx.theme().background)
                    .track_focus(&self.focus_handle)
                    .child(toolbar)
                    .child(
                        div()
                            .flex()
                            .flex_1()
                            .min_h(px(0.))
                            .child(document_panel)
                            .child(sidebar),
                    ),
            )
    }
}

pub(crate) fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn open_logs_directory() {
    let Some(log_file_path) = kreview::logger::log_file_path() else {
        kreview::debug_log!("[log] cannot open logs directory: unresolved log path");
        return;
    };
    let log_dir = log_file_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or(log_file_path);

    let status = {
        #[cfg(target_os = "macos")]
        {
            std::process::Command::new("open").arg(&log_dir).status()
        }
        #[cfg(target_os = "windows")]
        {
            std::process::Command::new("explorer").arg(&log_dir).status()
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            std::process::Command::new("xdg-open").arg(&log_dir).status()
        }
    };

    match status {
        Ok(exit_status) if exit_status.success() => {
            kreview::debug_log!("[log] opened logs directory: {}", log_dir.display());
        }
        Ok(exit_status) => {
            kreview::debug_log!(
                "[log] failed to open logs directory: {} | exit={}",
                log_dir.display(),
                exit_status
            );
        }
        Err(err) => {
            kreview::debug_log!(
                "[log] failed to open logs directory: {} | {}",
                log_dir.display(),
                err
            );
        }
    }
}
