use super::{ReviewViewer, display_file_name};
use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{button::*, input::Input, *};
use kreview::review::PdfRecord;
use std::path::PathBuf;

impl ReviewViewer {
    /// Re-reads the library list for the current search query.
    pub(super) fn refresh_library(&mut self) {
        let Some(store) = self.store.as_ref() else {
            self.library.clear();
            return;
        };
        let listed = if self.library_query.trim().is_empty() {
            store.pdfs()
        } else {
            store.search_pdfs(&self.library_query)
        };
        match listed {
            Ok(records) => self.library = records,
            Err(err) => kreview::warn_log!("[app] failed to list library: {:#}", err),
        }
    }

    /// Adds the freshly opened file to the library and remembers its entry.
    pub(super) fn register_pdf(&mut self, path: &std::path::Path, page_count: u32) {
        let Some(store) = self.store.as_ref() else {
            self.pdf = None;
            return;
        };
        match store.add_pdf(&path.to_string_lossy(), &display_file_name(path), page_count) {
            Ok(record) => {
                self.seed_input(
                    self.decision_input.clone(),
                    record.review_decision.clone().unwrap_or_default(),
                );
                self.pdf = Some(record);
            }
            Err(err) => {
                kreview::warn_log!("[app] failed to register {}: {:#}", path.display(), err);
                self.pdf = None;
            }
        }
    }

    /// Closes the open document and returns to the library.
    pub(super) fn close_document(&mut self, cx: &mut Context<Self>) {
        self.open_epoch = self.open_epoch.wrapping_add(1);
        self.flash_epoch = self.flash_epoch.wrapping_add(1);
        self.viewer.unload();
        self.path = None;
        self.pdf = None;
        self.records.clear();
        self.page_images.clear();
        self.pending_selection = None;
        self.active_annotation = None;
        self.review_report = None;
        self.status = None;
        self.refresh_library();
        cx.notify();
    }

    fn open_library_entry(&mut self, record: &PdfRecord, cx: &mut Context<Self>) {
        self.open_pdf_path(PathBuf::from(&record.path), cx);
    }

    /// Marks the open document reviewed with the decision typed in the
    /// sidebar, or reopens it when it is already complete.
    pub(super) fn toggle_completed(&mut self, cx: &mut Context<Self>) {
        let (Some(store), Some(pdf)) = (self.store.as_ref(), self.pdf.as_ref()) else {
            return;
        };
        let result = if pdf.completed {
            store.mark_pdf_incomplete(pdf.id)
        } else {
            let decision = self.decision_input.read(cx).value().to_string();
            store.mark_pdf_completed(pdf.id, Some(decision))
        };
        match result {
            Ok(record) => {
                kreview::debug_log!(
                    "[app] pdf {} completed={} decision={:?}",
                    record.id,
                    record.completed,
                    record.review_decision
                );
                self.pdf = Some(record);
            }
            Err(err) => {
                kreview::warn_log!("[app] failed to update review status: {:#}", err);
                self.set_status("Cannot update review status", cx);
            }
        }
        cx.notify();
    }

    fn remove_from_library(&mut self, id: u64, delete_annotations: bool, cx: &mut Context<Self>) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(err) = store.delete_pdf(id, delete_annotations) {
            kreview::warn_log!("[app] failed to remove pdf {}: {:#}", id, err);
            self.set_status("Cannot remove from library", cx);
        }
        self.refresh_library();
        cx.notify();
    }

    pub(super) fn render_library(&self, cx: &mut Context<Self>) -> AnyElement {
        let hover_bg = cx.theme().secondary;

        div()
            .id("library")
            .size_full()
            .p_4()
            .v_flex()
            .gap_2()
            .child(
                div()
                    .flex()
                    .items_center()
                    .gap_2()
                    .child(div().text_lg().child("Library"))
                    .child(div().flex_1().child(Input::new(&self.library_search_input))),
            )
            .when(self.store.is_none(), |this| {
                this.child(
                    div()
                        .text_sm()
                        .text_color(cx.theme().muted_foreground)
                        .child("The review database is unavailable"),
                )
            })
            .when(self.store.is_some() && self.library.is_empty(), |this| {
                this.child(
                    div()
                        .text_sm()
                        .text_color(cx.theme().muted_foreground)
                        .child("Open a PDF to start reviewing"),
                )
            })
            .child(
                div()
                    .id("library-list")
                    .flex_1()
                    .min_h(px(0.))
                    .overflow_y_scroll()
                    .v_flex()
                    .gap_1()
                    .children(self.library.iter().map(|record| {
                        let id = record.id;
                        let entry = record.clone();
                        let status = match (record.completed, record.review_decision.as_deref()) {
                            (true, Some(decision)) => format!("Done: {decision}"),
                            (true, None) => "Done".to_string(),
                            (false, _) => "In review".to_string(),
                        };

                        div()
                            .id(("pdf", id as usize))
                            .p_2()
                            .flex()
                            .items_center()
                            .justify_between()
                            .rounded_md()
                            .border_1()
                            .border_color(cx.theme().border)
                            .bg(cx.theme().background)
                            .cursor_pointer()
                            .hover(move |this| this.bg(hover_bg))
                            .on_click(cx.listener(move |this, _, _, cx| {
                                this.open_library_entry(&entry, cx);
                            }))
                            .child(
                                div()
                                    .v_flex()
                                    .child(div().text_sm().child(record.name.clone()))
                                    .child(
                                        div()
                                            .text_xs()
                                            .text_color(cx.theme().muted_foreground)
                                            .child(format!(
                                                "{} pages, {} annotations, {}",
                                                record.page_count, record.annotation_count, status
                                            )),
                                    ),
                            )
                            .child(
                                div()
                                    .flex()
                                    .gap_1()
                                    .child(
                                        Button::new(("pdf-remove", id as usize))
                                            .ghost()
                                            .xsmall()
                                            .label("Remove")
                                            .on_click(cx.listener(move |this, _, _, cx| {
                                                cx.stop_propagation();
                                                this.remove_from_library(id, false, cx);
                                            })),
                                    )
                                    .child(
                                        Button::new(("pdf-delete", id as usize))
                                            .ghost()
                                            .xsmall()
                                            .label("Delete")
                                            .on_click(cx.listener(move |this, _, _, cx| {
                                                cx.stop_propagation();
                                                this.remove_from_library(id, true, cx);
                                            })),
                                    ),
                            )
                    })),
            )
            .into_any_element()
    }

    /// Review decision and completion toggle for the open document.
    pub(super) fn render_completion(&self, cx: &mut Context<Self>) -> Option<AnyElement> {
        let pdf = self.pdf.as_ref()?;
        let label = if pdf.completed { "Reopen" } else { "Mark complete" };

        Some(
            div()
                .p_2()
                .v_flex()
                .gap_1()
                .border_t_1()
                .border_color(cx.theme().border)
                .child(
                    div()
                        .text_xs()
                        .text_color(cx.theme().muted_foreground)
                        .child(match pdf.completed_at {
                            Some(at) => format!("Completed {}", at.format("%Y-%m-%d %H:%M")),
                            None => "Review decision".to_string(),
                        }),
                )
                .child(Input::new(&self.decision_input))
                .child(
                    Button::new("toggle-completed")
                        .small()
                        .label(label)
                        .on_click(cx.listener(|this, _, _, cx| this.toggle_completed(cx))),
                )
                .into_any_element(),
        )
    }
}
