use super::{POPUP_WIDTH, ReviewViewer, SIDEBAR_WIDTH, display_file_name};
use anyhow::{Context as _, Result, anyhow};
use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{button::*, input::Input, *};
use kreview::review::{
    AnnotationRecord, AnnotationUpdate, NewAnnotation, SortBy, create_provider, export_csv,
    export_json, filter_and_sort,
};
use kreview::viewer::{AnnotationId, Point as ViewPoint};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy)]
enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Json => "review.json",
            Self::Csv => "review.csv",
        }
    }
}

fn parse_hex_color(color: &str) -> Hsla {
    u32::from_str_radix(color.trim_start_matches('#'), 16)
        .map(|value| gpui::rgb(value).into())
        .unwrap_or_else(|_| gpui::rgb(0x888888).into())
}

impl ReviewViewer {
    /// Reloads the open document's annotations from the store and hands them
    /// to the viewer.
    pub(super) fn reload_annotations(&mut self, cx: &mut Context<Self>) {
        let (Some(store), Some(pdf_id)) = (self.store.as_ref(), self.pdf_id()) else {
            self.records.clear();
            self.viewer.set_annotations(Vec::new());
            return;
        };

        match store.annotations_for_pdf(pdf_id) {
            Ok(records) => {
                self.viewer
                    .set_annotations(records.iter().map(AnnotationRecord::to_viewer).collect());
                self.records = records;
            }
            Err(err) => {
                kreview::warn_log!("[app] failed to load annotations: {:#}", err);
                self.set_status("Cannot load annotations", cx);
            }
        }
        cx.notify();
    }

    fn create_from_selection(&mut self, category_id: u32, cx: &mut Context<Self>) {
        let Some(geometry) = self.pending_selection.take() else {
            return;
        };
        self.viewer.clear_selection();
        let (Some(store), Some(pdf_id)) = (self.store.as_ref(), self.pdf_id()) else {
            self.set_status("Annotations are unavailable without a database", cx);
            return;
        };

        let pointer = geometry.pointer;
        let created = store.create_annotation(NewAnnotation {
            pdf_id,
            category_id,
            page_number: geometry.page_number,
            selected_text: geometry.selected_text,
            comment: String::new(),
            highlight_rects: geometry.rects,
        });
        match created {
            Ok(record) => {
                kreview::debug_log!(
                    "[app] created annotation {} on page {}",
                    record.id,
                    record.page_number
                );
                self.reload_annotations(cx);
                self.open_annotation_popup(record.id, pointer);
            }
            Err(err) => {
                kreview::warn_log!("[app] create annotation failed: {:#}", err);
                self.set_status(format!("Cannot save annotation: {err:#}"), cx);
            }
        }
    }

    /// Shows the edit popup for `id` below `anchor`, with the comment field
    /// holding the stored comment.
    pub(super) fn open_annotation_popup(&mut self, id: AnnotationId, anchor: ViewPoint) {
        let comment = self
            .records
            .iter()
            .find(|record| record.id == id)
            .map(|record| record.comment.clone())
            .unwrap_or_default();
        self.seed_input(self.comment_input.clone(), comment);
        self.active_annotation = Some((id, anchor));
    }

    fn update_annotation(
        &mut self,
        id: AnnotationId,
        update: AnnotationUpdate,
        cx: &mut Context<Self>,
    ) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        match store.update_annotation(id, update) {
            Ok(record) => {
                kreview::debug_log!("[app] updated annotation {}", record.id);
                self.reload_annotations(cx);
            }
            Err(err) => {
                kreview::warn_log!("[app] update annotation failed: {:#}", err);
                self.set_status(format!("Cannot update annotation: {err:#}"), cx);
            }
        }
    }

    fn save_comment(&mut self, id: AnnotationId, cx: &mut Context<Self>) {
        let comment = self.comment_input.read(cx).value().trim().to_string();
        self.update_annotation(
            id,
            AnnotationUpdate {
                comment: Some(comment),
                ..AnnotationUpdate::default()
            },
            cx,
        );
        self.active_annotation = None;
    }

    fn change_category(&mut self, id: AnnotationId, category_id: u32, cx: &mut Context<Self>) {
        self.update_annotation(
            id,
            AnnotationUpdate {
                category_id: Some(category_id),
                ..AnnotationUpdate::default()
            },
            cx,
        );
    }

    fn delete_annotation(&mut self, id: AnnotationId, cx: &mut Context<Self>) {
        self.active_annotation = None;
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(err) = store.delete_annotation(id) {
            kreview::warn_log!("[app] delete annotation failed: {:#}", err);
            self.set_status("Cannot delete annotation", cx);
            return;
        }
        self.reload_annotations(cx);
    }

    fn toggle_category_filter(&mut self, category_id: u32, cx: &mut Context<Self>) {
        if !self.category_filter.remove(&category_id) {
            self.category_filter.insert(category_id);
        }
        cx.notify();
    }

    fn cycle_sort(&mut self, cx: &mut Context<Self>) {
        self.sort_by = match self.sort_by {
            SortBy::Page => SortBy::Date,
            SortBy::Date => SortBy::Category,
            SortBy::Category => SortBy::Page,
        };
        cx.notify();
    }

    fn export_target(&self, format: ExportFormat) -> Option<PathBuf> {
        let path = self.path.as_ref()?;
        Some(path.with_extension(format.extension()))
    }

    fn write_export(&self, format: ExportFormat) -> Result<PathBuf> {
        let target = self
            .export_target(format)
            .ok_or_else(|| anyhow!("no document open"))?;
        let document = self
            .path
            .as_deref()
            .map(display_file_name)
            .unwrap_or_default();
        let records = filter_and_sort(
            &self.records,
            &self.categories,
            &self.category_filter,
            self.sort_by,
        );

        let contents = match format {
            ExportFormat::Json => export_json(&document, &records, chrono::Utc::now())?,
            ExportFormat::Csv => export_csv(&records)?,
        };
        std::fs::write(&target, contents)
            .with_context(|| format!("write failed: {}", target.display()))?;
        Ok(target)
    }

    fn export(&mut self, format: ExportFormat, cx: &mut Context<Self>) {
        match self.write_export(format) {
            Ok(target) => {
                kreview::debug_log!("[app] exported review to {}", target.display());
                self.set_status(format!("Exported to {}", target.display()), cx);
            }
            Err(err) => {
                kreview::warn_log!("[app] export failed: {:#}", err);
                self.set_status(format!("Export failed: {err:#}"), cx);
            }
        }
    }

    fn generate_review(&mut self, cx: &mut Context<Self>) {
        if self.review_inflight {
            return;
        }
        let provider = match create_provider(&self.settings) {
            Ok(provider) => provider,
            Err(err) => {
                self.set_status(format!("Review unavailable: {err:#}"), cx);
                return;
            }
        };
        let records = filter_and_sort(
            &self.records,
            &self.categories,
            &self.category_filter,
            SortBy::Category,
        );
        let title = self
            .path
            .as_deref()
            .map(display_file_name)
            .unwrap_or_default();

        self.review_inflight = true;
        self.set_status("Generating review...", cx);
        cx.spawn(async move |view, cx| {
            let result = cx
                .background_executor()
                .spawn(async move { provider.generate_review(&records, &title) })
                .await;

            let _ = view.update(cx, |this, cx| {
                this.review_inflight = false;
                match result {
                    Ok(report) => {
                        this.review_report = Some(report.into());
                        this.status = None;
                    }
                    Err(err) => {
                        kreview::warn_log!("[app] review generation failed: {:#}", err);
                        this.status = Some(format!("Review failed: {err:#}").into());
                    }
                }
                cx.notify();
            });
        })
        .detach();
    }

    pub(super) fn render_selection_popup(&self, cx: &mut Context<Self>) -> Option<AnyElement> {
        let geometry = self.pending_selection.as_ref()?;
        let pointer = geometry.pointer;

        Some(
            div()
                .id("selection-popup")
                .absolute()
                .left(px(pointer.x))
                .top(px(pointer.y + 8.0))
                .w(px(POPUP_WIDTH))
                .p_2()
                .v_flex()
                .gap_1()
                .rounded_md()
                .border_1()
                .border_color(cx.theme().border)
                .bg(cx.theme().popover)
                .shadow_md()
                .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                .child(
                    div()
                        .text_xs()
                        .text_color(cx.theme().muted_foreground)
                        .child(format!("Page {}", geometry.page_number)),
                )
                .children(self.categories.iter().map(|category| {
                    let category_id = category.id;
                    Button::new(("category", category_id as usize))
                        .ghost()
                        .small()
                        .label(category.name.clone())
                        .text_color(parse_hex_color(&category.color))
                        .on_click(cx.listener(move |this, _, _, cx| {
                            this.create_from_selection(category_id, cx);
                        }))
                }))
                .child(
                    Button::new("selection-cancel")
                        .ghost()
                        .small()
                        .label("Cancel")
                        .on_click(cx.listener(|this, _, _, cx| {
                            this.pending_selection = None;
                            this.viewer.clear_selection();
                            cx.notify();
                        })),
                )
                .into_any_element(),
        )
    }

    pub(super) fn render_annotation_popup(&self, cx: &mut Context<Self>) -> Option<AnyElement> {
        let (id, anchor) = self.active_annotation?;
        let record = self.records.iter().find(|record| record.id == id)?;
        let current_category = record.category_id;

        Some(
            div()
                .id("annotation-popup")
                .absolute()
                .left(px(anchor.x))
                .top(px(anchor.y + 4.0))
                .w(px(POPUP_WIDTH))
                .p_2()
                .v_flex()
                .gap_1()
                .rounded_md()
                .border_1()
                .border_color(cx.theme().border)
                .bg(cx.theme().popover)
                .shadow_md()
                .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                .child(
                    div()
                        .text_xs()
                        .text_color(cx.theme().muted_foreground)
                        .child(format!("\"{}\"", record.selected_text)),
                )
                .child(
                    div()
                        .flex()
                        .flex_wrap()
                        .gap_1()
                        .children(self.categories.iter().map(|category| {
                            let category_id = category.id;
                            Button::new(("annotation-category", category_id as usize))
                                .ghost()
                                .xsmall()
                                .selected(category_id == current_category)
                                .label(category.name.clone())
                                .text_color(parse_hex_color(&category.color))
                                .on_click(cx.listener(move |this, _, _, cx| {
                                    this.change_category(id, category_id, cx);
                                }))
                        })),
                )
                .child(Input::new(&self.comment_input))
                .child(
                    div()
                        .flex()
                        .justify_between()
                        .child(
                            Button::new("annotation-delete")
                                .ghost()
                                .small()
                                .label("Delete")
                                .on_click(cx.listener(move |this, _, _, cx| {
                                    this.delete_annotation(id, cx);
                                })),
                        )
                        .child(
                            div()
                                .flex()
                                .gap_1()
                                .child(
                                    Button::new("annotation-close")
                                        .ghost()
                                        .small()
                                        .label("Close")
                                        .on_click(cx.listener(|this, _, _, cx| {
                                            this.active_annotation = None;
                                            cx.notify();
                                        })),
                                )
                                .child(
                                    Button::new("annotation-save")
                                        .small()
                                        .label("Save")
                                        .on_click(cx.listener(move |this, _, _, cx| {
                                            this.save_comment(id, cx);
                                        })),
                                ),
                        ),
                )
                .into_any_element(),
        )
    }

    pub(super) fn render_sidebar(&self, cx: &mut Context<Self>) -> impl IntoElement {
        let loaded = self.viewer.is_loaded();
        let counts = match (self.store.as_ref(), self.pdf_id()) {
            (Some(store), Some(pdf_id)) => store.category_counts(pdf_id).unwrap_or_default(),
            _ => Vec::new(),
        };
        let completion = self.render_completion(cx);
        let records = filter_and_sort(
            &self.records,
            &self.categories,
            &self.category_filter,
            self.sort_by,
        );
        let sort_label = match self.sort_by {
            SortBy::Page => "Sort: page",
            SortBy::Date => "Sort: newest",
            SortBy::Category => "Sort: category",
        };
        let hover_bg = cx.theme().secondary;

        div()
            .id("review-sidebar")
            .w(px(SIDEBAR_WIDTH))
            .h_full()
            .v_flex()
            .border_l_1()
            .border_color(cx.theme().border)
            .child(
                div()
                    .p_2()
                    .flex()
                    .flex_wrap()
                    .gap_1()
                    .children(counts.into_iter().map(|(category, count)| {
                        let category_id = category.id;
                        Button::new(("filter", category_id as usize))
                            .ghost()
                            .xsmall()
                            .selected(self.category_filter.contains(&category_id))
                            .label(format!("{} {}", category.name, count))
                            .text_color(parse_hex_color(&category.color))
                            .on_click(cx.listener(move |this, _, _, cx| {
                                this.toggle_category_filter(category_id, cx);
                            }))
                    })),
            )
            .child(
                div()
                    .px_2()
                    .flex()
                    .items_center()
                    .gap_1()
                    .child(
                        Button::new("sort")
                            .ghost()
                            .xsmall()
                            .label(sort_label)
                            .on_click(cx.listener(|this, _, _, cx| this.cycle_sort(cx))),
                    )
                    .child(
                        Button::new("export-json")
                            .ghost()
                            .xsmall()
                            .label("JSON")
                            .disabled(!loaded)
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.export(ExportFormat::Json, cx)
                            })),
                    )
                    .child(
                        Button::new("export-csv")
                            .ghost()
                            .xsmall()
                            .label("CSV")
                            .disabled(!loaded)
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.export(ExportFormat::Csv, cx)
                            })),
                    )
                    .child(
                        Button::new("generate-review")
                            .ghost()
                            .xsmall()
                            .label("Review")
                            .loading(self.review_inflight)
                            .disabled(!loaded || self.records.is_empty())
                            .on_click(cx.listener(|this, _, _, cx| this.generate_review(cx))),
                    ),
            )
            .when_some(self.status.clone(), |this, status| {
                this.child(
                    div()
                        .px_2()
                        .text_xs()
                        .text_color(cx.theme().muted_foreground)
                        .child(status),
                )
            })
            .child(
                div()
                    .id("annotation-list")
                    .flex_1()
                    .min_h(px(0.))
                    .overflow_y_scroll()
                    .p_2()
                    .v_flex()
                    .gap_1()
                    .children(records.into_iter().map(|record| {
                        let id = record.id;
                        div()
                            .id(("annotation", id as usize))
                            .p_2()
                            .rounded_md()
                            .cursor_pointer()
                            .hover(move |this| this.bg(hover_bg))
                            .on_click(cx.listener(move |this, _, _, cx| {
                                this.locate_annotation(id, cx);
                            }))
                            .child(
                                div()
                                    .flex()
                                    .justify_between()
                                    .text_xs()
                                    .child(record.category_name.clone())
                                    .child(format!("p. {}", record.page_number)),
                            )
                            .child(
                                div()
                                    .text_xs()
                                    .text_color(cx.theme().muted_foreground)
                                    .child(record.selected_text.clone()),
                            )
                            .when(!record.comment.is_empty(), |this| {
                                this.child(div().text_xs().child(record.comment.clone()))
                            })
                    })),
            )
            .children(completion)
            .when_some(self.review_report.clone(), |this, report| {
                this.child(
                    div()
                        .id("review-report")
                        .max_h(px(240.))
                        .overflow_y_scroll()
                        .p_2()
                        .border_t_1()
                        .border_color(cx.theme().border)
                        .text_xs()
                        .child(report),
                )
            })
    }
}
