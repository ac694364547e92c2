//! Annotation list filtering, sorting and report export.

use super::store::{AnnotationRecord, Category};
use anyhow::{Context as _, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Page, then creation time.
    #[default]
    Page,
    /// Newest first.
    Date,
    /// Category sort order, then page.
    Category,
}

/// Keeps records whose category is in `filter` (all records when the filter
/// is empty) and orders them by `sort_by`.
pub fn filter_and_sort(
    records: &[AnnotationRecord],
    categories: &[Category],
    filter: &HashSet<u32>,
    sort_by: SortBy,
) -> Vec<AnnotationRecord> {
    let mut result: Vec<AnnotationRecord> = records
        .iter()
        .filter(|record| filter.is_empty() || filter.contains(&record.category_id))
        .cloned()
        .collect();

    match sort_by {
        SortBy::Page => result.sort_by(|a, b| {
            a.page_number
                .cmp(&b.page_number)
                .then(a.created_at.cmp(&b.created_at))
        }),
        SortBy::Date => result.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortBy::Category => {
            let order: HashMap<u32, u32> = categories
                .iter()
                .map(|category| (category.id, category.sort_order))
                .collect();
            result.sort_by(|a, b| {
                let a_order = order.get(&a.category_id).copied().unwrap_or(0);
                let b_order = order.get(&b.category_id).copied().unwrap_or(0);
                a_order.cmp(&b_order).then(a.page_number.cmp(&b.page_number))
            });
        }
    }
    result
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedAnnotation<'a> {
    id: u64,
    category: &'a str,
    page_number: u32,
    selected_text: &'a str,
    comment: &'a str,
    created_at: String,
    updated_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedReview<'a> {
    exported_at: String,
    document: &'a str,
    total_annotations: usize,
    annotations: Vec<ExportedAnnotation<'a>>,
}

fn iso(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn export_json(
    document: &str,
    records: &[AnnotationRecord],
    exported_at: DateTime<Utc>,
) -> Result<String> {
    let review = ExportedReview {
        exported_at: iso(&exported_at),
        document,
        total_annotations: records.len(),
        annotations: records
            .iter()
            .map(|record| ExportedAnnotation {
                id: record.id,
                category: &record.category_name,
                page_number: record.page_number,
                selected_text: &record.selected_text,
                comment: &record.comment,
                created_at: iso(&record.created_at),
                updated_at: iso(&record.updated_at),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&review).context("serialize review export failed")
}

pub fn export_csv(records: &[AnnotationRecord]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());

    writer.write_record([
        "Type",
        "Category",
        "Page",
        "Selected Text",
        "Comment",
        "Created At",
    ])?;
    for record in records {
        writer.write_record([
            "Annotation",
            record.category_name.as_str(),
            record.page_number.to_string().as_str(),
            record.selected_text.as_str(),
            record.comment.as_str(),
            record.created_at.format("%Y-%m-%d %H:%M").to_string().as_str(),
        ])?;
    }
    writer.flush()?;

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("finish csv export failed: {}", err.error()))?;
    String::from_utf8(bytes).context("csv export is not utf-8")
}
