//! PDF library, annotation, category and settings persistence in a local
//! sled database. Records are serde_json values under big-endian numeric
//! keys; `pdf_paths` maps a file path to its library id.

use super::llm::{DEFAULT_PROMPT, DEFAULT_PROVIDER, DEFAULT_TEMPERATURE};
use crate::viewer::types::{Annotation, Rect};
use anyhow::{Context as _, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const PDFS_TREE: &str = "pdfs";
const PDF_PATHS_TREE: &str = "pdf_paths";
const ANNOTATIONS_TREE: &str = "annotations";
const CATEGORIES_TREE: &str = "categories";
const SETTINGS_TREE: &str = "settings";
const SETTINGS_KEY: &[u8] = b"review_settings";
const WINDOW_SIZE_TREE: &str = "window_size";
const WINDOW_SIZE_KEY_WIDTH: &str = "width";
const WINDOW_SIZE_KEY_HEIGHT: &str = "height";
const LOCAL_STATE_DB_DIR_NAME: &str = "kreview_db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u32,
    pub name: String,
    /// Hex color such as `#dc2626`.
    pub color: String,
    pub sort_order: u32,
    #[serde(default)]
    pub is_default: bool,
}

pub fn default_categories() -> Vec<Category> {
    [
        ("Critical", "#dc2626"),
        ("Major", "#ea580c"),
        ("Minor", "#ca8a04"),
        ("Suggestion", "#2563eb"),
        ("Question", "#7c3aed"),
    ]
    .into_iter()
    .enumerate()
    .map(|(ix, (name, color))| Category {
        id: ix as u32 + 1,
        name: name.to_string(),
        color: color.to_string(),
        sort_order: ix as u32 + 1,
        is_default: true,
    })
    .collect()
}

/// One reviewed file in the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfRecord {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub page_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_opened_at: Option<DateTime<Utc>>,
    /// Hidden from the library but annotations kept; re-adding the same path
    /// restores it.
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub review_decision: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Filled in on read.
    #[serde(skip)]
    pub annotation_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: u64,
    pub pdf_id: u64,
    pub category_id: u32,
    pub category_name: String,
    pub page_number: u32,
    #[serde(default)]
    pub selected_text: String,
    #[serde(default)]
    pub comment: String,
    /// Page-space rects at scale 1.
    pub highlight_rects: Vec<Rect>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnnotationRecord {
    pub fn to_viewer(&self) -> Annotation {
        Annotation {
            id: self.id,
            page_number: self.page_number,
            category_name: self.category_name.clone(),
            highlight_rects: self.highlight_rects.clone(),
            comment: self.comment.clone(),
            selected_text: self.selected_text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAnnotation {
    pub pdf_id: u64,
    pub category_id: u32,
    pub page_number: u32,
    pub selected_text: String,
    pub comment: String,
    pub highlight_rects: Vec<Rect>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationUpdate {
    pub category_id: Option<u32>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    pub llm_provider: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_prompt: String,
    /// `None` means fit-width.
    pub default_scale: Option<f32>,
    pub dual_page: bool,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            llm_provider: DEFAULT_PROVIDER.to_string(),
            llm_api_key: String::new(),
            llm_model: String::new(),
            llm_temperature: DEFAULT_TEMPERATURE,
            llm_prompt: DEFAULT_PROMPT.to_string(),
            default_scale: Some(1.0),
            dual_page: false,
        }
    }
}

pub struct ReviewStore {
    db: sled::Db,
    pdfs: sled::Tree,
    pdf_paths: sled::Tree,
    annotations: sled::Tree,
    categories: sled::Tree,
    settings: sled::Tree,
    window_size: sled::Tree,
}

impl ReviewStore {
    pub fn default_path() -> PathBuf {
        if let Some(app_data) = std::env::var_os("APPDATA") {
            return PathBuf::from(app_data)
                .join("kreview")
                .join(LOCAL_STATE_DB_DIR_NAME);
        }

        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".kreview")
                .join(LOCAL_STATE_DB_DIR_NAME);
        }

        PathBuf::from(".kreview").join(LOCAL_STATE_DB_DIR_NAME)
    }

    /// Opens (or creates) the database and seeds the default categories on
    /// first use.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir failed: {}", parent.display()))?;
        }

        let db = sled::open(path).with_context(|| format!("open db failed: {}", path.display()))?;
        let pdfs = db
            .open_tree(PDFS_TREE)
            .with_context(|| format!("open tree failed: {PDFS_TREE}"))?;
        let pdf_paths = db
            .open_tree(PDF_PATHS_TREE)
            .with_context(|| format!("open tree failed: {PDF_PATHS_TREE}"))?;
        let annotations = db
            .open_tree(ANNOTATIONS_TREE)
            .with_context(|| format!("open tree failed: {ANNOTATIONS_TREE}"))?;
        let categories = db
            .open_tree(CATEGORIES_TREE)
            .with_context(|| format!("open tree failed: {CATEGORIES_TREE}"))?;
        let settings = db
            .open_tree(SETTINGS_TREE)
            .with_context(|| format!("open tree failed: {SETTINGS_TREE}"))?;
        let window_size = db
            .open_tree(WINDOW_SIZE_TREE)
            .with_context(|| format!("open tree failed: {WINDOW_SIZE_TREE}"))?;

        let store = Self {
            db,
            pdfs,
            pdf_paths,
            annotations,
            categories,
            settings,
            window_size,
        };
        if store.categories.is_empty() {
            for category in default_categories() {
                store.put_category(&category)?;
            }
            store.categories.flush()?;
        }
        crate::debug_log!("[store] opened {}", path.display());
        Ok(store)
    }

    fn put_category(&self, category: &Category) -> Result<()> {
        let value = serde_json::to_vec(category)?;
        self.categories
            .insert(category.id.to_be_bytes(), value)
            .context("insert category failed")?;
        Ok(())
    }

    /// All categories ordered by `sort_order`.
    pub fn categories(&self) -> Result<Vec<Category>> {
        let mut categories = Vec::new();
        for entry in self.categories.iter() {
            let (_, value) = entry?;
            match serde_json::from_slice::<Category>(&value) {
                Ok(category) => categories.push(category),
                Err(err) => crate::warn_log!("[store] skipping unreadable category: {}", err),
            }
        }
        categories.sort_by_key(|category| (category.sort_order, category.id));
        Ok(categories)
    }

    pub fn category(&self, id: u32) -> Result<Option<Category>> {
        let Some(value) = self.categories.get(id.to_be_bytes())? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&value)?))
    }

    /// Registers a file in the library, or refreshes the existing entry for
    /// the same path (restoring it if it was removed).
    pub fn add_pdf(&self, path: &str, name: &str, page_count: u32) -> Result<PdfRecord> {
        if path.is_empty() {
            bail!("pdf requires a path");
        }

        let now = Utc::now();
        let existing = match self.pdf_paths.get(path.as_bytes())? {
            Some(id) => self.load_pdf(decode_id(&id)?)?,
            None => None,
        };

        let record = match existing {
            Some(mut record) => {
                record.removed = false;
                record.name = name.to_string();
                if page_count > 0 {
                    record.page_count = page_count;
                }
                record.last_opened_at = Some(now);
                record.updated_at = now;
                record
            }
            None => PdfRecord {
                id: self.db.generate_id().context("generate pdf id failed")?,
                name: name.to_string(),
                path: path.to_string(),
                page_count,
                created_at: now,
                updated_at: now,
                last_opened_at: Some(now),
                removed: false,
                completed: false,
                review_decision: None,
                completed_at: None,
                annotation_count: 0,
            },
        };

        self.put_pdf(&record)?;
        self.pdf_paths
            .insert(path.as_bytes(), record.id.to_be_bytes().to_vec())
            .context("index pdf path failed")?;
        self.pdf_paths.flush()?;
        crate::debug_log!("[store] library entry {} for {}", record.id, path);
        self.with_count(record)
    }

    pub fn pdf(&self, id: u64) -> Result<Option<PdfRecord>> {
        match self.load_pdf(id)? {
            Some(record) => Ok(Some(self.with_count(record)?)),
            None => Ok(None),
        }
    }

    /// Library entries that are not removed, most recently touched first.
    pub fn pdfs(&self) -> Result<Vec<PdfRecord>> {
        let counts = self.annotation_counts()?;
        let mut records = Vec::new();
        for entry in self.pdfs.iter() {
            let (_, value) = entry?;
            let mut record = match serde_json::from_slice::<PdfRecord>(&value) {
                Ok(record) => record,
                Err(err) => {
                    crate::warn_log!("[store] skipping unreadable pdf: {}", err);
                    continue;
                }
            };
            if record.removed {
                continue;
            }
            record.annotation_count = counts.get(&record.id).copied().unwrap_or(0);
            records.push(record);
        }
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    /// Library entries whose name contains `query`, ignoring case.
    pub fn search_pdfs(&self, query: &str) -> Result<Vec<PdfRecord>> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .pdfs()?
            .into_iter()
            .filter(|record| record.name.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn mark_pdf_completed(
        &self,
        id: u64,
        review_decision: Option<String>,
    ) -> Result<PdfRecord> {
        let mut record = self.require_pdf(id)?;
        let now = Utc::now();
        record.completed = true;
        record.review_decision = review_decision.filter(|decision| !decision.trim().is_empty());
        record.completed_at = Some(now);
        record.updated_at = now;
        self.put_pdf(&record)?;
        self.with_count(record)
    }

    pub fn mark_pdf_incomplete(&self, id: u64) -> Result<PdfRecord> {
        let mut record = self.require_pdf(id)?;
        record.completed = false;
        record.review_decision = None;
        record.completed_at = None;
        record.updated_at = Utc::now();
        self.put_pdf(&record)?;
        self.with_count(record)
    }

    /// With `delete_annotations` the entry and its annotations are dropped
    /// for good. Otherwise the entry is only hidden and keeps its annotations.
    /// Returns whether the entry existed.
    pub fn delete_pdf(&self, id: u64, delete_annotations: bool) -> Result<bool> {
        let Some(mut record) = self.load_pdf(id)? else {
            return Ok(false);
        };

        if !delete_annotations {
            record.removed = true;
            record.updated_at = Utc::now();
            self.put_pdf(&record)?;
            return Ok(true);
        }

        let mut owned = Vec::new();
        for entry in self.annotations.iter() {
            let (key, value) = entry?;
            let belongs = serde_json::from_slice::<AnnotationRecord>(&value)
                .map(|annotation| annotation.pdf_id == id)
                .unwrap_or(false);
            if belongs {
                owned.push(key);
            }
        }
        for key in owned {
            self.annotations
                .remove(key)
                .context("delete annotation failed")?;
        }
        self.pdfs
            .remove(id.to_be_bytes())
            .context("delete pdf failed")?;
        self.pdf_paths
            .remove(record.path.as_bytes())
            .context("drop pdf path failed")?;
        self.db.flush()?;
        crate::debug_log!("[store] deleted pdf {} with its annotations", id);
        Ok(true)
    }

    pub fn create_annotation(&self, new: NewAnnotation) -> Result<AnnotationRecord> {
        self.require_pdf(new.pdf_id)?;
        if new.page_number == 0 {
            bail!("page numbers start at 1");
        }
        let category = self
            .category(new.category_id)?
            .ok_or_else(|| anyhow!("unknown category {}", new.category_id))?;

        let now = Utc::now();
        let record = AnnotationRecord {
            id: self.db.generate_id().context("generate annotation id failed")?,
            pdf_id: new.pdf_id,
            category_id: category.id,
            category_name: category.name,
            page_number: new.page_number,
            selected_text: new.selected_text,
            comment: new.comment,
            highlight_rects: new.highlight_rects,
            created_at: now,
            updated_at: now,
        };
        self.put_annotation(&record)?;
        crate::debug_log!(
            "[store] created annotation {} on page {}",
            record.id,
            record.page_number
        );
        Ok(record)
    }

    pub fn update_annotation(&self, id: u64, update: AnnotationUpdate) -> Result<AnnotationRecord> {
        let mut record = self
            .annotation(id)?
            .ok_or_else(|| anyhow!("unknown annotation {id}"))?;

        if let Some(category_id) = update.category_id {
            let category = self
                .category(category_id)?
                .ok_or_else(|| anyhow!("unknown category {category_id}"))?;
            record.category_id = category.id;
            record.category_name = category.name;
        }
        if let Some(comment) = update.comment {
            record.comment = comment;
        }
        record.updated_at = Utc::now();

        self.put_annotation(&record)?;
        Ok(record)
    }

    /// Returns whether a record was removed.
    pub fn delete_annotation(&self, id: u64) -> Result<bool> {
        let removed = self
            .annotations
            .remove(id.to_be_bytes())
            .context("delete annotation failed")?;
        self.annotations.flush()?;
        Ok(removed.is_some())
    }

    pub fn annotation(&self, id: u64) -> Result<Option<AnnotationRecord>> {
        let Some(value) = self.annotations.get(id.to_be_bytes())? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&value)?))
    }

    /// Annotations of one library entry ordered by page, then creation.
    pub fn annotations_for_pdf(&self, pdf_id: u64) -> Result<Vec<AnnotationRecord>> {
        let mut records = Vec::new();
        for entry in self.annotations.iter() {
            let (_, value) = entry?;
            let record = match serde_json::from_slice::<AnnotationRecord>(&value) {
                Ok(record) => record,
                Err(err) => {
                    crate::warn_log!("[store] skipping unreadable annotation: {}", err);
                    continue;
                }
            };
            if record.pdf_id == pdf_id {
                records.push(record);
            }
        }
        records.sort_by(|a, b| {
            a.page_number
                .cmp(&b.page_number)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(records)
    }

    pub fn annotations_for_page(
        &self,
        pdf_id: u64,
        page_number: u32,
    ) -> Result<Vec<AnnotationRecord>> {
        Ok(self
            .annotations_for_pdf(pdf_id)?
            .into_iter()
            .filter(|record| record.page_number == page_number)
            .collect())
    }

    /// Every category with the number of the entry's annotations in it, in
    /// category order.
    pub fn category_counts(&self, pdf_id: u64) -> Result<Vec<(Category, usize)>> {
        let records = self.annotations_for_pdf(pdf_id)?;
        Ok(self
            .categories()?
            .into_iter()
            .map(|category| {
                let count = records
                    .iter()
                    .filter(|record| record.category_id == category.id)
                    .count();
                (category, count)
            })
            .collect())
    }

    pub fn settings(&self) -> Result<ReviewSettings> {
        let Some(value) = self.settings.get(SETTINGS_KEY)? else {
            return Ok(ReviewSettings::default());
        };
        serde_json::from_slice(&value).context("decode settings failed")
    }

    pub fn save_settings(&self, settings: &ReviewSettings) -> Result<()> {
        let value = serde_json::to_vec(settings)?;
        self.settings
            .insert(SETTINGS_KEY, value)
            .context("save settings failed")?;
        self.settings.flush()?;
        Ok(())
    }

    /// Last saved main-window size, if any.
    pub fn window_size(&self) -> Option<(f32, f32)> {
        let width_bytes = self.window_size.get(WINDOW_SIZE_KEY_WIDTH).ok().flatten()?;
        let height_bytes = self.window_size.get(WINDOW_SIZE_KEY_HEIGHT).ok().flatten()?;
        let width = f32::from_be_bytes(width_bytes.as_ref().try_into().ok()?);
        let height = f32::from_be_bytes(height_bytes.as_ref().try_into().ok()?);
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some((width, height))
    }

    pub fn save_window_size(&self, width: f32, height: f32) -> Result<()> {
        self.window_size
            .insert(WINDOW_SIZE_KEY_WIDTH, width.to_be_bytes().to_vec())
            .context("save window width failed")?;
        self.window_size
            .insert(WINDOW_SIZE_KEY_HEIGHT, height.to_be_bytes().to_vec())
            .context("save window height failed")?;
        self.window_size.flush()?;
        Ok(())
    }

    fn load_pdf(&self, id: u64) -> Result<Option<PdfRecord>> {
        let Some(value) = self.pdfs.get(id.to_be_bytes())? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&value).context("decode pdf failed")?))
    }

    fn require_pdf(&self, id: u64) -> Result<PdfRecord> {
        self.load_pdf(id)?
            .ok_or_else(|| anyhow!("unknown pdf {id}"))
    }

    fn put_pdf(&self, record: &PdfRecord) -> Result<()> {
        let value = serde_json::to_vec(record)?;
        self.pdfs
            .insert(record.id.to_be_bytes(), value)
            .context("insert pdf failed")?;
        self.pdfs.flush()?;
        Ok(())
    }

    fn with_count(&self, mut record: PdfRecord) -> Result<PdfRecord> {
        record.annotation_count = self.annotations_for_pdf(record.id)?.len();
        Ok(record)
    }

    fn annotation_counts(&self) -> Result<HashMap<u64, usize>> {
        let mut counts = HashMap::new();
        for entry in self.annotations.iter() {
            let (_, value) = entry?;
            if let Ok(record) = serde_json::from_slice::<AnnotationRecord>(&value) {
                *counts.entry(record.pdf_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    fn put_annotation(&self, record: &AnnotationRecord) -> Result<()> {
        let value = serde_json::to_vec(record)?;
        self.annotations
            .insert(record.id.to_be_bytes(), value)
            .context("insert annotation failed")?;
        self.annotations.flush()?;
        Ok(())
    }
}

fn decode_id(bytes: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| anyhow!("malformed id of {} bytes", bytes.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ReviewStore, u64) {
        let dir = tempfile::tempdir().unwrap();
        let store = ReviewStore::open(&dir.path().join("db")).unwrap();
        let pdf = store.add_pdf("/docs/paper.pdf", "paper.pdf", 12).unwrap();
        (dir, store, pdf.id)
    }

    fn new_annotation(pdf_id: u64, page_number: u32, category_id: u32) -> NewAnnotation {
        NewAnnotation {
            pdf_id,
            category_id,
            page_number,
            selected_text: "quoted".to_string(),
            comment: String::new(),
            highlight_rects: vec![Rect::new(1.0, 2.0, 3.0, 4.0)],
        }
    }

    #[test]
    fn seeds_default_categories_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let store = ReviewStore::open(&path).unwrap();
            let names: Vec<_> = store
                .categories()
                .unwrap()
                .into_iter()
                .map(|c| c.name)
                .collect();
            assert_eq!(names, ["Critical", "Major", "Minor", "Suggestion", "Question"]);
        }
        let store = ReviewStore::open(&path).unwrap();
        assert_eq!(store.categories().unwrap().len(), 5);
    }

    #[test]
    fn adding_the_same_path_reuses_the_entry() {
        let (_dir, store, pdf_id) = store();
        let again = store.add_pdf("/docs/paper.pdf", "paper.pdf", 0).unwrap();
        assert_eq!(again.id, pdf_id);
        assert_eq!(again.page_count, 12);
        assert!(again.last_opened_at.is_some());

        let other = store.add_pdf("/docs/notes.pdf", "notes.pdf", 3).unwrap();
        assert_ne!(other.id, pdf_id);
        assert!(store.add_pdf("", "nameless.pdf", 1).is_err());
    }

    #[test]
    fn library_lists_recent_first_with_counts() {
        let (_dir, store, paper) = store();
        let notes = store.add_pdf("/docs/notes.pdf", "Notes.pdf", 3).unwrap();
        store.create_annotation(new_annotation(paper, 1, 1)).unwrap();
        store.create_annotation(new_annotation(paper, 2, 2)).unwrap();

        let listed: Vec<_> = store
            .pdfs()
            .unwrap()
            .into_iter()
            .map(|pdf| (pdf.id, pdf.annotation_count))
            .collect();
        assert_eq!(listed, vec![(notes.id, 0), (paper, 2)]);
        assert_eq!(store.pdf(paper).unwrap().unwrap().annotation_count, 2);
    }

    #[test]
    fn search_matches_names_ignoring_case() {
        let (_dir, store, paper) = store();
        store.add_pdf("/docs/notes.pdf", "Notes.pdf", 3).unwrap();

        let hits: Vec<_> = store
            .search_pdfs("PAPER")
            .unwrap()
            .into_iter()
            .map(|pdf| pdf.id)
            .collect();
        assert_eq!(hits, vec![paper]);
        assert_eq!(store.search_pdfs("").unwrap().len(), 2);
        assert!(store.search_pdfs("thesis").unwrap().is_empty());
    }

    #[test]
    fn completion_records_decision_until_reopened() {
        let (_dir, store, paper) = store();
        let done = store
            .mark_pdf_completed(paper, Some("Accept with minor revisions".to_string()))
            .unwrap();
        assert!(done.completed);
        assert_eq!(done.review_decision.as_deref(), Some("Accept with minor revisions"));
        assert!(done.completed_at.is_some());

        let blank = store.mark_pdf_completed(paper, Some("  ".to_string())).unwrap();
        assert_eq!(blank.review_decision, None);

        let reopened = store.mark_pdf_incomplete(paper).unwrap();
        assert!(!reopened.completed);
        assert_eq!(reopened.review_decision, None);
        assert_eq!(reopened.completed_at, None);
        assert!(store.mark_pdf_completed(424242, None).is_err());
    }

    #[test]
    fn soft_delete_hides_entry_and_keeps_annotations() {
        let (_dir, store, paper) = store();
        let kept = store.create_annotation(new_annotation(paper, 1, 1)).unwrap();

        assert!(store.delete_pdf(paper, false).unwrap());
        assert!(store.pdfs().unwrap().is_empty());
        assert_eq!(store.annotations_for_pdf(paper).unwrap(), vec![kept]);

        let restored = store.add_pdf("/docs/paper.pdf", "paper.pdf", 12).unwrap();
        assert_eq!(restored.id, paper);
        assert!(!restored.removed);
        assert_eq!(restored.annotation_count, 1);
    }

    #[test]
    fn hard_delete_cascades_to_annotations() {
        let (_dir, store, paper) = store();
        let notes = store.add_pdf("/docs/notes.pdf", "notes.pdf", 3).unwrap();
        store.create_annotation(new_annotation(paper, 1, 1)).unwrap();
        store.create_annotation(new_annotation(paper, 2, 1)).unwrap();
        let survivor = store.create_annotation(new_annotation(notes.id, 1, 1)).unwrap();

        assert!(store.delete_pdf(paper, true).unwrap());
        assert!(!store.delete_pdf(paper, true).unwrap());
        assert_eq!(store.pdf(paper).unwrap(), None);
        assert!(store.annotations_for_pdf(paper).unwrap().is_empty());
        assert_eq!(store.annotations_for_pdf(notes.id).unwrap(), vec![survivor]);

        let fresh = store.add_pdf("/docs/paper.pdf", "paper.pdf", 12).unwrap();
        assert_ne!(fresh.id, paper);
        assert_eq!(fresh.annotation_count, 0);
    }

    #[test]
    fn annotations_round_trip_with_page_space_rects() {
        let (_dir, store, paper) = store();
        let created = store.create_annotation(new_annotation(paper, 2, 1)).unwrap();
        assert_eq!(created.category_name, "Critical");

        let loaded = store.annotation(created.id).unwrap().unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.to_viewer().highlight_rects, vec![Rect::new(1.0, 2.0, 3.0, 4.0)]);
    }

    #[test]
    fn create_validates_input() {
        let (_dir, store, paper) = store();
        assert!(store.create_annotation(new_annotation(paper, 0, 1)).is_err());
        assert!(store.create_annotation(new_annotation(paper, 1, 99)).is_err());
        assert!(store.create_annotation(new_annotation(paper + 1000, 1, 1)).is_err());
    }

    #[test]
    fn update_changes_category_and_comment() {
        let (_dir, store, paper) = store();
        let created = store.create_annotation(new_annotation(paper, 1, 1)).unwrap();
        let updated = store
            .update_annotation(
                created.id,
                AnnotationUpdate {
                    category_id: Some(4),
                    comment: Some("consider rewording".to_string()),
                },
            )
            .unwrap();

        assert_eq!(updated.category_name, "Suggestion");
        assert_eq!(updated.comment, "consider rewording");
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
        assert!(store.update_annotation(12345, AnnotationUpdate::default()).is_err());
    }

    #[test]
    fn listing_orders_by_page_and_filters_by_pdf() {
        let (_dir, store, paper) = store();
        let other = store.add_pdf("/docs/other.pdf", "other.pdf", 1).unwrap();
        let third = store.create_annotation(new_annotation(paper, 3, 1)).unwrap();
        let first = store.create_annotation(new_annotation(paper, 1, 2)).unwrap();
        store.create_annotation(new_annotation(other.id, 1, 1)).unwrap();

        let ids: Vec<_> = store
            .annotations_for_pdf(paper)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![first.id, third.id]);
        assert_eq!(store.annotations_for_page(paper, 3).unwrap().len(), 1);
    }

    #[test]
    fn delete_and_counts() {
        let (_dir, store, paper) = store();
        let a = store.create_annotation(new_annotation(paper, 1, 1)).unwrap();
        store.create_annotation(new_annotation(paper, 2, 1)).unwrap();
        store.create_annotation(new_annotation(paper, 2, 3)).unwrap();

        assert!(store.delete_annotation(a.id).unwrap());
        assert!(!store.delete_annotation(a.id).unwrap());

        let counts: Vec<_> = store
            .category_counts(paper)
            .unwrap()
            .into_iter()
            .map(|(category, count)| (category.name, count))
            .collect();
        assert_eq!(counts[0], ("Critical".to_string(), 1));
        assert_eq!(counts[2], ("Minor".to_string(), 1));
        assert_eq!(counts[4], ("Question".to_string(), 0));
    }

    #[test]
    fn settings_default_then_persist() {
        let (_dir, store, _) = store();
        let mut settings = store.settings().unwrap();
        assert_eq!(settings, ReviewSettings::default());

        settings.llm_api_key = "key".to_string();
        settings.llm_model = "gemini-2.0-flash".to_string();
        settings.dual_page = true;
        store.save_settings(&settings).unwrap();
        assert_eq!(store.settings().unwrap(), settings);
    }

    #[test]
    fn window_size_is_absent_until_saved() {
        let (_dir, store, _) = store();
        assert_eq!(store.window_size(), None);

        store.save_window_size(1280.0, 860.0).unwrap();
        assert_eq!(store.window_size(), Some((1280.0, 860.0)));

        store.save_window_size(0.0, 860.0).unwrap();
        assert_eq!(store.window_size(), None);
    }
}
