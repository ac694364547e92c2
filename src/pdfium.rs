//! Page decoding on top of PDFium.

use crate::viewer::document::{Document, DocumentLoader, Page, TextGlyph, TextSpan};
use crate::viewer::error::{ViewerError, ViewerResult};
use crate::viewer::types::{PageSize, Rect, Viewport};
use anyhow::{Context as _, Result, anyhow};
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

pub const PDFIUM_DIR_ENV: &str = "KREVIEW_PDFIUM_DIR";

static PDFIUM_INSTANCE: OnceLock<Result<Pdfium, String>> = OnceLock::new();

fn shared_pdfium() -> Result<&'static Pdfium> {
    match PDFIUM_INSTANCE.get_or_init(|| init_pdfium().map_err(|err| format!("{err:#}"))) {
        Ok(pdfium) => Ok(pdfium),
        Err(message) => Err(anyhow!("{message}")),
    }
}

fn library_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = std::env::var_os(PDFIUM_DIR_ENV)
        && !dir.is_empty()
    {
        paths.push(PathBuf::from(dir));
    }
    paths.push(PathBuf::from("./lib"));
    paths.push(PathBuf::from("./"));
    paths
}

fn init_pdfium() -> Result<Pdfium> {
    let mut last_error = None;
    for dir in library_search_paths() {
        let library = Pdfium::pdfium_platform_library_name_at_path(&dir);
        match Pdfium::bind_to_library(library) {
            Ok(bindings) => {
                crate::debug_log!("[pdfium] loaded from {}", dir.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(err) => {
                crate::debug_log!("[pdfium] {} failed: {}", dir.display(), err);
                last_error = Some(err);
            }
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            crate::debug_log!("[pdfium] loaded from system");
            Ok(Pdfium::new(bindings))
        }
        Err(err) => {
            let searched = last_error
                .map(|previous| format!(" (last bundled attempt: {previous})"))
                .unwrap_or_default();
            Err(anyhow!(
                "PDFium library not found; set {PDFIUM_DIR_ENV} or place it under ./lib: {err}{searched}"
            ))
        }
    }
}

/// Loads documents with the process-wide PDFium instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumLoader;

impl DocumentLoader for PdfiumLoader {
    fn load(&self, bytes: &[u8]) -> ViewerResult<Arc<dyn Document>> {
        let document = PdfiumDocument::from_bytes(bytes)
            .map_err(|err| ViewerError::DocumentLoad(format!("{err:#}")))?;
        Ok(Arc::new(document))
    }
}

type SharedDocument = Arc<Mutex<PdfDocument<'static>>>;

fn lock(document: &SharedDocument) -> Result<MutexGuard<'_, PdfDocument<'static>>> {
    document
        .lock()
        .map_err(|_| anyhow!("pdf document lock poisoned"))
}

/// A decoded PDF. Page sizes are read once at load; pages share the decoded
/// document behind one mutex.
pub struct PdfiumDocument {
    document: SharedDocument,
    sizes: Vec<PageSize>,
}

impl PdfiumDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let pdfium = shared_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_vec(bytes.to_vec(), None)
            .context("cannot decode PDF")?;

        let pages = document.pages();
        let page_count = pages.len();
        let mut sizes = Vec::with_capacity(page_count as usize);
        for index in 0..page_count {
            let page = pages
                .get(index)
                .with_context(|| format!("cannot read page {}", index + 1))?;
            sizes.push(PageSize::new(page.width().value, page.height().value));
        }
        crate::debug_log!("[pdfium] decoded {} page(s)", sizes.len());

        Ok(Self {
            document: Arc::new(Mutex::new(document)),
            sizes,
        })
    }
}

impl Document for PdfiumDocument {
    fn page_count(&self) -> u32 {
        self.sizes.len() as u32
    }

    fn page(&self, page_number: u32) -> Result<Arc<dyn Page>> {
        let size = page_number
            .checked_sub(1)
            .and_then(|index| self.sizes.get(index as usize))
            .copied()
            .ok_or_else(|| anyhow!("page {page_number} out of range"))?;
        let index = u16::try_from(page_number - 1)
            .with_context(|| format!("page {page_number} exceeds PDFium page index range"))?;

        Ok(Arc::new(PdfiumPage {
            document: self.document.clone(),
            index,
            size,
        }))
    }
}

pub struct PdfiumPage {
    document: SharedDocument,
    index: u16,
    size: PageSize,
}

impl Page for PdfiumPage {
    fn size(&self) -> PageSize {
        self.size
    }

    fn text_content(&self) -> Result<Vec<TextSpan>> {
        let document = lock(&self.document)?;
        let page = document
            .pages()
            .get(self.index)
            .with_context(|| format!("cannot open page {}", self.index + 1))?;
        let page_height = page.height().value;
        let text = page.text().context("cannot read page text")?;

        let mut spans = Vec::new();
        for segment in text.segments().iter() {
            let Ok(chars) = segment.chars() else {
                continue;
            };
            let mut glyphs = Vec::new();
            for ch in chars.iter() {
                let Some(unicode) = ch.unicode_char() else {
                    continue;
                };
                let Ok(bounds) = ch.loose_bounds() else {
                    continue;
                };
                // PDF space has a bottom-left origin.
                glyphs.push(TextGlyph {
                    text: unicode.to_string(),
                    rect: Rect::new(
                        bounds.left().value,
                        page_height - bounds.top().value,
                        bounds.width().value,
                        bounds.height().value,
                    ),
                });
            }
            if !glyphs.is_empty() {
                spans.push(TextSpan { glyphs });
            }
        }
        Ok(spans)
    }

    #[allow(deprecated)]
    fn render(&self, viewport: Viewport) -> Result<RgbaImage> {
        let (width, height) = viewport.pixel_size();
        if width == 0 || height == 0 {
            return Err(anyhow!("invalid render size {width}x{height}"));
        }

        let document = lock(&self.document)?;
        let page = document
            .pages()
            .get(self.index)
            .with_context(|| format!("cannot open page {}", self.index + 1))?;
        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_maximum_height(height as i32);
        let bitmap = page
            .render_with_config(&config)
            .with_context(|| format!("cannot render page {}", self.index + 1))?;

        let bitmap_width = bitmap.width() as u32;
        let bitmap_height = bitmap.height() as u32;
        RgbaImage::from_raw(bitmap_width, bitmap_height, bitmap.as_rgba_bytes()).ok_or_else(
            || anyhow!("cannot create {bitmap_width}x{bitmap_height} image buffer"),
        )
    }
}
