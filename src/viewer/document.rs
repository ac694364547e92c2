//! The page-decoding capability the viewer consumes. Any PDF backend can sit
//! behind these traits; `crate::pdfium` provides the default one.

use super::error::ViewerResult;
use super::geometry;
use super::types::{PageSize, Rect, Viewport};
use anyhow::Result;
use image::RgbaImage;
use std::sync::Arc;

/// One glyph of a text span, positioned in page-space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextGlyph {
    pub text: String,
    pub rect: Rect,
}

/// An ordered run of text as produced by the decoder. Spans come back in
/// reading order and are never reordered by the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub glyphs: Vec<TextGlyph>,
}

impl TextSpan {
    pub fn text(&self) -> String {
        self.glyphs.iter().map(|glyph| glyph.text.as_str()).collect()
    }

    pub fn bounds(&self) -> Option<Rect> {
        let first = self.glyphs.first()?;
        let mut left = first.rect.left;
        let mut top = first.rect.top;
        let mut right = first.rect.right();
        let mut bottom = first.rect.bottom();
        for glyph in &self.glyphs[1..] {
            left = left.min(glyph.rect.left);
            top = top.min(glyph.rect.top);
            right = right.max(glyph.rect.right());
            bottom = bottom.max(glyph.rect.bottom());
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

pub trait Page: Send + Sync {
    /// Page size at scale 1.
    fn size(&self) -> PageSize;

    fn viewport(&self, scale: f32) -> Viewport {
        geometry::viewport_at(self.size(), scale)
    }

    fn text_content(&self) -> Result<Vec<TextSpan>>;

    /// Paints the page into a fresh pixel buffer sized to `viewport`.
    fn render(&self, viewport: Viewport) -> Result<RgbaImage>;
}

pub trait Document: Send + Sync {
    fn page_count(&self) -> u32;

    /// `page_number` is 1-based.
    fn page(&self, page_number: u32) -> Result<Arc<dyn Page>>;
}

pub trait DocumentLoader {
    fn load(&self, bytes: &[u8]) -> ViewerResult<Arc<dyn Document>>;
}
