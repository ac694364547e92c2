use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    /// The bytes could not be decoded into a document, or one of its pages
    /// could not be fetched while building placeholders.
    #[error("failed to load document: {0}")]
    DocumentLoad(String),

    #[error("page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("invalid scale: {0}")]
    InvalidScale(f32),

    #[error("failed to paint page {page}: {message}")]
    Paint { page: u32, message: String },

    #[error("no document loaded")]
    NoDocument,
}

pub type ViewerResult<T> = std::result::Result<T, ViewerError>;
