//! Review bookkeeping around the viewer: the PDF library, persisted
//! annotations, report export and LLM-generated review reports.

pub mod export;
pub mod llm;
pub mod store;

pub use export::{SortBy, export_csv, export_json, filter_and_sort};
pub use llm::{GeminiProvider, LlmProvider, create_provider};
pub use store::{
    AnnotationRecord, AnnotationUpdate, Category, NewAnnotation, PdfRecord, ReviewSettings,
    ReviewStore,
};
