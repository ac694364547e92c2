pub mod logger;
pub mod pdfium;
pub mod review;
pub mod viewer;
