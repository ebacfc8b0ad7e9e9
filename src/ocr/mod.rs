// OCR module: engine/session seams, the scoped extractor and the Tesseract adapter.

pub mod extractor;
pub mod tesseract;
pub mod traits;

pub use extractor::OcrExtractor;
pub use tesseract::TesseractEngine;
pub use traits::{OcrEngine, OcrSession, Recognition, SessionParams};
