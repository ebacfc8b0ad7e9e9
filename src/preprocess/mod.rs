// Preprocess module: makes chart screenshots easier for the OCR engine to read.

pub mod enhancer;

pub use enhancer::{ImagePreprocessor, normalize_contrast};
