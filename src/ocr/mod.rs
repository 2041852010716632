pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use engine::{OcrText, TesseractEngine};
pub use extract::merge_text;
pub use preprocess::prepare_for_ocr;
pub use setup::ensure_tessdata;

use anyhow::Result;
use image::GrayImage;

use crate::config::OcrConfig;

/// Anything that can turn a grayscale crop into text.
pub trait TextRecognizer {
    fn recognize(&self, img: &GrayImage) -> Result<OcrText>;
}

/// Locates the OCR engine, or logs why OCR is unavailable.
///
/// A missing engine is not an error: the run continues without text.
pub fn detect_engine(config: &OcrConfig) -> Option<TesseractEngine> {
    match TesseractEngine::detect(config) {
        Ok(engine) => {
            crate::log(&format!(
                "OCR engine: {} (lang={}, psm={})",
                engine.executable().display(),
                config.language,
                config.psm
            ));
            Some(engine)
        }
        Err(e) => {
            crate::log(&format!(
                "Warning: {}; skipping OCR. Install Tesseract and make sure it is on PATH.",
                e
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_engine_disables_ocr() {
        let dir = tempdir().unwrap();
        let config = OcrConfig {
            tesseract_path: Some(dir.path().join("missing-tesseract")),
            ..Default::default()
        };
        assert!(detect_engine(&config).is_none());
    }
}
