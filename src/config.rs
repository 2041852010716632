//! Configuration types for atlas processing.
//!
//! Loads optional settings from a JSON file. Every field has a default, so a
//! partial file (or none at all) is valid. Command-line flags are applied on
//! top of whatever is loaded here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// OCR engine settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Tesseract language code(s), e.g. "eng" or "eng+deu"
    #[serde(default = "default_language")]
    pub language: String,
    /// Tesseract page segmentation mode
    #[serde(default = "default_psm")]
    pub psm: u8,
    /// Explicit path to the tesseract executable
    #[serde(default)]
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory
    #[serde(default)]
    pub tessdata_dir: Option<PathBuf>,
    /// If set, crops are binarized before OCR (pixels with R, G, B all > threshold become text)
    #[serde(default)]
    pub binarize_threshold: Option<u8>,
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_psm() -> u8 {
    6 // Assume a single uniform block of text
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            psm: default_psm(),
            tesseract_path: None,
            tessdata_dir: None,
            binarize_threshold: None,
        }
    }
}

/// Template matching settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SymbolConfig {
    /// Minimum intensity correlation (0.0-1.0) to accept a symbol
    #[serde(default = "default_symbol_threshold")]
    pub threshold: f32,
    /// Minimum edge correlation (0.0-1.0) confirming an intensity match
    #[serde(default = "default_edge_threshold")]
    pub edge_threshold: f32,
    /// Template scale factors tried against every region
    #[serde(default = "default_scales")]
    pub scales: Vec<f32>,
    /// Canny hysteresis thresholds
    #[serde(default = "default_canny_low")]
    pub canny_low: f32,
    #[serde(default = "default_canny_high")]
    pub canny_high: f32,
    /// Scaled templates narrower or shorter than this are skipped
    #[serde(default = "default_min_template_side")]
    pub min_template_side: u32,
}

fn default_symbol_threshold() -> f32 {
    0.6
}

fn default_edge_threshold() -> f32 {
    0.2
}

fn default_scales() -> Vec<f32> {
    vec![0.8, 0.9, 1.0, 1.1, 1.2]
}

fn default_canny_low() -> f32 {
    50.0
}

fn default_canny_high() -> f32 {
    150.0
}

fn default_min_template_side() -> u32 {
    3
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            threshold: default_symbol_threshold(),
            edge_threshold: default_edge_threshold(),
            scales: default_scales(),
            canny_low: default_canny_low(),
            canny_high: default_canny_high(),
            min_template_side: default_min_template_side(),
        }
    }
}

/// Complete configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AtlasConfig {
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub symbols: SymbolConfig,
}

/// Reads a config file. Errors are returned to the caller.
pub fn read_config(path: &Path) -> Result<AtlasConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Loads configuration.
///
/// An explicit path must be readable. Without one, `config.json` next to the
/// executable is used when present; problems with that file are logged and
/// defaults are used instead.
pub fn load_config(explicit: Option<&Path>) -> Result<AtlasConfig> {
    if let Some(path) = explicit {
        let config = read_config(path)?;
        crate::log(&format!("Config loaded from {}", path.display()));
        return Ok(config);
    }

    let config_path = crate::paths::get_exe_dir().join("config.json");
    if !config_path.exists() {
        return Ok(AtlasConfig::default());
    }

    match read_config(&config_path) {
        Ok(config) => {
            crate::log(&format!("Config loaded from {}", config_path.display()));
            Ok(config)
        }
        Err(e) => {
            crate::log(&format!("Warning: {:#}. Using defaults.", e));
            Ok(AtlasConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AtlasConfig::default();
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.psm, 6);
        assert_eq!(config.symbols.threshold, 0.6);
        assert_eq!(config.symbols.edge_threshold, 0.2);
        assert_eq!(config.symbols.scales, vec![0.8, 0.9, 1.0, 1.1, 1.2]);
        assert_eq!(config.symbols.min_template_side, 3);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AtlasConfig =
            serde_json::from_str(r#"{ "symbols": { "threshold": 0.75 } }"#).unwrap();
        assert_eq!(config.symbols.threshold, 0.75);
        assert_eq!(config.symbols.edge_threshold, 0.2);
        assert_eq!(config.symbols.canny_high, 150.0);
        assert_eq!(config.ocr.psm, 6);
    }

    #[test]
    fn test_explicit_config_must_parse() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_config(Some(path.as_path())).is_err());

        std::fs::write(&path, r#"{ "ocr": { "language": "deu", "psm": 7 } }"#).unwrap();
        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(config.ocr.language, "deu");
        assert_eq!(config.ocr.psm, 7);
    }
}
