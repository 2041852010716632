//! Symbol templates and the map describing them.
//!
//! The map is a JSON object keyed by template file name:
//! `{ "sword.png": { "name": "sword", "glyph": "⚔", "token": "[sword]" } }`.
//! Templates are tried in the order they appear in the file.

use anyhow::{Context, Result};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::log;

/// Description of one symbol.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub glyph: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// A loaded template image with its metadata.
#[derive(Clone, Debug)]
pub struct SymbolTemplate {
    pub filename: String,
    pub meta: SymbolMeta,
    pub image: GrayImage,
}

/// Reads the symbols map file, keeping entries in file order.
pub fn load_symbols_map(path: &Path) -> Result<Vec<(String, SymbolMeta)>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read symbols map {}", path.display()))?;
    let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse symbols map {}", path.display()))?;

    raw.into_iter()
        .map(|(filename, value)| -> Result<(String, SymbolMeta)> {
            let meta = serde_json::from_value(value).with_context(|| {
                format!("Bad entry '{}' in symbols map {}", filename, path.display())
            })?;
            Ok((filename, meta))
        })
        .collect()
}

/// Loads every template listed in the map from `symbols_dir`.
///
/// Never fails: an unreadable map yields no templates, and missing or
/// undecodable template files are skipped. Each problem is logged.
pub fn load_templates(symbols_dir: &Path, map_path: &Path) -> Vec<SymbolTemplate> {
    let map = match load_symbols_map(map_path) {
        Ok(map) => map,
        Err(e) => {
            log(&format!("Warning: {:#}", e));
            Vec::new()
        }
    };

    let mut templates = Vec::new();
    for (filename, meta) in map {
        let path = symbols_dir.join(&filename);
        if !path.exists() {
            log(&format!("Template not found: {}; skipping", path.display()));
            continue;
        }
        match image::open(&path) {
            Ok(img) => templates.push(SymbolTemplate {
                filename,
                meta,
                image: img.to_luma8(),
            }),
            Err(e) => {
                log(&format!(
                    "Failed to read template {}: {}; skipping",
                    path.display(),
                    e
                ));
            }
        }
    }

    log(&format!(
        "Loaded {} symbol templates from {}",
        templates.len(),
        symbols_dir.display()
    ));
    templates
}
