//! Printed symbol recognition by template matching.

pub mod correlation;
pub mod matcher;
pub mod templates;

pub use matcher::{RegionRef, SymbolMatch, SymbolMatcher};
pub use templates::load_templates;

use std::path::Path;

use crate::config::SymbolConfig;

/// Builds a matcher when both a symbols dir and map are given.
///
/// Returns `None` when symbol detection was not requested or no template
/// could be loaded.
pub fn build_matcher(
    symbols_dir: Option<&Path>,
    symbols_map: Option<&Path>,
    config: &SymbolConfig,
) -> Option<SymbolMatcher> {
    match (symbols_dir, symbols_map) {
        (Some(dir), Some(map)) => {
            let matcher = SymbolMatcher::new(load_templates(dir, map), config.clone());
            if matcher.is_empty() { None } else { Some(matcher) }
        }
        (None, None) => None,
        _ => {
            crate::log(
                "Warning: symbol detection needs both --symbols-dir and --symbols-map; skipping",
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use tempfile::tempdir;

    #[test]
    fn test_build_matcher_needs_dir_and_map() {
        let dir = tempdir().unwrap();
        GrayImage::from_pixel(8, 8, Luma([255]))
            .save(dir.path().join("dot.png"))
            .unwrap();
        let map = dir.path().join("symbols.json");
        std::fs::write(&map, r#"{ "dot.png": { "glyph": "•" } }"#).unwrap();
        let config = SymbolConfig::default();

        assert!(build_matcher(Some(dir.path()), None, &config).is_none());
        assert!(build_matcher(None, Some(map.as_path()), &config).is_none());
        assert!(build_matcher(None, None, &config).is_none());

        let matcher = build_matcher(Some(dir.path()), Some(map.as_path()), &config).unwrap();
        assert_eq!(matcher.len(), 1);
    }

    #[test]
    fn test_build_matcher_without_loadable_templates() {
        let dir = tempdir().unwrap();
        let map = dir.path().join("symbols.json");
        std::fs::write(&map, r#"{ "gone.png": { "glyph": "?" } }"#).unwrap();

        assert!(build_matcher(Some(dir.path()), Some(map.as_path()), &SymbolConfig::default()).is_none());
    }
}
