//! Optional per-region debug output.

use image::RgbaImage;
use std::path::{Path, PathBuf};

use crate::layout::{draw_grid_overlay, CardGrid, Region};
use crate::log;

/// Base file name for a region crop: spaces become underscores.
pub fn artifact_stem(name: &str, card_index: u32, region_index: usize) -> String {
    format!(
        "{}_card{}_reg{}",
        name.replace(' ', "_"),
        card_index,
        region_index
    )
}

/// Saves a region crop as PNG and, when non-empty, its text as TXT.
///
/// Failures are logged and otherwise ignored. Returns the PNG path if written.
pub fn save_region_artifacts(
    crops_dir: &Path,
    stem: &str,
    crop: &RgbaImage,
    text: &str,
) -> Option<PathBuf> {
    let png_path = crops_dir.join(format!("{}.png", stem));
    let saved = match crop.save(&png_path) {
        Ok(()) => Some(png_path),
        Err(e) => {
            log(&format!("Failed to save crop {}: {}", png_path.display(), e));
            None
        }
    };

    if !text.is_empty() {
        let txt_path = crops_dir.join(format!("{}.txt", stem));
        if let Err(e) = std::fs::write(&txt_path, text) {
            log(&format!("Failed to save text {}: {}", txt_path.display(), e));
        }
    }

    saved
}

/// Writes `grid_overlay.png` showing card cells and region outlines.
pub fn save_grid_overlay(
    crops_dir: &Path,
    atlas: &RgbaImage,
    grid: &CardGrid,
    regions: &[Region],
) -> Option<PathBuf> {
    let path = crops_dir.join("grid_overlay.png");
    match draw_grid_overlay(atlas, grid, regions).save(&path) {
        Ok(()) => {
            log(&format!("Saved grid overlay: {}", path.display()));
            Some(path)
        }
        Err(e) => {
            log(&format!("Failed to save grid overlay {}: {}", path.display(), e));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use tempfile::tempdir;

    #[test]
    fn test_artifact_stem() {
        assert_eq!(artifact_stem("card title", 3, 1), "card_title_card3_reg1");
    }

    #[test]
    fn test_save_region_artifacts() {
        let dir = tempdir().unwrap();
        let crop: RgbaImage = ImageBuffer::from_pixel(4, 4, Rgba([1, 2, 3, 255]));

        let png = save_region_artifacts(dir.path(), "title_card0_reg0", &crop, "Aragorn").unwrap();
        assert!(png.exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("title_card0_reg0.txt")).unwrap(),
            "Aragorn"
        );

        save_region_artifacts(dir.path(), "empty_card0_reg1", &crop, "");
        assert!(dir.path().join("empty_card0_reg1.png").exists());
        assert!(!dir.path().join("empty_card0_reg1.txt").exists());
    }

    #[test]
    fn test_save_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let crop: RgbaImage = ImageBuffer::new(2, 2);
        assert!(save_region_artifacts(&missing, "x", &crop, "text").is_none());
    }
}
