//! The summary document written at the end of a run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::layout::CardGrid;
use crate::symbols::SymbolMatch;

/// Result for one region of one card.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionResult {
    pub region_index: usize,
    pub name: String,
    /// Region rectangle in card-local pixels
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    /// Top-left corner in atlas pixels
    pub x_abs: u32,
    pub y_abs: u32,
    /// OCR text merged with detected symbol glyphs
    pub text: String,
    /// Mean OCR word confidence (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<SymbolMatch>,
}

/// All region results of one card.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardResult {
    pub card_index: u32,
    pub col: u32,
    pub row: u32,
    pub regions: Vec<RegionResult>,
}

/// Top-level summary document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AtlasSummary {
    pub atlas: String,
    pub atlas_size: [u32; 2],
    pub card_size: [u32; 2],
    pub cols: u32,
    pub rows: u32,
    pub cards: Vec<CardResult>,
}

impl AtlasSummary {
    pub fn new(atlas: &Path, grid: &CardGrid) -> Self {
        Self {
            atlas: atlas.display().to_string(),
            atlas_size: [grid.atlas_width, grid.atlas_height],
            card_size: [grid.card_width, grid.card_height],
            cols: grid.cols,
            rows: grid.rows,
            cards: Vec::with_capacity(grid.len() as usize),
        }
    }
}

/// Writes the summary as pretty-printed UTF-8 JSON.
pub fn write_summary(summary: &AtlasSummary, output_path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(summary).context("Failed to serialize summary to JSON")?;

    let mut file = File::create(output_path)
        .with_context(|| format!("Failed to create summary file: {}", output_path.display()))?;

    file.write_all(json.as_bytes())
        .context("Failed to write summary data")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_summary(path: &Path) -> AtlasSummary {
        let contents = std::fs::read_to_string(path).unwrap();
        serde_json::from_str(&contents).unwrap()
    }

    fn sample() -> AtlasSummary {
        let grid = CardGrid::new((200, 100), (100, 100)).unwrap();
        let mut summary = AtlasSummary::new(Path::new("assets/cards.png"), &grid);
        summary.cards.push(CardResult {
            card_index: 1,
            col: 1,
            row: 0,
            regions: vec![RegionResult {
                region_index: 0,
                name: "título".to_string(),
                x: 5,
                y: 6,
                w: 20,
                h: 10,
                x_abs: 105,
                y_abs: 6,
                text: "Éowyn ⚔".to_string(),
                confidence: Some(88.5),
                symbols: vec![SymbolMatch {
                    name: Some("sword".to_string()),
                    glyph: Some("⚔".to_string()),
                    token: None,
                    score: 0.91,
                    edge_score: 0.4,
                }],
            }],
        });
        summary
    }

    #[test]
    fn test_summary_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cards_summary.json");
        let summary = sample();

        write_summary(&summary, &path).unwrap();

        assert_eq!(read_summary(&path), summary);
    }

    #[test]
    fn test_summary_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cards_summary.json");
        write_summary(&sample(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"atlas_size\": [\n    200,\n    100\n  ]"));
        assert!(content.contains("\"x_abs\": 105"));
        // Non-ASCII text is written as-is, not escaped
        assert!(content.contains("Éowyn ⚔"));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let mut summary = sample();
        summary.cards[0].regions[0].confidence = None;
        summary.cards[0].regions[0].symbols.clear();

        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("confidence"));
        assert!(!json.contains("symbols"));
        assert!(json.contains("\"text\":\"Éowyn ⚔\""));
    }
}
