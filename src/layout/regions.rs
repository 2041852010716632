//! Regions definition files.
//!
//! A regions file lists named rectangles in card-local pixel coordinates. Two
//! shapes are accepted: an object carrying the card size alongside the list,
//! and a bare list without a size.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// A named rectangle on a card (x, y, width, height in card pixels).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Name used in output. Unnamed regions are called `region{index}`.
    pub fn display_name(&self, index: usize) -> String {
        if self.name.trim().is_empty() {
            format!("region{}", index)
        } else {
            self.name.clone()
        }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parsed regions definition.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionSet {
    pub regions: Vec<Region>,
    /// Card size stored in the file, if any
    pub image_size: Option<(u32, u32)>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RegionsDocument {
    Sized {
        #[serde(default)]
        image_size: Option<Value>,
        regions: Vec<Region>,
    },
    Bare(Vec<Region>),
}

#[derive(Serialize)]
struct RegionsFileOut<'a> {
    image_size: [u32; 2],
    regions: &'a [Region],
}

/// Interprets an `image_size` value. Anything but an array of at least two
/// non-negative numbers is treated as absent.
fn parse_image_size(value: &Value) -> Option<(u32, u32)> {
    let items = value.as_array()?;
    if items.len() < 2 {
        return None;
    }
    let dim = |v: &Value| -> Option<u32> {
        if let Some(n) = v.as_u64() {
            return u32::try_from(n).ok();
        }
        let f = v.as_f64()?;
        if f >= 0.0 && f <= u32::MAX as f64 {
            Some(f as u32)
        } else {
            None
        }
    };
    Some((dim(&items[0])?, dim(&items[1])?))
}

/// Parses a regions definition from JSON text.
pub fn parse_regions(json: &str) -> Result<RegionSet> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| anyhow!("Failed to parse JSON: {}", e))?;

    match serde_json::from_value::<RegionsDocument>(value) {
        Ok(RegionsDocument::Sized {
            image_size,
            regions,
        }) => Ok(RegionSet {
            regions,
            image_size: image_size.as_ref().and_then(parse_image_size),
        }),
        Ok(RegionsDocument::Bare(regions)) => Ok(RegionSet {
            regions,
            image_size: None,
        }),
        Err(_) => Err(anyhow!("Unrecognized regions JSON format")),
    }
}

/// Loads a regions definition file.
pub fn load_regions(path: &Path) -> Result<RegionSet> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read regions file: {}", path.display()))?;
    parse_regions(&contents).with_context(|| format!("Invalid regions file: {}", path.display()))
}

/// Writes regions in the sized object shape.
pub fn save_regions(path: &Path, card_size: (u32, u32), regions: &[Region]) -> Result<()> {
    let file = RegionsFileOut {
        image_size: [card_size.0, card_size.1],
        regions,
    };
    let json = serde_json::to_string_pretty(&file).context("Failed to serialize regions")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write regions file: {}", path.display()))?;
    Ok(())
}

/// Checks that every region is non-empty and fits inside one card.
pub fn validate_regions(regions: &[Region], card_width: u32, card_height: u32) -> Result<()> {
    for (i, region) in regions.iter().enumerate() {
        let name = region.display_name(i);
        if region.width == 0 || region.height == 0 {
            bail!(
                "Region {} ({}) has an empty size {}x{}",
                i,
                name,
                region.width,
                region.height
            );
        }
        if region.right() > card_width || region.bottom() > card_height {
            bail!(
                "Region {} ({}) at {},{} size {}x{} does not fit in card {}x{}",
                i,
                name,
                region.x,
                region.y,
                region.width,
                region.height,
                card_width,
                card_height
            );
        }
    }
    Ok(())
}
