//! Merging OCR text with detected symbol glyphs.

use anyhow::Result;
use regex::Regex;
use std::collections::HashSet;

use crate::symbols::SymbolMatch;

/// Control characters stripped from OCR output before merging
const CONTROL_PATTERN: &str = r"[\x00-\x1F\x7F]+";

/// Below this many ASCII letters/digits the OCR text is considered noise
const MIN_ALNUM: usize = 2;

/// Noise text at most this long is dropped in favour of glyphs
const MAX_NOISE_LEN: usize = 3;

/// Removes control characters (including newlines) from text.
pub fn strip_control(text: &str) -> Result<String> {
    let control_regex = Regex::new(CONTROL_PATTERN)?;
    Ok(control_regex.replace_all(text, "").into_owned())
}

/// Counts ASCII letters and digits.
pub fn alnum_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_alphanumeric()).count()
}

/// Glyph strings for a set of matches, first occurrence kept.
pub fn glyph_list(matches: &[SymbolMatch]) -> Vec<String> {
    let mut seen = HashSet::new();
    matches
        .iter()
        .filter_map(|m| m.display_glyph())
        .filter(|g| !g.is_empty())
        .filter(|g| seen.insert(g.to_string()))
        .map(str::to_string)
        .collect()
}

/// Builds the final region text from OCR output and symbol matches.
///
/// Without matches this is the trimmed OCR text. With matches the glyphs are
/// appended, and OCR text that is mostly noise is replaced by the glyphs.
pub fn merge_text(ocr_text: Option<&str>, matches: &[SymbolMatch]) -> Result<String> {
    let base = ocr_text.map(str::trim).unwrap_or("").to_string();
    if matches.is_empty() {
        return Ok(base);
    }

    let glyphs = glyph_list(matches).join(" ");
    let cleaned = strip_control(&base)?;
    let alnum = alnum_count(&cleaned);

    let merged = if alnum < MIN_ALNUM && cleaned.trim().is_empty() {
        glyphs
    } else if alnum < MIN_ALNUM && cleaned.chars().count() <= MAX_NOISE_LEN {
        glyphs
    } else if glyphs.is_empty() {
        cleaned
    } else {
        format!("{} {}", cleaned, glyphs).trim().to_string()
    };
    Ok(merged)
}
