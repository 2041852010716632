//! Multi-scale template matching with edge confirmation.
//!
//! Each template is tried at a few scales against the region crop. A symbol
//! is accepted only if both the intensity correlation and the correlation of
//! the Canny edge maps clear their thresholds.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::edges::canny;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::correlation::Correlator;
use super::templates::SymbolTemplate;
use crate::config::SymbolConfig;
use crate::log;

/// A symbol found in a region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub name: Option<String>,
    pub glyph: Option<String>,
    pub token: Option<String>,
    /// Best intensity correlation across scales
    pub score: f32,
    /// Best edge-map correlation across scales
    pub edge_score: f32,
}

impl SymbolMatch {
    /// Identity used for de-duplication: name, else token, else glyph.
    pub fn key(&self) -> &str {
        self.name
            .as_deref()
            .or(self.token.as_deref())
            .or(self.glyph.as_deref())
            .unwrap_or("")
    }

    /// Text inserted into region output: glyph, else token, else name.
    pub fn display_glyph(&self) -> Option<&str> {
        self.glyph
            .as_deref()
            .or(self.token.as_deref())
            .or(self.name.as_deref())
    }
}

/// Where a crop came from, for log messages.
#[derive(Clone, Copy, Debug)]
pub struct RegionRef<'a> {
    pub card_index: u32,
    pub region_index: usize,
    pub name: &'a str,
}

/// Best scores of one template against one crop.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TemplateScore {
    pub score: f32,
    pub edge_score: f32,
}

pub struct SymbolMatcher {
    templates: Vec<SymbolTemplate>,
    config: SymbolConfig,
}

impl SymbolMatcher {
    pub fn new(templates: Vec<SymbolTemplate>, config: SymbolConfig) -> Self {
        Self { templates, config }
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Scores a template against a prepared crop at every configured scale.
    ///
    /// Intensity and edge scores are maximised independently. Scales that
    /// shrink the template below the minimum side or grow it past the crop
    /// are skipped.
    pub fn score_template(
        &self,
        crop: &Correlator,
        crop_edges: &Correlator,
        template: &GrayImage,
    ) -> TemplateScore {
        let (tw, th) = template.dimensions();
        let (cw, ch) = crop.dimensions();
        let mut best = TemplateScore::default();

        for &scale in &self.config.scales {
            let new_w = (tw as f32 * scale).round() as u32;
            let new_h = (th as f32 * scale).round() as u32;
            if new_w < self.config.min_template_side || new_h < self.config.min_template_side {
                continue;
            }
            if new_w > cw || new_h > ch {
                continue;
            }

            let resized = if (new_w, new_h) == (tw, th) {
                template.clone()
            } else {
                imageops::resize(template, new_w, new_h, FilterType::Triangle)
            };

            let Some(score) = crop.best(&resized) else {
                continue;
            };

            let template_edges = canny(&resized, self.config.canny_low, self.config.canny_high);
            let edge_score = if template_edges.pixels().all(|p| p[0] == 0) {
                0.0
            } else {
                crop_edges.best(&template_edges).unwrap_or(0.0)
            };

            best.score = best.score.max(score);
            best.edge_score = best.edge_score.max(edge_score);
        }

        best
    }

    /// Finds all symbols in a grayscale region crop.
    ///
    /// Results are de-duplicated by [`SymbolMatch::key`], keeping the best
    /// score, and sorted by score descending.
    pub fn match_region(&self, crop: &GrayImage, at: RegionRef<'_>) -> Vec<SymbolMatch> {
        if self.templates.is_empty() {
            return Vec::new();
        }

        let crop_edges = canny(crop, self.config.canny_low, self.config.canny_high);
        let crop_edges = Correlator::new(&crop_edges);
        let crop = Correlator::new(crop);
        let mut matches = Vec::new();

        for template in &self.templates {
            let best = self.score_template(&crop, &crop_edges, &template.image);
            let label = template
                .meta
                .name
                .as_deref()
                .unwrap_or(template.filename.as_str());

            if best.score >= self.config.threshold && best.edge_score >= self.config.edge_threshold
            {
                log(&format!(
                    "Detected symbol '{}' on card {} region {} ({}) (score={:.3}, edge={:.3})",
                    label, at.card_index, at.region_index, at.name, best.score, best.edge_score
                ));
                matches.push(SymbolMatch {
                    name: template.meta.name.clone(),
                    glyph: template.meta.glyph.clone(),
                    token: template.meta.token.clone(),
                    score: best.score,
                    edge_score: best.edge_score,
                });
            } else if best.score >= self.config.threshold {
                log(&format!(
                    "Rejected symbol '{}' on card {} region {} ({}): color={:.3} edge={:.3} (<edge threshold {})",
                    label,
                    at.card_index,
                    at.region_index,
                    at.name,
                    best.score,
                    best.edge_score,
                    self.config.edge_threshold
                ));
            }
        }

        dedupe_matches(matches)
    }
}

/// Keeps the highest-scoring match per key and sorts by score descending.
///
/// Equal scores keep the order in which keys were first seen.
pub fn dedupe_matches(matches: Vec<SymbolMatch>) -> Vec<SymbolMatch> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<SymbolMatch> = Vec::new();
    for m in matches {
        match slots.get(m.key()) {
            Some(&i) => {
                if m.score > unique[i].score {
                    unique[i] = m;
                }
            }
            None => {
                slots.insert(m.key().to_string(), unique.len());
                unique.push(m);
            }
        }
    }

    unique.sort_by(|a, b| b.score.total_cmp(&a.score));
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::templates::SymbolMeta;
    use image::Luma;

    const AT: RegionRef<'static> = RegionRef {
        card_index: 0,
        region_index: 0,
        name: "test",
    };

    /// 48x48 black crop with a white 12x12 square at (18, 18).
    fn square_crop() -> GrayImage {
        GrayImage::from_fn(48, 48, |x, y| {
            if (18..30).contains(&x) && (18..30).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn template(name: &str, glyph: &str, image: GrayImage) -> SymbolTemplate {
        SymbolTemplate {
            filename: format!("{}.png", name),
            meta: SymbolMeta {
                name: Some(name.to_string()),
                glyph: Some(glyph.to_string()),
                token: None,
            },
            image,
        }
    }

    fn found(name: &str, score: f32) -> SymbolMatch {
        SymbolMatch {
            name: Some(name.to_string()),
            glyph: None,
            token: None,
            score,
            edge_score: 0.5,
        }
    }

    #[test]
    fn test_detects_embedded_symbol() {
        let crop = square_crop();
        let tpl = imageops::crop_imm(&crop, 12, 12, 24, 24).to_image();
        let matcher = SymbolMatcher::new(vec![template("square", "■", tpl)], SymbolConfig::default());

        let matches = matcher.match_region(&crop, AT);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name.as_deref(), Some("square"));
        assert!(matches[0].score > 0.99, "score {}", matches[0].score);
        assert!(matches[0].edge_score >= 0.2, "edge {}", matches[0].edge_score);
    }

    #[test]
    fn test_flat_crop_has_no_symbols() {
        let tpl = imageops::crop_imm(&square_crop(), 12, 12, 24, 24).to_image();
        let matcher = SymbolMatcher::new(vec![template("square", "■", tpl)], SymbolConfig::default());

        let flat = GrayImage::from_pixel(48, 48, Luma([90]));
        assert!(matcher.match_region(&flat, AT).is_empty());
    }

    #[test]
    fn test_oversized_and_tiny_scales_skipped() {
        let matcher = SymbolMatcher::new(Vec::new(), SymbolConfig::default());
        let crop = square_crop();
        let edges = Correlator::new(&canny(&crop, 50.0, 150.0));
        let crop = Correlator::new(&crop);

        let too_big = GrayImage::from_pixel(70, 70, Luma([255]));
        assert_eq!(matcher.score_template(&crop, &edges, &too_big), TemplateScore::default());

        let too_small = GrayImage::from_pixel(2, 2, Luma([255]));
        assert_eq!(matcher.score_template(&crop, &edges, &too_small), TemplateScore::default());
    }

    #[test]
    fn test_no_templates_no_work() {
        let matcher = SymbolMatcher::new(Vec::new(), SymbolConfig::default());
        assert!(matcher.is_empty());
        assert!(matcher.match_region(&square_crop(), AT).is_empty());
    }

    #[test]
    fn test_dedupe_keeps_best_and_sorts() {
        let matches = vec![
            found("sword", 0.7),
            found("shield", 0.9),
            found("sword", 0.8),
            found("eye", 0.65),
        ];

        let unique = dedupe_matches(matches);

        let names: Vec<&str> = unique.iter().map(|m| m.key()).collect();
        assert_eq!(names, vec!["shield", "sword", "eye"]);
        assert_eq!(unique[1].score, 0.8);
    }

    #[test]
    fn test_dedupe_ties_keep_first_seen_order() {
        let matches = vec![
            found("zeta", 0.7),
            found("alpha", 0.7),
            found("mid", 0.9),
            found("zeta", 0.7),
        ];

        let unique = dedupe_matches(matches);

        let names: Vec<&str> = unique.iter().map(|m| m.key()).collect();
        assert_eq!(names, vec!["mid", "zeta", "alpha"]);
    }

    #[test]
    fn test_templates_tried_in_given_order() {
        let crop = square_crop();
        let tpl = imageops::crop_imm(&crop, 12, 12, 24, 24).to_image();
        let templates = vec![
            SymbolTemplate {
                filename: "b.png".to_string(),
                meta: SymbolMeta {
                    name: None,
                    glyph: Some("B".to_string()),
                    token: None,
                },
                image: tpl.clone(),
            },
            SymbolTemplate {
                filename: "a.png".to_string(),
                meta: SymbolMeta {
                    name: None,
                    glyph: Some("A".to_string()),
                    token: None,
                },
                image: tpl,
            },
        ];
        let matcher = SymbolMatcher::new(templates, SymbolConfig::default());

        let glyphs: Vec<String> = matcher
            .match_region(&crop, AT)
            .into_iter()
            .filter_map(|m| m.glyph)
            .collect();
        assert_eq!(glyphs, vec!["B", "A"]);
    }

    #[test]
    fn test_key_and_glyph_fallbacks() {
        let m = SymbolMatch {
            name: None,
            glyph: Some("⚔".to_string()),
            token: Some("[sword]".to_string()),
            score: 1.0,
            edge_score: 1.0,
        };
        assert_eq!(m.key(), "[sword]");
        assert_eq!(m.display_glyph(), Some("⚔"));
    }
}
