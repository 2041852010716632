//! Atlas processing: tile the atlas, crop every region of every card, extract
//! content, and collect everything into one summary document.

pub mod artifacts;
pub mod summary;

pub use summary::{write_summary, AtlasSummary, CardResult, RegionResult};

use anyhow::{anyhow, bail, Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};

use crate::config::AtlasConfig;
use crate::layout::{
    crop_absolute, load_regions, validate_regions, CardCell, CardGrid, Region,
};
use crate::log;
use crate::ocr::preprocess::to_grayscale;
use crate::ocr::{detect_engine, merge_text, prepare_for_ocr, TextRecognizer};
use crate::paths;
use crate::symbols::{build_matcher, RegionRef, SymbolMatcher};
use artifacts::{artifact_stem, save_grid_overlay, save_region_artifacts};

/// Everything needed for one run.
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub atlas: PathBuf,
    pub regions: PathBuf,
    pub out_dir: PathBuf,
    /// Card size given on the command line (explicit size or preset)
    pub card_size: Option<(u32, u32)>,
    pub ocr: bool,
    pub save_crops: bool,
    pub symbols_dir: Option<PathBuf>,
    pub symbols_map: Option<PathBuf>,
    pub config: AtlasConfig,
}

/// Content extractors applied to every region. Each is optional.
pub struct Extractors<'a> {
    pub ocr: Option<&'a dyn TextRecognizer>,
    pub symbols: Option<&'a SymbolMatcher>,
    pub binarize_threshold: Option<u8>,
}

/// Picks the card size: the regions file wins, then the command line.
pub fn resolve_card_size(
    from_file: Option<(u32, u32)>,
    from_cli: Option<(u32, u32)>,
) -> Result<(u32, u32)> {
    match (from_file, from_cli) {
        (Some(file), Some(cli)) if file != cli => {
            log(&format!(
                "Warning: regions file card size {}x{} overrides command line {}x{}",
                file.0, file.1, cli.0, cli.1
            ));
            Ok(file)
        }
        (Some(file), _) => Ok(file),
        (None, Some(cli)) => Ok(cli),
        (None, None) => Err(anyhow!(
            "Card size not found in regions JSON; provide --card-width and --card-height or --preset"
        )),
    }
}

/// Processes one region of one card. Extraction failures are logged and
/// leave the corresponding part of the result empty.
pub fn process_region(
    atlas: &RgbaImage,
    cell: &CardCell,
    region_index: usize,
    region: &Region,
    extractors: &Extractors<'_>,
) -> Result<(RegionResult, RgbaImage)> {
    let name = region.display_name(region_index);
    let (x_abs, y_abs) = cell.absolute(region);
    let crop = crop_absolute(atlas, x_abs, y_abs, region.width, region.height);

    let ocr = extractors.ocr.and_then(|engine| {
        let prepared = prepare_for_ocr(&crop, extractors.binarize_threshold);
        match engine.recognize(&prepared) {
            Ok(text) => Some(text),
            Err(e) => {
                log(&format!(
                    "OCR failed for card {} region {} ({}): {:#}",
                    cell.index, region_index, name, e
                ));
                None
            }
        }
    });

    let symbols = match extractors.symbols {
        Some(matcher) => matcher.match_region(
            &to_grayscale(&crop),
            RegionRef {
                card_index: cell.index,
                region_index,
                name: &name,
            },
        ),
        None => Vec::new(),
    };

    let text = merge_text(ocr.as_ref().map(|o| o.text.as_str()), &symbols)?;

    let result = RegionResult {
        region_index,
        name,
        x: region.x,
        y: region.y,
        w: region.width,
        h: region.height,
        x_abs,
        y_abs,
        text,
        confidence: ocr.and_then(|o| o.confidence),
        symbols,
    };
    Ok((result, crop))
}

/// Runs every region of every card through the extractors.
///
/// When `crops_dir` is set, each crop (and its text) is saved there.
pub fn process_atlas(
    atlas_path: &Path,
    atlas: &RgbaImage,
    grid: &CardGrid,
    regions: &[Region],
    extractors: &Extractors<'_>,
    crops_dir: Option<&Path>,
) -> Result<AtlasSummary> {
    let mut summary = AtlasSummary::new(atlas_path, grid);

    for cell in grid.cells() {
        let mut card = CardResult {
            card_index: cell.index,
            col: cell.col,
            row: cell.row,
            regions: Vec::with_capacity(regions.len()),
        };

        for (i, region) in regions.iter().enumerate() {
            let (result, crop) = process_region(atlas, &cell, i, region, extractors)?;

            if let Some(dir) = crops_dir {
                let stem = artifact_stem(&result.name, cell.index, i);
                if let Some(path) = save_region_artifacts(dir, &stem, &crop, &result.text) {
                    log(&format!(
                        "Saved crop: {} ({}x{} @ {},{})",
                        path.display(),
                        result.w,
                        result.h,
                        result.x_abs,
                        result.y_abs
                    ));
                }
            }

            card.regions.push(result);
        }

        summary.cards.push(card);
    }

    Ok(summary)
}

/// Full run: load inputs, process the atlas, write the summary.
///
/// Returns the path of the written summary.
pub fn run(request: &RunRequest) -> Result<PathBuf> {
    if !request.atlas.is_file() {
        bail!("Atlas image not found: {}", request.atlas.display());
    }
    if !request.regions.is_file() {
        bail!("Regions JSON not found: {}", request.regions.display());
    }

    let region_set = load_regions(&request.regions)?;
    let atlas = image::open(&request.atlas)
        .with_context(|| format!("Failed to open atlas image: {}", request.atlas.display()))?
        .to_rgba8();

    let card_size = resolve_card_size(region_set.image_size, request.card_size)?;
    let grid = CardGrid::new(atlas.dimensions(), card_size)?;
    validate_regions(&region_set.regions, grid.card_width, grid.card_height)?;

    paths::ensure_directories(&request.out_dir, request.save_crops).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            request.out_dir.display()
        )
    })?;

    let engine = if request.ocr {
        detect_engine(&request.config.ocr)
    } else {
        None
    };
    let matcher = build_matcher(
        request.symbols_dir.as_deref(),
        request.symbols_map.as_deref(),
        &request.config.symbols,
    );
    if let Some(matcher) = &matcher {
        log(&format!("Symbol detection enabled with {} templates", matcher.len()));
    }

    let extractors = Extractors {
        ocr: engine.as_ref().map(|e| e as &dyn TextRecognizer),
        symbols: matcher.as_ref(),
        binarize_threshold: request.config.ocr.binarize_threshold,
    };

    log(&format!(
        "Processing atlas {} ({}x{}), card size {}x{} => {} cols x {} rows = {} cards, {} regions each",
        request.atlas.display(),
        grid.atlas_width,
        grid.atlas_height,
        grid.card_width,
        grid.card_height,
        grid.cols,
        grid.rows,
        grid.len(),
        region_set.regions.len()
    ));

    let crops_dir = request
        .save_crops
        .then(|| paths::get_crops_dir(&request.out_dir));
    let summary = process_atlas(
        &request.atlas,
        &atlas,
        &grid,
        &region_set.regions,
        &extractors,
        crops_dir.as_deref(),
    )?;

    if let Some(dir) = &crops_dir {
        save_grid_overlay(dir, &atlas, &grid, &region_set.regions);
    }

    let summary_path = paths::get_summary_path(&request.out_dir);
    write_summary(&summary, &summary_path)?;
    log(&format!("Wrote summary: {}", summary_path.display()));

    Ok(summary_path)
}
