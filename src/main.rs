//! Card atlas parser
//!
//! Splits a sprite-sheet of card layouts into individual cards, crops a set
//! of named regions out of each card, and optionally reads text (Tesseract)
//! and printed symbols (template matching) from every region. Results are
//! written to a single JSON summary.

mod config;
mod layout;
mod ocr;
mod paths;
mod pipeline;
mod symbols;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::config::load_config;
use crate::layout::{load_regions, save_regions, validate_regions, CardGrid};
use crate::pipeline::{resolve_card_size, RunRequest};

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    if let Some(log_path) = paths::get_log_file() {
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
        {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "card-atlas")]
#[command(version, about = "Tile a card atlas and extract text and symbols from card regions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process every card in an atlas using a regions JSON file
    Process {
        /// Path to atlas image (PNG/JPG)
        #[arg(long)]
        atlas: PathBuf,

        /// Path to regions JSON
        #[arg(long)]
        regions: PathBuf,

        /// Output directory
        #[arg(long, default_value = "out")]
        out: PathBuf,

        #[command(flatten)]
        card: CardSizeArgs,

        /// Run OCR on each region if Tesseract is available
        #[arg(long)]
        ocr: bool,

        /// Save cropped regions, OCR text files and a grid overlay
        #[arg(long)]
        save_crops: bool,

        /// Directory with symbol template images
        #[arg(long)]
        symbols_dir: Option<PathBuf>,

        /// JSON mapping template file names to symbol names/glyphs
        #[arg(long)]
        symbols_map: Option<PathBuf>,

        /// Template match threshold (0..1) [config default: 0.6]
        #[arg(long)]
        symbol_threshold: Option<f32>,

        /// Edge-match threshold for verification (0..1) [config default: 0.2]
        #[arg(long)]
        symbol_edge_threshold: Option<f32>,

        /// OCR language(s), e.g. "eng" or "eng+deu"
        #[arg(long)]
        lang: Option<String>,

        /// Tesseract page segmentation mode
        #[arg(long)]
        psm: Option<u8>,

        /// JSON config file (defaults to config.json next to the executable)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show how an atlas splits into cards
    Grid {
        /// Path to atlas image
        #[arg(long)]
        atlas: PathBuf,

        /// Regions JSON to take the card size from
        #[arg(long)]
        regions: Option<PathBuf>,

        #[command(flatten)]
        card: CardSizeArgs,
    },

    /// Validate a regions file and rewrite it with the card size embedded
    NormalizeRegions {
        /// Regions JSON to read (either format)
        #[arg(long)]
        regions: PathBuf,

        /// Where to write the normalized file
        #[arg(long)]
        output: PathBuf,

        #[command(flatten)]
        card: CardSizeArgs,
    },

    /// Download Tesseract language data and check for the executable
    SetupOcr {
        /// OCR language(s) to download
        #[arg(long, default_value = "eng")]
        lang: String,
    },
}

#[derive(Args, Debug, Clone)]
struct CardSizeArgs {
    /// Card width in pixels (used when the regions JSON has no image_size)
    #[arg(long, requires = "card_height")]
    card_width: Option<u32>,

    /// Card height in pixels (used when the regions JSON has no image_size)
    #[arg(long, requires = "card_width")]
    card_height: Option<u32>,

    /// Named card size
    #[arg(long, value_enum, conflicts_with_all = ["card_width", "card_height"])]
    preset: Option<CardPreset>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum CardPreset {
    /// Player cards, 535x752
    Player,
    /// Fortress cards, 1380x912
    Fortress,
    /// Path cards, 1380x912
    Path,
}

impl CardPreset {
    /// Card size in pixels.
    fn size(self) -> (u32, u32) {
        match self {
            CardPreset::Player => (535, 752),
            CardPreset::Fortress | CardPreset::Path => (1380, 912),
        }
    }
}

impl CardSizeArgs {
    /// Card size requested on the command line, if any.
    fn size(&self) -> Option<(u32, u32)> {
        self.preset
            .map(CardPreset::size)
            .or(self.card_width.zip(self.card_height))
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        log(&format!("[PANIC]{} {}", location, msg));
    }));
}

fn main() -> Result<()> {
    install_panic_hook();
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            atlas,
            regions,
            out,
            card,
            ocr,
            save_crops,
            symbols_dir,
            symbols_map,
            symbol_threshold,
            symbol_edge_threshold,
            lang,
            psm,
            config,
        } => {
            paths::ensure_directories(&out, false)
                .with_context(|| format!("Failed to create output directory: {}", out.display()))?;
            paths::set_log_file(&out);

            let mut config = load_config(config.as_deref())?;
            if let Some(threshold) = symbol_threshold {
                config.symbols.threshold = threshold;
            }
            if let Some(threshold) = symbol_edge_threshold {
                config.symbols.edge_threshold = threshold;
            }
            if let Some(lang) = lang {
                config.ocr.language = lang;
            }
            if let Some(psm) = psm {
                config.ocr.psm = psm;
            }

            let request = RunRequest {
                atlas,
                regions,
                out_dir: out,
                card_size: card.size(),
                ocr,
                save_crops,
                symbols_dir,
                symbols_map,
                config,
            };
            pipeline::run(&request)?;
            Ok(())
        }
        Commands::Grid {
            atlas,
            regions,
            card,
        } => show_grid(atlas, regions, card),
        Commands::NormalizeRegions {
            regions,
            output,
            card,
        } => normalize_regions(regions, output, card),
        Commands::SetupOcr { lang } => setup_ocr(&lang),
    }
}

fn show_grid(atlas: PathBuf, regions: Option<PathBuf>, card: CardSizeArgs) -> Result<()> {
    if !atlas.is_file() {
        bail!("Atlas image not found: {}", atlas.display());
    }
    let (atlas_width, atlas_height) = image::image_dimensions(&atlas)
        .with_context(|| format!("Failed to read atlas image: {}", atlas.display()))?;

    let file_size = match &regions {
        Some(path) => load_regions(path)?.image_size,
        None => None,
    };
    let card_size = resolve_card_size(file_size, card.size())?;
    let grid = CardGrid::new((atlas_width, atlas_height), card_size)?;

    println!("Atlas: {} ({}x{})", atlas.display(), atlas_width, atlas_height);
    println!("Card size: {}x{}", grid.card_width, grid.card_height);
    println!(
        "Grid: {} cols x {} rows = {} cards (max index {})",
        grid.cols,
        grid.rows,
        grid.len(),
        grid.max_index()
    );
    let unused_w = atlas_width - grid.cols * grid.card_width;
    let unused_h = atlas_height - grid.rows * grid.card_height;
    if unused_w > 0 || unused_h > 0 {
        println!("Unused margin: {}px right, {}px bottom", unused_w, unused_h);
    }
    Ok(())
}

fn normalize_regions(regions: PathBuf, output: PathBuf, card: CardSizeArgs) -> Result<()> {
    let set = load_regions(&regions)?;
    let card_size = resolve_card_size(set.image_size, card.size())?;
    validate_regions(&set.regions, card_size.0, card_size.1)?;
    save_regions(&output, card_size, &set.regions)?;
    log(&format!(
        "Wrote {} regions for {}x{} cards to {}",
        set.regions.len(),
        card_size.0,
        card_size.1,
        output.display()
    ));
    Ok(())
}

fn setup_ocr(lang: &str) -> Result<()> {
    let tessdata = ocr::ensure_tessdata(lang)?;
    log(&format!("Language data ready in {}", tessdata.display()));

    let config = config::OcrConfig {
        language: lang.to_string(),
        tessdata_dir: Some(tessdata),
        ..Default::default()
    };
    if ocr::detect_engine(&config).is_none() {
        bail!("Tesseract executable not found; install Tesseract-OCR and re-run");
    }
    Ok(())
}
