use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();
static LOG_FILE: OnceLock<PathBuf> = OnceLock::new();

/// File name of the summary document written into the output directory.
pub const SUMMARY_FILE: &str = "cards_summary.json";

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<out>/logs/`
pub fn get_logs_dir(out_dir: &Path) -> PathBuf {
    out_dir.join("logs")
}

/// Returns the debug artifacts directory: `<out>/crops/`
pub fn get_crops_dir(out_dir: &Path) -> PathBuf {
    out_dir.join("crops")
}

/// Returns the summary path: `<out>/cards_summary.json`
pub fn get_summary_path(out_dir: &Path) -> PathBuf {
    out_dir.join(SUMMARY_FILE)
}

/// Returns the per-user data directory used for a local Tesseract install.
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("card-atlas")
}

/// Returns the per-user tessdata directory: `<data_dir>/tessdata/`
pub fn get_tessdata_dir() -> PathBuf {
    get_data_dir().join("tessdata")
}

/// Routes log output to `<out>/logs/card_atlas.log`. Only the first call wins.
pub fn set_log_file(out_dir: &Path) {
    let _ = LOG_FILE.set(get_logs_dir(out_dir).join("card_atlas.log"));
}

/// Returns the active log file, if one has been set.
pub fn get_log_file() -> Option<&'static PathBuf> {
    LOG_FILE.get()
}

/// Ensures the output directories exist. Call before writing anything.
pub fn ensure_directories(out_dir: &Path, with_crops: bool) -> std::io::Result<()> {
    std::fs::create_dir_all(out_dir)?;
    std::fs::create_dir_all(get_logs_dir(out_dir))?;
    if with_crops {
        std::fs::create_dir_all(get_crops_dir(out_dir))?;
    }
    Ok(())
}
