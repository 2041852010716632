use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::log;
use crate::paths::{get_data_dir, get_tessdata_dir};

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

const COMMON_EXECUTABLES: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

const COMMON_TESSDATA: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

fn local_executable() -> PathBuf {
    let name = if cfg!(windows) {
        "tesseract.exe"
    } else {
        "tesseract"
    };
    get_data_dir().join(name)
}

/// Splits a language spec like `eng+deu` into traineddata file names.
pub fn traineddata_files(language: &str) -> Vec<String> {
    language
        .split('+')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| format!("{}.traineddata", l))
        .collect()
}

fn has_traineddata(dir: &Path, language: &str) -> bool {
    let files = traineddata_files(language);
    !files.is_empty() && files.iter().all(|f| dir.join(f).exists())
}

fn runs_version(exe: &Path) -> bool {
    Command::new(exe)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Finds the Tesseract executable: configured path, local install, PATH, then common paths.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if runs_version(path) {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!(
            "Configured Tesseract executable does not run: {}",
            path.display()
        ));
    }

    let local_exe = local_executable();
    if local_exe.exists() && runs_version(&local_exe) {
        return Ok(local_exe);
    }

    let on_path = PathBuf::from("tesseract");
    if runs_version(&on_path) {
        return Ok(on_path);
    }

    for path in COMMON_EXECUTABLES {
        let p = PathBuf::from(path);
        if p.exists() && runs_version(&p) {
            return Ok(p);
        }
    }

    Err(anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory holding the requested language(s).
///
/// Returns `None` when nothing is found, in which case Tesseract falls back
/// to its compiled-in default location.
pub fn find_tessdata_dir(configured: Option<&Path>, language: &str) -> Option<PathBuf> {
    if let Some(dir) = configured {
        return Some(dir.to_path_buf());
    }

    let local = get_tessdata_dir();
    if has_traineddata(&local, language) {
        return Some(local);
    }

    for path in COMMON_TESSDATA {
        let p = PathBuf::from(path);
        if has_traineddata(&p, language) {
            return Some(p);
        }
    }

    // Check TESSDATA_PREFIX environment variable
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if has_traineddata(&p, language) {
            return Some(p);
        }
        let p = p.join("tessdata");
        if has_traineddata(&p, language) {
            return Some(p);
        }
    }

    None
}

/// Downloads trained data for every requested language into the local tessdata dir.
///
/// Files already present are left alone. Returns the tessdata directory.
pub fn ensure_tessdata(language: &str) -> Result<PathBuf> {
    let tessdata_dir = get_tessdata_dir();
    fs::create_dir_all(&tessdata_dir).with_context(|| {
        format!(
            "Failed to create tessdata directory: {}",
            tessdata_dir.display()
        )
    })?;

    let files = traineddata_files(language);
    if files.is_empty() {
        return Err(anyhow!("No OCR language given"));
    }

    for file in files {
        let target = tessdata_dir.join(&file);
        if target.exists() {
            log(&format!("{} already present", target.display()));
            continue;
        }
        download_traineddata(&file, &target)?;
    }

    Ok(tessdata_dir)
}

fn download_traineddata(file: &str, target: &Path) -> Result<()> {
    let url = format!("{}/{}", TESSDATA_REPO, file);
    log(&format!("Downloading {}...", url));

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "card-atlas")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            file,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut out = fs::File::create(target)
        .with_context(|| format!("Failed to create {}", target.display()))?;
    out.write_all(&bytes)?;

    log(&format!("Downloaded {} ({} bytes)", file, bytes.len()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_traineddata_files() {
        assert_eq!(traineddata_files("eng"), vec!["eng.traineddata"]);
        assert_eq!(
            traineddata_files("eng+deu"),
            vec!["eng.traineddata", "deu.traineddata"]
        );
        assert!(traineddata_files("").is_empty());
    }

    #[test]
    fn test_has_traineddata_requires_all_languages() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("eng.traineddata"), b"x").unwrap();

        assert!(has_traineddata(dir.path(), "eng"));
        assert!(!has_traineddata(dir.path(), "eng+deu"));
        assert!(!has_traineddata(dir.path(), ""));
    }

    #[test]
    fn test_configured_tessdata_wins() {
        let dir = tempdir().unwrap();
        let found = find_tessdata_dir(Some(dir.path()), "eng");
        assert_eq!(found.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_missing_configured_executable_is_error() {
        let dir = tempdir().unwrap();
        let bogus = dir.path().join("no-such-tesseract");
        assert!(find_tesseract_executable(Some(bogus.as_path())).is_err());
    }
}
