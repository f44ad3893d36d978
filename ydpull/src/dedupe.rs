use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Suffixes treated as images, compared case-insensitively.
const IMAGE_SUFFIXES: [&str; 7] = ["png", "jpg", "jpeg", "gif", "bmp", "webp", "svg"];

#[derive(Debug, Error)]
pub enum DedupeError {
    #[error("source directory not found: {0}")]
    MissingSource(PathBuf),
    #[error("no images under {0}")]
    Empty(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DedupeReport {
    /// Files seen by the walk, images or not.
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
}

/// Copies every image under `source` into `output` under its content-MD5
/// name, keeping the relative directory layout. Two files with the same
/// bytes land on the same name, so the second one is skipped. Per-file
/// failures are logged and the walk continues; a tree that yields no
/// images at all is an error.
pub fn dedupe_images(source: &Path, output: &Path) -> Result<DedupeReport, DedupeError> {
    if !source.is_dir() {
        return Err(DedupeError::MissingSource(source.to_path_buf()));
    }
    std::fs::create_dir_all(output)?;

    let mut report = DedupeReport::default();
    for entry in WalkDir::new(source) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "unreadable entry left out of the walk");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        report.total += 1;
        let Some(suffix) = entry.path().extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let suffix = suffix.to_ascii_lowercase();
        if !IMAGE_SUFFIXES.contains(&suffix.as_str()) {
            continue;
        }
        if let Err(err) = copy_under_hash(entry.path(), source, output, &suffix, &mut report) {
            warn!(path = %entry.path().display(), error = %err, "copy failed; continuing");
        }
    }
    if report.processed == 0 && report.skipped == 0 {
        return Err(DedupeError::Empty(source.to_path_buf()));
    }
    Ok(report)
}

fn copy_under_hash(
    file: &Path,
    source: &Path,
    output: &Path,
    suffix: &str,
    report: &mut DedupeReport,
) -> std::io::Result<()> {
    let body = std::fs::read(file)?;
    let hashed_name = format!("{:x}.{suffix}", md5::compute(&body));

    let relative = file.strip_prefix(source).unwrap_or(file);
    let target_dir = match relative.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => output.join(parent),
        _ => output.to_path_buf(),
    };
    std::fs::create_dir_all(&target_dir)?;

    let target = target_dir.join(&hashed_name);
    if target.exists() {
        info!(from = %relative.display(), to = %hashed_name, "skip: content already present");
        report.skipped += 1;
    } else {
        std::fs::copy(file, &target)?;
        info!(from = %relative.display(), to = %hashed_name, "copied under content hash");
        report.processed += 1;
    }
    Ok(())
}
