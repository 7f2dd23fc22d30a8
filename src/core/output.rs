use crate::core::config::DedupConfig;
use crate::core::dedup::{ClassificationReport, DedupOutcome};
use crate::core::loader::Rejection;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid path: {path}")]
    InvalidPath { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    EmptyFolder,
    NoEligibleFiles,
    Classified,
}

/// JSON document written by `--report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub folder: PathBuf,
    pub status: RunStatus,
    pub config: DedupConfig,
    pub rejected: Vec<Rejection>,
    pub classification: Option<ClassificationReport>,
}

impl RunReport {
    pub fn from_outcome(folder: &Path, config: &DedupConfig, outcome: &DedupOutcome) -> Self {
        let status = match outcome {
            DedupOutcome::EmptyFolder => RunStatus::EmptyFolder,
            DedupOutcome::NoEligibleFiles { .. } => RunStatus::NoEligibleFiles,
            DedupOutcome::Classified(_) => RunStatus::Classified,
        };

        Self {
            generated_at: Utc::now(),
            folder: folder.to_path_buf(),
            status,
            config: config.clone(),
            rejected: outcome.rejected().to_vec(),
            classification: outcome.report().cloned(),
        }
    }
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

/// Remove and recreate `<dir>/<output_dir_name>`.
pub fn prepare_output_dir(dir: &Path, config: &DedupConfig) -> Result<PathBuf, OutputError> {
    let output_dir = dir.join(&config.output_dir_name);
    if output_dir.exists() {
        fs::remove_dir_all(&output_dir)?;
    }
    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

/// Re-encode each unique source image into a fresh output folder under
/// `dir`, keeping its original file name byte for byte. Returns the output
/// folder.
pub fn write_unique_images(
    dir: &Path,
    unique: &[PathBuf],
    config: &DedupConfig,
) -> Result<PathBuf, OutputError> {
    let output_dir = prepare_output_dir(dir, config)?;

    for source in unique {
        let name = source.file_name().ok_or_else(|| OutputError::InvalidPath {
            path: source.to_string_lossy().to_string(),
        })?;
        let image = image::open(source)?;
        let dest = output_dir.join(name);
        encode_for(&dest, image).save(&dest)?;
        log::debug!("Wrote {}", dest.display());
    }

    Ok(output_dir)
}

// JPEG has no alpha channel.
fn encode_for(dest: &Path, image: DynamicImage) -> DynamicImage {
    let is_jpeg = dest
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false);

    if is_jpeg && image.color().has_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image
    }
}
