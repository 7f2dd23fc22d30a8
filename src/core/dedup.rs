use crate::core::config::{ConfigError, DedupConfig};
use crate::core::differ::{DiffError, FrameDiffer};
use crate::core::loader::{load_folder, Frame, LoadError, RejectReason, Rejection};
use crate::core::progress::{Phase, Progress, ProgressCallback};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Diff error: {0}")]
    Diff(#[from] DiffError),
}

/// Which check caught a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPath {
    PreviousFrame,
    UniqueSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Unique,
    Duplicate { of: String, via: MatchPath },
    Rejected { reason: RejectReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub filename: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Minimum contour area used for the run.
    pub tolerance: u32,
    pub unique: Vec<String>,
    pub duplicate: Vec<String>,
    pub rejected: Vec<Rejection>,
    pub records: Vec<ClassificationRecord>,
    /// Number of frame comparisons performed.
    pub comparisons: usize,
    /// Source paths of the unique frames, parallel to `unique`. Kept out of
    /// the JSON report since paths need not be valid UTF-8.
    #[serde(skip)]
    pub unique_paths: Vec<PathBuf>,
}

impl ClassificationReport {
    fn new(tolerance: u32) -> Self {
        Self {
            tolerance,
            unique: Vec::new(),
            duplicate: Vec::new(),
            rejected: Vec::new(),
            records: Vec::new(),
            comparisons: 0,
            unique_paths: Vec::new(),
        }
    }

    pub fn verdict_for(&self, filename: &str) -> Option<&Verdict> {
        self.records
            .iter()
            .find(|record| record.filename == filename)
            .map(|record| &record.verdict)
    }

    /// Fold loader rejections into the report, keeping records in file order.
    pub fn absorb_rejections(&mut self, rejected: Vec<Rejection>) {
        for rejection in &rejected {
            self.records.push(ClassificationRecord {
                filename: rejection.filename.clone(),
                verdict: Verdict::Rejected {
                    reason: rejection.reason.clone(),
                },
            });
        }
        self.records.sort_by(|a, b| a.filename.cmp(&b.filename));
        self.rejected.extend(rejected);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome {
    /// The folder contained no files at all.
    EmptyFolder,
    /// Files were present but none survived extension, decode and size checks.
    NoEligibleFiles { rejected: Vec<Rejection> },
    Classified(ClassificationReport),
}

impl DedupOutcome {
    pub fn report(&self) -> Option<&ClassificationReport> {
        match self {
            DedupOutcome::Classified(report) => Some(report),
            _ => None,
        }
    }

    pub fn unique(&self) -> &[String] {
        self.report().map(|r| r.unique.as_slice()).unwrap_or(&[])
    }

    pub fn unique_paths(&self) -> &[PathBuf] {
        self.report()
            .map(|r| r.unique_paths.as_slice())
            .unwrap_or(&[])
    }

    pub fn rejected(&self) -> &[Rejection] {
        match self {
            DedupOutcome::EmptyFolder => &[],
            DedupOutcome::NoEligibleFiles { rejected } => rejected,
            DedupOutcome::Classified(report) => &report.rejected,
        }
    }

    /// Rejections whose reason has the given label (`corrupt`, `undersized`, ...).
    pub fn count_rejected(&self, label: &str) -> usize {
        self.rejected()
            .iter()
            .filter(|r| r.reason.label() == label)
            .count()
    }
}

pub struct Deduplicator {
    differ: FrameDiffer,
    config: DedupConfig,
    tolerance: u32,
}

impl Deduplicator {
    pub fn new(tolerance: u32) -> Self {
        Self {
            differ: FrameDiffer::new(),
            config: DedupConfig::default(),
            tolerance,
        }
    }

    pub fn with_config(config: DedupConfig, tolerance: u32) -> Result<Self, ConfigError> {
        Ok(Self {
            differ: FrameDiffer::from_config(&config)?,
            config,
            tolerance,
        })
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn tolerance(&self) -> u32 {
        self.tolerance
    }

    pub fn classify(&self, frames: &[Frame]) -> Result<ClassificationReport, DiffError> {
        self.classify_with_progress(frames, None)
    }

    /// Single pass over `frames` in order. Each frame is checked against its
    /// predecessor first, then against every frame accepted so far; the first
    /// zero score marks it a duplicate.
    pub fn classify_with_progress(
        &self,
        frames: &[Frame],
        progress_callback: Option<&ProgressCallback>,
    ) -> Result<ClassificationReport, DiffError> {
        let smoothed: Vec<GrayImage> = frames
            .iter()
            .map(|frame| self.differ.preprocess(&frame.image))
            .collect();

        let mut report = ClassificationReport::new(self.tolerance);
        let mut unique_indices: Vec<usize> = Vec::new();

        for (index, frame) in frames.iter().enumerate() {
            let verdict = self.judge(index, frames, &smoothed, &unique_indices, &mut report)?;

            match &verdict {
                Verdict::Unique => {
                    unique_indices.push(index);
                    report.unique.push(frame.filename.clone());
                    report.unique_paths.push(frame.path.clone());
                }
                Verdict::Duplicate { of, via } => {
                    log::debug!("{} duplicates {} ({:?})", frame.filename, of, via);
                    report.duplicate.push(frame.filename.clone());
                }
                Verdict::Rejected { .. } => {}
            }
            report.records.push(ClassificationRecord {
                filename: frame.filename.clone(),
                verdict,
            });

            if let Some(callback) = progress_callback {
                callback(&Progress {
                    phase: Phase::Classifying,
                    processed: index + 1,
                    total: frames.len(),
                    current_file: frame.filename.clone(),
                });
            }
        }

        log::info!(
            "Found {} unique frames out of {} ({} comparisons)",
            report.unique.len(),
            frames.len(),
            report.comparisons
        );

        Ok(report)
    }

    fn judge(
        &self,
        index: usize,
        frames: &[Frame],
        smoothed: &[GrayImage],
        unique_indices: &[usize],
        report: &mut ClassificationReport,
    ) -> Result<Verdict, DiffError> {
        let current = &smoothed[index];

        if index > 0 {
            report.comparisons += 1;
            let previous = index - 1;
            if self
                .differ
                .score_preprocessed(current, &smoothed[previous], self.tolerance)?
                .is_duplicate()
            {
                return Ok(Verdict::Duplicate {
                    of: frames[previous].filename.clone(),
                    via: MatchPath::PreviousFrame,
                });
            }
        }

        for &candidate in unique_indices {
            report.comparisons += 1;
            if self
                .differ
                .score_preprocessed(current, &smoothed[candidate], self.tolerance)?
                .is_duplicate()
            {
                return Ok(Verdict::Duplicate {
                    of: frames[candidate].filename.clone(),
                    via: MatchPath::UniqueSet,
                });
            }
        }

        Ok(Verdict::Unique)
    }

    /// Load `dir` and classify everything that survives pre-filtering.
    pub fn run_folder(
        &self,
        dir: &Path,
        progress_callback: Option<&ProgressCallback>,
    ) -> Result<DedupOutcome, DedupError> {
        let loaded = load_folder(dir, &self.config, progress_callback)?;

        if loaded.total_files == 0 {
            log::warn!("The image folder is empty: {}", dir.display());
            return Ok(DedupOutcome::EmptyFolder);
        }

        if loaded.frames.is_empty() {
            log::warn!(
                "No eligible {} files found in {}",
                self.config.extensions.join("/"),
                dir.display()
            );
            return Ok(DedupOutcome::NoEligibleFiles {
                rejected: loaded.rejected,
            });
        }

        let mut report = self.classify_with_progress(&loaded.frames, progress_callback)?;
        report.absorb_rejections(loaded.rejected);
        Ok(DedupOutcome::Classified(report))
    }
}
