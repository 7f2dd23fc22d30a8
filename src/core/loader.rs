use crate::core::config::DedupConfig;
use crate::core::progress::{Phase, Progress, ProgressCallback};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Why a file never made it into classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    Corrupt { message: String },
    Undersized { width: u32, height: u32 },
    WrongExtension,
}

impl RejectReason {
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::Corrupt { .. } => "corrupt",
            RejectReason::Undersized { .. } => "undersized",
            RejectReason::WrongExtension => "wrong-extension",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub filename: String,
    pub reason: RejectReason,
}

/// A decoded image resized to the canonical size.
#[derive(Debug, Clone)]
pub struct Frame {
    pub filename: String,
    pub path: PathBuf,
    pub image: DynamicImage,
}

impl Frame {
    /// Wrap an in-memory image that is already at its final size.
    pub fn new(filename: impl Into<String>, image: DynamicImage) -> Self {
        let filename = filename.into();
        Self {
            path: PathBuf::from(&filename),
            filename,
            image,
        }
    }
}

#[derive(Debug, Default)]
pub struct Listing {
    pub candidates: Vec<PathBuf>,
    pub rejected: Vec<Rejection>,
    pub total_files: usize,
}

#[derive(Debug, Default)]
pub struct LoadedFolder {
    pub frames: Vec<Frame>,
    pub rejected: Vec<Rejection>,
    pub total_files: usize,
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// List the regular files directly inside `dir`, sorted by name, splitting
/// them into candidates and wrong-extension rejections. Symlinks are
/// followed; subdirectories, dangling links and dotfiles are skipped.
pub fn list_image_files(dir: &Path, config: &DedupConfig) -> Result<Listing, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::InvalidPath {
            path: dir.to_string_lossy().to_string(),
        });
    }

    let mut listing = Listing::default();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();
        // `Path::is_file` resolves symlinks, unlike the entry's own file type.
        if !path.is_file() {
            continue;
        }

        let filename = file_name_of(path);
        if filename.starts_with('.') {
            continue;
        }

        listing.total_files += 1;
        if config.accepts_extension(path) {
            listing.candidates.push(path.to_path_buf());
        } else {
            log::warn!("Skipping {}: unsupported extension", filename);
            listing.rejected.push(Rejection {
                filename,
                reason: RejectReason::WrongExtension,
            });
        }
    }

    Ok(listing)
}

pub fn decode_image(path: &Path) -> Result<DynamicImage, RejectReason> {
    let corrupt = |message: String| RejectReason::Corrupt { message };

    ImageReader::open(path)
        .map_err(|e| corrupt(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| corrupt(e.to_string()))?
        .decode()
        .map_err(|e| corrupt(e.to_string()))
}

/// Decode, apply the pixel floor, and resize to the canonical size.
pub fn load_frame(path: &Path, config: &DedupConfig) -> Result<Frame, RejectReason> {
    let image = decode_image(path)?;
    let (width, height) = (image.width(), image.height());

    if (width as u64) * (height as u64) < config.min_pixels {
        return Err(RejectReason::Undersized { width, height });
    }

    let (target_width, target_height) = config.canonical_size();
    let image = if (width, height) == (target_width, target_height) {
        image
    } else {
        log::debug!(
            "Resizing {} from {}x{} to {}x{}",
            path.display(),
            width,
            height,
            target_width,
            target_height
        );
        image.resize_exact(target_width, target_height, FilterType::Triangle)
    };

    Ok(Frame {
        filename: file_name_of(path),
        path: path.to_path_buf(),
        image,
    })
}

/// Load every eligible image in `dir`. Per-file failures become rejections;
/// only folder-level problems are returned as errors.
pub fn load_folder(
    dir: &Path,
    config: &DedupConfig,
    progress_callback: Option<&ProgressCallback>,
) -> Result<LoadedFolder, LoadError> {
    let listing = list_image_files(dir, config)?;
    let total = listing.candidates.len();

    let mut loaded = LoadedFolder {
        frames: Vec::with_capacity(total),
        rejected: listing.rejected,
        total_files: listing.total_files,
    };

    for (index, path) in listing.candidates.iter().enumerate() {
        let filename = file_name_of(path);

        match load_frame(path, config) {
            Ok(frame) => loaded.frames.push(frame),
            Err(reason) => {
                match &reason {
                    RejectReason::Corrupt { message } => {
                        log::warn!("Error opening file {}: {}", filename, message)
                    }
                    RejectReason::Undersized { width, height } => log::warn!(
                        "Insufficient image size for {}: {}x{} is below {} pixels",
                        filename,
                        width,
                        height,
                        config.min_pixels
                    ),
                    RejectReason::WrongExtension => {}
                }
                loaded.rejected.push(Rejection {
                    filename: filename.clone(),
                    reason,
                });
            }
        }

        if let Some(callback) = progress_callback {
            callback(&Progress {
                phase: Phase::Loading,
                processed: index + 1,
                total,
                current_file: filename,
            });
        }
    }

    log::info!(
        "Loaded {} of {} files from {} ({} rejected)",
        loaded.frames.len(),
        loaded.total_files,
        dir.display(),
        loaded.rejected.len()
    );

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn create_test_image(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let intensity = ((x + y) % 256) as u8;
            Rgb([intensity, intensity, intensity])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_listing_is_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        create_test_image(&temp_dir.path().join("b.png"), 40, 40);
        create_test_image(&temp_dir.path().join("a.jpg"), 40, 40);
        fs::write(temp_dir.path().join("notes.txt"), b"hello").unwrap();
        fs::write(temp_dir.path().join(".DS_Store"), b"junk").unwrap();
        fs::create_dir(temp_dir.path().join("unique")).unwrap();

        let listing = list_image_files(temp_dir.path(), &DedupConfig::default()).unwrap();

        let names: Vec<String> = listing.candidates.iter().map(|p| file_name_of(p)).collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
        assert_eq!(listing.total_files, 3);
        assert_eq!(
            listing.rejected,
            vec![Rejection {
                filename: "notes.txt".to_string(),
                reason: RejectReason::WrongExtension,
            }]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_listing_follows_symlinks() {
        use std::os::unix::fs::symlink;

        let source_dir = TempDir::new().unwrap();
        let target = source_dir.path().join("original.png");
        create_test_image(&target, 100, 100);

        let temp_dir = TempDir::new().unwrap();
        symlink(&target, temp_dir.path().join("frame1.png")).unwrap();
        symlink(source_dir.path().join("gone.png"), temp_dir.path().join("frame2.png")).unwrap();
        symlink(source_dir.path(), temp_dir.path().join("linked_dir")).unwrap();

        let listing = list_image_files(temp_dir.path(), &DedupConfig::default()).unwrap();
        assert_eq!(listing.candidates, vec![temp_dir.path().join("frame1.png")]);
        assert_eq!(listing.total_files, 1);

        let frame = load_frame(&listing.candidates[0], &DedupConfig::default()).unwrap();
        assert_eq!(frame.filename, "frame1.png");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(matches!(
            list_image_files(&missing, &DedupConfig::default()),
            Err(LoadError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_load_frame_resizes_to_canonical_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("frame.png");
        create_test_image(&path, 320, 180);

        let frame = load_frame(&path, &DedupConfig::default()).unwrap();
        assert_eq!(frame.filename, "frame.png");
        assert_eq!(frame.path, path);
        assert_eq!((frame.image.width(), frame.image.height()), (500, 500));
    }

    #[test]
    fn test_undersized_frame_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tiny.png");
        create_test_image(&path, 20, 20);

        assert_eq!(
            load_frame(&path, &DedupConfig::default()).unwrap_err(),
            RejectReason::Undersized {
                width: 20,
                height: 20
            }
        );

        let lenient = DedupConfig {
            min_pixels: 400,
            ..DedupConfig::default()
        };
        assert!(load_frame(&path, &lenient).is_ok());
    }

    #[test]
    fn test_corrupt_frame_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.jpg");
        fs::write(&path, b"definitely not a jpeg").unwrap();

        let reason = load_frame(&path, &DedupConfig::default()).unwrap_err();
        assert_eq!(reason.label(), "corrupt");
    }

    #[test]
    fn test_load_folder_collects_rejections() {
        use std::sync::{Arc, Mutex};

        let temp_dir = TempDir::new().unwrap();
        create_test_image(&temp_dir.path().join("01.png"), 64, 64);
        create_test_image(&temp_dir.path().join("02.png"), 16, 16);
        fs::write(temp_dir.path().join("03.jpg"), b"garbage").unwrap();
        fs::write(temp_dir.path().join("04.gif"), b"GIF89a").unwrap();

        let updates = Arc::new(Mutex::new(Vec::new()));
        let updates_clone = updates.clone();
        let callback: ProgressCallback = Box::new(move |progress| {
            updates_clone.lock().unwrap().push(progress.processed);
        });

        let loaded =
            load_folder(temp_dir.path(), &DedupConfig::default(), Some(&callback)).unwrap();

        assert_eq!(loaded.total_files, 4);
        assert_eq!(loaded.frames.len(), 1);
        assert_eq!(loaded.frames[0].filename, "01.png");
        assert_eq!(loaded.rejected.len(), 3);
        let mut labels: Vec<&str> = loaded.rejected.iter().map(|r| r.reason.label()).collect();
        labels.sort();
        assert_eq!(labels, vec!["corrupt", "undersized", "wrong-extension"]);
        assert_eq!(*updates.lock().unwrap(), vec![1, 2, 3]);
    }
}
