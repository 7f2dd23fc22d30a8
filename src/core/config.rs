use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid blur kernel size {size}: kernel sizes must be odd and positive")]
    InvalidKernel { size: u32 },

    #[error("Invalid binarize cutoff 0: the cutoff must be at least 1")]
    InvalidCutoff,

    #[error("Invalid canonical size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("Invalid config field `{field}`: {message}")]
    InvalidField { field: &'static str, message: String },
}

/// Tunables shared by the loader, the differ and the output writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Gaussian kernel sizes, applied one after another.
    pub blur_kernels: Vec<u32>,
    /// Per-pixel intensity delta at which a pixel counts as changed.
    pub binarize_cutoff: u8,
    /// Minimum `width * height` of a decoded image before resizing.
    pub min_pixels: u64,
    pub canonical_width: u32,
    pub canonical_height: u32,
    /// Lowercase extensions without the leading dot.
    pub extensions: Vec<String>,
    pub output_dir_name: String,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            blur_kernels: vec![5, 7, 11],
            binarize_cutoff: 20,
            min_pixels: 1024,
            canonical_width: 500,
            canonical_height: 500,
            extensions: vec!["jpg".to_string(), "png".to_string()],
            output_dir_name: "unique".to_string(),
        }
    }
}

impl DedupConfig {
    /// Load a JSON config file; missing fields fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: DedupConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(&size) = self.blur_kernels.iter().find(|&&k| k == 0 || k % 2 == 0) {
            return Err(ConfigError::InvalidKernel { size });
        }

        if self.binarize_cutoff == 0 {
            return Err(ConfigError::InvalidCutoff);
        }

        if self.canonical_width == 0 || self.canonical_height == 0 {
            return Err(ConfigError::InvalidSize {
                width: self.canonical_width,
                height: self.canonical_height,
            });
        }

        if self.extensions.is_empty() {
            return Err(ConfigError::InvalidField {
                field: "extensions",
                message: "at least one extension is required".to_string(),
            });
        }

        if self.output_dir_name.is_empty()
            || self.output_dir_name.contains(['/', '\\'])
            || self.output_dir_name == "."
            || self.output_dir_name == ".."
        {
            return Err(ConfigError::InvalidField {
                field: "output_dir_name",
                message: format!("{:?} is not a plain directory name", self.output_dir_name),
            });
        }

        Ok(())
    }

    /// Case-insensitive extension check against the configured list.
    pub fn accepts_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false)
    }

    pub fn canonical_size(&self) -> (u32, u32) {
        (self.canonical_width, self.canonical_height)
    }
}

/// Gaussian sigma for an odd kernel size, using the usual
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8` rule of thumb.
pub fn kernel_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = DedupConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.blur_kernels, vec![5, 7, 11]);
        assert_eq!(config.canonical_size(), (500, 500));
    }

    #[test]
    fn test_even_kernel_rejected() {
        let config = DedupConfig {
            blur_kernels: vec![3, 4, 7],
            ..DedupConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidKernel { size: 4 })
        ));
    }

    #[test]
    fn test_zero_size_rejected() {
        let config = DedupConfig {
            canonical_width: 0,
            ..DedupConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_zero_cutoff_rejected() {
        let config = DedupConfig {
            binarize_cutoff: 0,
            ..DedupConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCutoff)));
    }

    #[test]
    fn test_nested_output_dir_rejected() {
        let config = DedupConfig {
            output_dir_name: "a/b".to_string(),
            ..DedupConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extension_matching_ignores_case() {
        let config = DedupConfig::default();
        assert!(config.accepts_extension(Path::new("frame_001.jpg")));
        assert!(config.accepts_extension(Path::new("frame_001.PNG")));
        assert!(!config.accepts_extension(Path::new("frame_001.jpeg")));
        assert!(!config.accepts_extension(Path::new("notes.txt")));
        assert!(!config.accepts_extension(Path::new("README")));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("framecull.json");
        fs::write(&path, r#"{ "blur_kernels": [3, 5, 7], "min_pixels": 4096 }"#).unwrap();

        let config = DedupConfig::from_file(&path).unwrap();
        assert_eq!(config.blur_kernels, vec![3, 5, 7]);
        assert_eq!(config.min_pixels, 4096);
        assert_eq!(config.binarize_cutoff, 20);
        assert_eq!(config.output_dir_name, "unique");
    }

    #[test]
    fn test_config_file_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("framecull.json");
        let config = DedupConfig {
            canonical_width: 320,
            canonical_height: 240,
            ..DedupConfig::default()
        };

        config.to_file(&path).unwrap();
        assert_eq!(DedupConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_kernel_sigma() {
        assert!((kernel_sigma(3) - 0.8).abs() < 1e-5);
        assert!((kernel_sigma(5) - 1.1).abs() < 1e-5);
        assert!((kernel_sigma(11) - 2.0).abs() < 1e-5);
    }
}
