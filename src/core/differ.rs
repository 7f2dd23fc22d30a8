// Change detection between two frames of identical size.
//
// Frames are reduced to luma and smoothed by a chain of Gaussian passes, then
// differenced and binarized. Connected blobs of changed pixels smaller than the
// caller's tolerance are treated as noise; the score is the area of the largest
// surviving blob.

use crate::core::config::{kernel_sigma, ConfigError, DedupConfig};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("Frame dimensions differ: {left:?} vs {right:?}")]
    DimensionMismatch { left: (u32, u32), right: (u32, u32) },
}

/// Bounding box and pixel area of one connected blob of changed pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub area: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Largest significant region area, 0 when nothing survived the tolerance.
    pub score: u32,
    pub regions: Vec<Region>,
    pub region_count: usize,
}

impl DiffResult {
    pub fn is_duplicate(&self) -> bool {
        self.score == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct RegionBounds {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    area: u32,
}

impl RegionBounds {
    fn empty() -> Self {
        Self {
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            area: 0,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.area += 1;
    }

    fn into_region(self) -> Region {
        Region {
            x: self.min_x,
            y: self.min_y,
            width: self.max_x - self.min_x + 1,
            height: self.max_y - self.min_y + 1,
            area: self.area,
        }
    }
}

pub struct FrameDiffer {
    blur_kernels: Vec<u32>,
    binarize_cutoff: u8,
}

impl FrameDiffer {
    pub fn new() -> Self {
        let config = DedupConfig::default();
        Self {
            blur_kernels: config.blur_kernels,
            binarize_cutoff: config.binarize_cutoff,
        }
    }

    pub fn from_config(config: &DedupConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            blur_kernels: config.blur_kernels.clone(),
            binarize_cutoff: config.binarize_cutoff,
        })
    }

    /// Luma conversion followed by cumulative Gaussian smoothing, one pass per
    /// configured kernel size.
    pub fn preprocess(&self, image: &DynamicImage) -> GrayImage {
        let mut gray = image.to_luma8();
        for &kernel_size in &self.blur_kernels {
            gray = gaussian_blur_f32(&gray, kernel_sigma(kernel_size));
        }
        gray
    }

    /// Score two decoded frames. Both must already share the same dimensions.
    pub fn score(
        &self,
        first: &DynamicImage,
        second: &DynamicImage,
        tolerance: u32,
    ) -> Result<DiffResult, DiffError> {
        ensure_same_dimensions(first.width(), first.height(), second.width(), second.height())?;
        self.score_preprocessed(&self.preprocess(first), &self.preprocess(second), tolerance)
    }

    /// Score two frames that already went through [`FrameDiffer::preprocess`].
    pub fn score_preprocessed(
        &self,
        first: &GrayImage,
        second: &GrayImage,
        tolerance: u32,
    ) -> Result<DiffResult, DiffError> {
        let (width, height) = first.dimensions();
        let (other_width, other_height) = second.dimensions();
        ensure_same_dimensions(width, height, other_width, other_height)?;

        let mask = self.change_mask(first, second);
        let regions: Vec<Region> = changed_regions(&mask)
            .into_iter()
            .filter(|region| region.area >= tolerance)
            .collect();
        let score = regions.iter().map(|region| region.area).max().unwrap_or(0);

        log::debug!(
            "diff score {} ({} significant regions, tolerance {})",
            score,
            regions.len(),
            tolerance
        );

        Ok(DiffResult {
            score,
            region_count: regions.len(),
            regions,
        })
    }

    fn change_mask(&self, first: &GrayImage, second: &GrayImage) -> GrayImage {
        let cutoff = self.binarize_cutoff;
        GrayImage::from_fn(first.width(), first.height(), |x, y| {
            let delta = first.get_pixel(x, y)[0].abs_diff(second.get_pixel(x, y)[0]);
            if delta >= cutoff { Luma([255]) } else { Luma([0]) }
        })
    }
}

impl Default for FrameDiffer {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_same_dimensions(
    width: u32,
    height: u32,
    other_width: u32,
    other_height: u32,
) -> Result<(), DiffError> {
    if (width, height) != (other_width, other_height) {
        return Err(DiffError::DimensionMismatch {
            left: (width, height),
            right: (other_width, other_height),
        });
    }
    Ok(())
}

/// 8-connected blobs of non-zero pixels, in label order.
fn changed_regions(mask: &GrayImage) -> Vec<Region> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut bounds: Vec<RegionBounds> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if bounds.len() < label {
            bounds.resize(label, RegionBounds::empty());
        }
        bounds[label - 1].include(x, y);
    }

    bounds
        .into_iter()
        .filter(|b| b.area > 0)
        .map(RegionBounds::into_region)
        .collect()
}
