//! ABOUTME: Motion extraction with pure-Rust MOG2 and KNN background subtraction
//! ABOUTME: Smooths frames, maintains a background model and reduces masks to motion scores

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

pub mod background;
pub mod extractor;
pub mod filters;
pub mod knn;
pub mod mog2;
#[cfg(feature = "heavy_opencv")]
pub mod opencv_model;

pub use background::{create_background_model, BackgroundModel};
pub use extractor::{binarize, count_foreground, MotionExtractor, MotionSample};
pub use filters::{
    build_preprocess_filter, ConvertToGrayFilter, FilterChain, GaussianBlurFilter, IdentityFilter, ImageFilter,
    MedianFilter, NormalizedBoxFilter, ResizeFilter,
};
pub use knn::KnnModel;
pub use mog2::Mog2Model;
#[cfg(feature = "heavy_opencv")]
pub use opencv_model::OpencvModel;

// Re-export image types for benchmarks
pub use image;

/// A single colour video frame
pub type Frame = RgbImage;

/// Per-pixel foreground score, same dimensions as the analysed frame
pub type ForegroundMask = GrayImage;

/// Available background subtraction algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundAlgorithm {
    /// Per-pixel adaptive mixture of Gaussians
    #[default]
    Mog2,
    /// Per-pixel nearest-neighbour sample set
    Knn,
}

/// Which implementation runs the selected algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundBackend {
    /// Built-in pure-Rust models
    #[default]
    Native,
    /// OpenCV subtractors (requires heavy_opencv feature)
    Opencv,
}

/// Background model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConfig {
    pub algorithm: BackgroundAlgorithm,
    #[serde(default)]
    pub backend: BackgroundBackend,
    /// Number of recent frames that shape the model
    pub history: u32,
    /// Squared Mahalanobis distance deciding whether a pixel fits a MOG2 component
    pub var_threshold: f64,
    /// Squared distance deciding whether a pixel matches a KNN sample
    pub dist2_threshold: f64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            algorithm: BackgroundAlgorithm::Mog2,
            backend: BackgroundBackend::Native,
            history: 1000,
            var_threshold: 16.0,
            dist2_threshold: 400.0,
        }
    }
}

/// Smoothing applied before background subtraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum Smoothing {
    None,
    /// Gaussian blur; a sigma of zero derives it from the kernel size
    Gaussian { kernel_size: u32, sigma: f64 },
    NormalizedBox { kernel_size: u32 },
    Median { kernel_size: u32 },
}

impl Default for Smoothing {
    fn default() -> Self {
        Self::Gaussian {
            kernel_size: 21,
            sigma: 0.0,
        }
    }
}

/// Frame preprocessing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Optional scale factor applied before smoothing
    pub resize_factor: Option<f64>,
    /// Collapse colour to luma before smoothing
    #[serde(default)]
    pub to_gray: bool,
    pub smoothing: Smoothing,
}

/// Configuration for motion extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    pub preprocess: PreprocessConfig,
    pub background: BackgroundConfig,
    /// Mask values strictly above this become foreground
    pub binary_threshold: u8,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            background: BackgroundConfig::default(),
            binary_threshold: 127,
        }
    }
}

/// Utility functions for building synthetic frames
pub mod utils {
    use image::{ImageBuffer, Rgb, RgbImage};

    /// Colour used for the static background of synthetic scenes
    pub const BACKGROUND: Rgb<u8> = Rgb([64, 64, 64]);

    /// Create a uniform frame
    pub fn create_blank_frame(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_pixel(width, height, BACKGROUND)
    }

    /// Create a synthetic frame with a solid object in the specified region
    pub fn create_test_frame_with_motion(
        width: u32,
        height: u32,
        motion_x: u32,
        motion_y: u32,
        motion_width: u32,
        motion_height: u32,
        intensity: u8,
    ) -> RgbImage {
        let mut img = create_blank_frame(width, height);

        for y in motion_y..(motion_y + motion_height).min(height) {
            for x in motion_x..(motion_x + motion_width).min(width) {
                img.put_pixel(x, y, Rgb([intensity, intensity, intensity]));
            }
        }

        img
    }
}
