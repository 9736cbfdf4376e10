//! ABOUTME: Frame preprocessing filters applied before background subtraction
//! ABOUTME: Gaussian, normalized box and median smoothing, gray conversion and resizing, chained

use crate::{Frame, PreprocessConfig, Smoothing};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb, Rgb32FImage};
use imageproc::filter::separable_filter_equal;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use vg_core::{Error, Result};

/// A stateless transformation of a frame
pub trait ImageFilter: Send + Sync + fmt::Debug {
    fn apply(&self, input: &Frame) -> Frame;

    fn name(&self) -> &'static str;
}

/// Passes frames through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFilter;

impl ImageFilter for IdentityFilter {
    fn apply(&self, input: &Frame) -> Frame {
        input.clone()
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Separable Gaussian blur with an explicit square kernel size
#[derive(Debug, Clone)]
pub struct GaussianBlurFilter {
    kernel: Vec<f32>,
}

impl GaussianBlurFilter {
    /// Create a blur with an odd `kernel_size` of at least 3.
    ///
    /// A non-positive `sigma` is derived from the kernel size as
    /// `0.3 * ((kernel_size - 1) * 0.5 - 1) + 0.8`.
    pub fn new(kernel_size: u32, sigma: f64) -> Result<Self> {
        if kernel_size < 3 || kernel_size % 2 == 0 {
            return Err(Error::Validation(format!(
                "Gaussian kernel size must be odd and at least 3, got {}",
                kernel_size
            )));
        }
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(Error::Validation(format!(
                "Gaussian sigma must be a non-negative number, got {}",
                sigma
            )));
        }

        Ok(Self {
            kernel: gaussian_kernel(kernel_size, sigma),
        })
    }

    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }
}

impl ImageFilter for GaussianBlurFilter {
    fn apply(&self, input: &Frame) -> Frame {
        filter_with_kernel(input, &self.kernel)
    }

    fn name(&self) -> &'static str {
        "gaussian"
    }
}

/// Mean over a square window
#[derive(Debug, Clone)]
pub struct NormalizedBoxFilter {
    kernel: Vec<f32>,
}

impl NormalizedBoxFilter {
    pub fn new(kernel_size: u32) -> Result<Self> {
        if kernel_size == 0 {
            return Err(Error::Validation(
                "Normalized box kernel size must be positive".to_string(),
            ));
        }

        let weight = 1.0 / kernel_size as f32;
        Ok(Self {
            kernel: vec![weight; kernel_size as usize],
        })
    }
}

impl ImageFilter for NormalizedBoxFilter {
    fn apply(&self, input: &Frame) -> Frame {
        filter_with_kernel(input, &self.kernel)
    }

    fn name(&self) -> &'static str {
        "normalized_box"
    }
}

/// Per-channel median over a square window
#[derive(Debug, Clone)]
pub struct MedianFilter {
    radius: u32,
}

impl MedianFilter {
    pub fn new(kernel_size: u32) -> Result<Self> {
        if kernel_size < 3 || kernel_size % 2 == 0 {
            return Err(Error::Validation(format!(
                "Median kernel size must be odd and greater than 1, got {}",
                kernel_size
            )));
        }

        Ok(Self {
            radius: kernel_size / 2,
        })
    }
}

impl ImageFilter for MedianFilter {
    fn apply(&self, input: &Frame) -> Frame {
        imageproc::filter::median_filter(input, self.radius, self.radius)
    }

    fn name(&self) -> &'static str {
        "median"
    }
}

/// Scales both dimensions by a constant factor with bilinear sampling
#[derive(Debug, Clone)]
pub struct ResizeFilter {
    factor: f64,
}

impl ResizeFilter {
    pub fn new(factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(Error::Validation(format!(
                "Resize factor must be positive, got {}",
                factor
            )));
        }

        Ok(Self { factor })
    }

    fn scaled(&self, length: u32) -> u32 {
        ((length as f64 * self.factor).round() as u32).max(1)
    }
}

impl ImageFilter for ResizeFilter {
    fn apply(&self, input: &Frame) -> Frame {
        let (width, height) = input.dimensions();
        if width == 0 || height == 0 {
            return input.clone();
        }

        imageops::resize(
            input,
            self.scaled(width),
            self.scaled(height),
            FilterType::Triangle,
        )
    }

    fn name(&self) -> &'static str {
        "resize"
    }
}

/// Collapses colour to luma, kept in all three channels so the frame type is unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertToGrayFilter;

impl ImageFilter for ConvertToGrayFilter {
    fn apply(&self, input: &Frame) -> Frame {
        let luma = imageops::grayscale(input);
        Frame::from_fn(input.width(), input.height(), |x, y| {
            let level = luma.get_pixel(x, y).0[0];
            Rgb([level, level, level])
        })
    }

    fn name(&self) -> &'static str {
        "gray"
    }
}

/// Applies filters in insertion order
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn ImageFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Arc<dyn ImageFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl ImageFilter for FilterChain {
    fn apply(&self, input: &Frame) -> Frame {
        let mut filters = self.filters.iter();
        let Some(first) = filters.next() else {
            return input.clone();
        };

        filters.fold(first.apply(input), |frame, filter| filter.apply(&frame))
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}

/// Build the preprocessing pipeline: optional resize, optional gray conversion, then optional smoothing
pub fn build_preprocess_filter(config: &PreprocessConfig) -> Result<Arc<dyn ImageFilter>> {
    let mut chain = FilterChain::new();

    if let Some(factor) = config.resize_factor {
        info!(factor, "Preprocess resize enabled");
        chain.push(Arc::new(ResizeFilter::new(factor)?));
    }

    if config.to_gray {
        info!("Preprocess gray conversion enabled");
        chain.push(Arc::new(ConvertToGrayFilter));
    }

    match config.smoothing {
        Smoothing::None => {}
        Smoothing::Gaussian { kernel_size, sigma } => {
            info!(kernel_size, sigma, "Preprocess smoothing: gaussian");
            chain.push(Arc::new(GaussianBlurFilter::new(kernel_size, sigma)?));
        }
        Smoothing::NormalizedBox { kernel_size } => {
            info!(kernel_size, "Preprocess smoothing: normalized box");
            chain.push(Arc::new(NormalizedBoxFilter::new(kernel_size)?));
        }
        Smoothing::Median { kernel_size } => {
            info!(kernel_size, "Preprocess smoothing: median");
            chain.push(Arc::new(MedianFilter::new(kernel_size)?));
        }
    }

    if chain.is_empty() {
        Ok(Arc::new(IdentityFilter))
    } else {
        Ok(Arc::new(chain))
    }
}

fn gaussian_kernel(kernel_size: u32, sigma: f64) -> Vec<f32> {
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((kernel_size as f64 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let center = (kernel_size as f64 - 1.0) / 2.0;
    let scale = -0.5 / (sigma * sigma);

    let raw: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - center;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();

    raw.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Run a symmetric 1-D kernel over rows then columns.
///
/// The convolution happens at f32 so the result is rounded once instead of
/// truncated after each pass; borders replicate the edge pixel.
fn filter_with_kernel(input: &Frame, kernel: &[f32]) -> Frame {
    let (width, height) = input.dimensions();
    if width == 0 || height == 0 {
        return input.clone();
    }

    let widened: Rgb32FImage =
        ImageBuffer::from_fn(width, height, |x, y| Rgb(input.get_pixel(x, y).0.map(f32::from)));
    let blurred = separable_filter_equal(&widened, kernel);

    Frame::from_fn(width, height, |x, y| {
        Rgb(blurred
            .get_pixel(x, y)
            .0
            .map(|value| value.round().clamp(0.0, 255.0) as u8))
    })
}
