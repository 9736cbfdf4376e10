//! ABOUTME: Reduces each frame to a binary foreground mask and a moving-pixel count
//! ABOUTME: Smooths, runs background subtraction, binarizes and counts foreground pixels

use crate::{
    build_preprocess_filter, create_background_model, BackgroundModel, ForegroundMask, Frame,
    ImageFilter, MotionConfig,
};
use image::Luma;
use std::sync::Arc;
use tracing::{debug, info};
use vg_core::Result;

/// Value of a foreground pixel in a binarized mask
pub const FOREGROUND: u8 = 255;

/// Outcome of analysing one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionSample {
    /// Binarized foreground mask
    pub mask: ForegroundMask,
    /// Number of foreground pixels in `mask`
    pub score: u64,
}

/// Motion extraction pipeline owning the background model of a session
#[derive(Clone)]
pub struct MotionExtractor {
    filter: Arc<dyn ImageFilter>,
    model: Box<dyn BackgroundModel>,
    binary_threshold: u8,
}

impl MotionExtractor {
    /// Build the preprocessing chain and background model described by `config`
    pub fn new(config: &MotionConfig) -> Result<Self> {
        let filter = build_preprocess_filter(&config.preprocess)?;
        let model = create_background_model(&config.background)?;
        info!(
            filter = filter.name(),
            model = model.algorithm_name(),
            binary_threshold = config.binary_threshold,
            "Motion extractor ready"
        );

        Ok(Self::with_parts(filter, model, config.binary_threshold))
    }

    pub fn with_parts(
        filter: Arc<dyn ImageFilter>,
        model: Box<dyn BackgroundModel>,
        binary_threshold: u8,
    ) -> Self {
        Self {
            filter,
            model,
            binary_threshold,
        }
    }

    /// Analyse `frame`, updating the background model
    pub fn extract(&mut self, frame: &Frame) -> MotionSample {
        let smoothed = self.filter.apply(frame);
        let deviation = self.model.update(&smoothed);
        let mask = binarize(&deviation, self.binary_threshold);
        let score = count_foreground(&mask);

        debug!(
            score,
            frames_seen = self.model.frames_seen(),
            "Motion extracted"
        );

        MotionSample { mask, score }
    }

    /// Current background estimate, for display purposes only
    pub fn background_estimate(&self) -> Frame {
        self.model.current_background_estimate()
    }

    pub fn reset(&mut self) {
        debug!("Resetting background model");
        self.model.reset();
    }

    pub fn binary_threshold(&self) -> u8 {
        self.binary_threshold
    }

    pub fn algorithm_name(&self) -> &'static str {
        self.model.algorithm_name()
    }
}

/// Hard foreground decision: values above `threshold` become 255, the rest 0
pub fn binarize(mask: &ForegroundMask, threshold: u8) -> ForegroundMask {
    let mut out = mask.clone();
    for pixel in out.pixels_mut() {
        *pixel = Luma([if pixel.0[0] > threshold { FOREGROUND } else { 0 }]);
    }
    out
}

/// Number of pixels equal to the foreground value
pub fn count_foreground(mask: &ForegroundMask) -> u64 {
    mask.pixels().filter(|p| p.0[0] == FOREGROUND).count() as u64
}
