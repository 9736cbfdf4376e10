//! ABOUTME: Background model abstraction shared by the MOG2 and KNN subtractors
//! ABOUTME: Selects an implementation from configuration at runtime

use crate::{
    BackgroundAlgorithm, BackgroundBackend, BackgroundConfig, ForegroundMask, Frame, KnnModel,
    Mog2Model,
};
#[cfg(not(feature = "heavy_opencv"))]
use tracing::warn;
use tracing::info;
use vg_core::Result;

/// Adaptive estimate of the static scene.
///
/// Every frame handed to a model during a session must have the same
/// dimensions; a mismatch panics.
pub trait BackgroundModel: Send {
    /// Learn from `frame` and return its deviation from the model (0 = background, 255 = foreground)
    fn update(&mut self, frame: &Frame) -> ForegroundMask;

    /// Visualization of what the model currently considers background
    fn current_background_estimate(&self) -> Frame;

    /// Forget everything learned so far
    fn reset(&mut self);

    /// Number of frames learned since creation or the last reset
    fn frames_seen(&self) -> u64;

    fn algorithm_name(&self) -> &'static str;

    fn box_clone(&self) -> Box<dyn BackgroundModel>;
}

impl Clone for Box<dyn BackgroundModel> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Create the background model selected by `config`
pub fn create_background_model(config: &BackgroundConfig) -> Result<Box<dyn BackgroundModel>> {
    match config.backend {
        BackgroundBackend::Native => Ok(create_native_model(config)),
        BackgroundBackend::Opencv => {
            #[cfg(feature = "heavy_opencv")]
            {
                info!(
                    algorithm = ?config.algorithm,
                    history = config.history,
                    "Creating OpenCV background model"
                );
                Ok(Box::new(crate::OpencvModel::new(config)?))
            }
            #[cfg(not(feature = "heavy_opencv"))]
            {
                warn!("OpenCV backend requested but heavy_opencv feature not enabled, falling back to native");
                Ok(create_native_model(config))
            }
        }
    }
}

pub(crate) fn create_native_model(config: &BackgroundConfig) -> Box<dyn BackgroundModel> {
    match config.algorithm {
        BackgroundAlgorithm::Mog2 => {
            info!(
                history = config.history,
                var_threshold = config.var_threshold,
                "Creating MOG2 background model"
            );
            Box::new(Mog2Model::new(config.history, config.var_threshold as f32))
        }
        BackgroundAlgorithm::Knn => {
            info!(
                history = config.history,
                dist2_threshold = config.dist2_threshold,
                "Creating KNN background model"
            );
            Box::new(KnnModel::new(config.history, config.dist2_threshold as f32))
        }
    }
}

/// Panics when a frame does not match the dimensions the model was built for
pub(crate) fn assert_same_shape(expected: (u32, u32), actual: (u32, u32)) {
    assert_eq!(
        expected, actual,
        "frame dimensions changed within a session: model is {}x{}, frame is {}x{}",
        expected.0, expected.1, actual.0, actual.1
    );
}
