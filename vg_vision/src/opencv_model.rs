//! ABOUTME: OpenCV MOG2 and KNN background subtraction behind the BackgroundModel trait
//! ABOUTME: Built only with the heavy_opencv feature; shadows are never detected

use crate::background::{assert_same_shape, create_native_model};
use crate::{BackgroundAlgorithm, BackgroundConfig, BackgroundModel, ForegroundMask, Frame};
use opencv::core::{Mat, Ptr};
use opencv::prelude::*;
use opencv::video::{self, BackgroundSubtractorKNN, BackgroundSubtractorMOG2};
use tracing::{debug, error};
use vg_core::{Error, Result};

/// Learning rate that lets OpenCV derive it from the history length
const AUTO_LEARNING_RATE: f64 = -1.0;

enum Subtractor {
    Mog2(Ptr<BackgroundSubtractorMOG2>),
    Knn(Ptr<BackgroundSubtractorKNN>),
}

fn create_subtractor(config: &BackgroundConfig) -> Result<Subtractor> {
    let history = i32::try_from(config.history).unwrap_or(i32::MAX);
    let subtractor = match config.algorithm {
        BackgroundAlgorithm::Mog2 => {
            video::create_background_subtractor_mog2(history, config.var_threshold, false)
                .map(Subtractor::Mog2)
        }
        BackgroundAlgorithm::Knn => {
            video::create_background_subtractor_knn(history, config.dist2_threshold, false)
                .map(Subtractor::Knn)
        }
    };

    subtractor.map_err(|e| Error::Vision(format!("Failed to create OpenCV subtractor: {}", e)))
}

/// Background model delegating to an OpenCV subtractor.
///
/// OpenCV does not expose the learned state, so clones start from an empty
/// model with the same parameters.
pub struct OpencvModel {
    config: BackgroundConfig,
    subtractor: Subtractor,
    shape: Option<(u32, u32)>,
    frames_seen: u64,
}

impl OpencvModel {
    pub fn new(config: &BackgroundConfig) -> Result<Self> {
        let subtractor = create_subtractor(config)?;
        debug!(algorithm = ?config.algorithm, "Created OpenCV subtractor");

        Ok(Self {
            config: config.clone(),
            subtractor,
            shape: None,
            frames_seen: 0,
        })
    }

    fn apply(&mut self, frame: &Frame) -> opencv::Result<ForegroundMask> {
        let (width, height) = frame.dimensions();
        let input = Mat::from_slice(frame.as_raw())?
            .reshape(3, height as i32)?
            .try_clone()?;

        let mut mask = Mat::default();
        match &mut self.subtractor {
            Subtractor::Mog2(mog2) => mog2.apply(&input, &mut mask, AUTO_LEARNING_RATE)?,
            Subtractor::Knn(knn) => knn.apply(&input, &mut mask, AUTO_LEARNING_RATE)?,
        }

        let bytes = mask.data_bytes()?.to_vec();
        Ok(ForegroundMask::from_raw(width, height, bytes)
            .unwrap_or_else(|| ForegroundMask::new(width, height)))
    }

    fn background_image(&self) -> opencv::Result<Option<Frame>> {
        let mut image = Mat::default();
        match &self.subtractor {
            Subtractor::Mog2(mog2) => mog2.get_background_image(&mut image)?,
            Subtractor::Knn(knn) => knn.get_background_image(&mut image)?,
        }
        if image.empty() {
            return Ok(None);
        }

        let bytes = image.data_bytes()?.to_vec();
        Ok(Frame::from_raw(image.cols() as u32, image.rows() as u32, bytes))
    }
}

impl BackgroundModel for OpencvModel {
    fn update(&mut self, frame: &Frame) -> ForegroundMask {
        let shape = frame.dimensions();
        match self.shape {
            Some(expected) => assert_same_shape(expected, shape),
            None => self.shape = Some(shape),
        }
        self.frames_seen += 1;

        self.apply(frame).unwrap_or_else(|e| {
            error!(error = %e, "OpenCV background subtraction failed, reporting no motion");
            ForegroundMask::new(shape.0, shape.1)
        })
    }

    fn current_background_estimate(&self) -> Frame {
        let (width, height) = self.shape.unwrap_or((0, 0));
        match self.background_image() {
            Ok(Some(image)) => image,
            Ok(None) => Frame::new(width, height),
            Err(e) => {
                error!(error = %e, "Failed to read OpenCV background image");
                Frame::new(width, height)
            }
        }
    }

    fn reset(&mut self) {
        match create_subtractor(&self.config) {
            Ok(subtractor) => {
                self.subtractor = subtractor;
                self.shape = None;
                self.frames_seen = 0;
            }
            Err(e) => error!(error = %e, "Failed to reset OpenCV subtractor"),
        }
    }

    fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    fn algorithm_name(&self) -> &'static str {
        match self.subtractor {
            Subtractor::Mog2(_) => "MOG2 (OpenCV)",
            Subtractor::Knn(_) => "KNN (OpenCV)",
        }
    }

    fn box_clone(&self) -> Box<dyn BackgroundModel> {
        match OpencvModel::new(&self.config) {
            Ok(model) => Box::new(model),
            Err(e) => {
                error!(error = %e, "Failed to clone OpenCV subtractor, using native model");
                create_native_model(&self.config)
            }
        }
    }
}
