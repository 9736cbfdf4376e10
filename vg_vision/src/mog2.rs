//! ABOUTME: Adaptive Gaussian mixture background model (MOG2)
//! ABOUTME: Keeps up to five weighted colour Gaussians per pixel and flags pixels none of them explain

use crate::background::{assert_same_shape, BackgroundModel};
use crate::{ForegroundMask, Frame};
use image::Luma;
use tracing::trace;

const MAX_MODES: usize = 5;

/// Tuning constants of the mixture model
#[derive(Debug, Clone, Copy)]
pub struct Mog2Params {
    pub history: u32,
    /// Squared Mahalanobis distance below which a pixel is explained by a background component
    pub var_threshold: f32,
    /// Cumulative weight of the components that make up the background
    pub background_ratio: f32,
    /// Squared Mahalanobis distance below which a pixel updates an existing component
    pub var_threshold_gen: f32,
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    /// Prior that prunes components no longer supported by data
    pub complexity_reduction: f32,
}

impl Mog2Params {
    pub fn new(history: u32, var_threshold: f32) -> Self {
        Self {
            history,
            var_threshold,
            background_ratio: 0.9,
            var_threshold_gen: 9.0,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            complexity_reduction: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Gaussian {
    weight: f32,
    mean: [f32; 3],
    variance: f32,
}

/// Per-pixel mixture of Gaussians; shadows are not modelled, so every deviation is foreground
#[derive(Debug, Clone)]
pub struct Mog2Model {
    params: Mog2Params,
    dimensions: Option<(u32, u32)>,
    modes: Vec<[Gaussian; MAX_MODES]>,
    modes_used: Vec<u8>,
    frames_seen: u64,
}

impl Mog2Model {
    pub fn new(history: u32, var_threshold: f32) -> Self {
        Self::with_params(Mog2Params::new(history, var_threshold))
    }

    pub fn with_params(params: Mog2Params) -> Self {
        Self {
            params,
            dimensions: None,
            modes: Vec::new(),
            modes_used: Vec::new(),
            frames_seen: 0,
        }
    }

    pub fn params(&self) -> &Mog2Params {
        &self.params
    }

    /// Rate at which the current frame is blended into the model
    fn learning_rate(&self) -> f32 {
        let window = (2 * self.frames_seen).min(self.params.history.max(1) as u64);
        1.0 / window.max(1) as f32
    }

    fn ensure_shape(&mut self, dimensions: (u32, u32)) {
        match self.dimensions {
            Some(expected) => assert_same_shape(expected, dimensions),
            None => {
                let pixels = dimensions.0 as usize * dimensions.1 as usize;
                self.modes = vec![[Gaussian::default(); MAX_MODES]; pixels];
                self.modes_used = vec![0; pixels];
                self.dimensions = Some(dimensions);
            }
        }
    }
}

impl BackgroundModel for Mog2Model {
    fn update(&mut self, frame: &Frame) -> ForegroundMask {
        self.ensure_shape(frame.dimensions());
        self.frames_seen += 1;
        let alpha = self.learning_rate();
        trace!(frame = self.frames_seen, alpha, "MOG2 update");

        let params = &self.params;
        let mut mask = ForegroundMask::new(frame.width(), frame.height());
        let cells = self.modes.iter_mut().zip(self.modes_used.iter_mut());

        for ((pixel, out), (modes, used)) in frame.pixels().zip(mask.pixels_mut()).zip(cells) {
            let data = pixel.0.map(f32::from);
            let foreground = update_pixel(params, modes, used, data, alpha);
            *out = Luma([if foreground { 255 } else { 0 }]);
        }

        mask
    }

    fn current_background_estimate(&self) -> Frame {
        let Some((width, height)) = self.dimensions else {
            return Frame::new(0, 0);
        };

        let mut image = Frame::new(width, height);
        let cells = self.modes.iter().zip(self.modes_used.iter());
        for (out, (modes, &used)) in image.pixels_mut().zip(cells) {
            let mut acc = [0.0f32; 3];
            let mut total_weight = 0.0f32;
            for gaussian in &modes[..used as usize] {
                for (value, mean) in acc.iter_mut().zip(gaussian.mean) {
                    *value += gaussian.weight * mean;
                }
                total_weight += gaussian.weight;
                if total_weight > self.params.background_ratio {
                    break;
                }
            }

            let inverse = if total_weight > f32::EPSILON {
                1.0 / total_weight
            } else {
                0.0
            };
            out.0 = acc.map(|value| (value * inverse).round().clamp(0.0, 255.0) as u8);
        }

        image
    }

    fn reset(&mut self) {
        self.dimensions = None;
        self.modes.clear();
        self.modes_used.clear();
        self.frames_seen = 0;
    }

    fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    fn algorithm_name(&self) -> &'static str {
        "MOG2"
    }

    fn box_clone(&self) -> Box<dyn BackgroundModel> {
        Box::new(self.clone())
    }
}

/// Update one pixel's mixture with `data` and report whether the pixel is foreground.
///
/// Components are kept sorted by descending weight; the leading components whose
/// weights sum to `background_ratio` describe the background.
fn update_pixel(
    params: &Mog2Params,
    modes: &mut [Gaussian; MAX_MODES],
    used: &mut u8,
    data: [f32; 3],
    alpha: f32,
) -> bool {
    let prune = -alpha * params.complexity_reduction;
    let retain = 1.0 - alpha;

    let mut active = *used as usize;
    let mut total_weight = 0.0f32;
    let mut background = false;
    let mut fits = false;

    let mut mode = 0;
    while mode < active {
        let mut weight = retain * modes[mode].weight + prune;
        let mut slot = mode;

        if !fits {
            let gaussian = &mut modes[mode];
            let variance = gaussian.variance;
            let diff = [
                gaussian.mean[0] - data[0],
                gaussian.mean[1] - data[1],
                gaussian.mean[2] - data[2],
            ];
            let dist2: f32 = diff.iter().map(|d| d * d).sum();

            if total_weight < params.background_ratio && dist2 < params.var_threshold * variance {
                background = true;
            }

            if dist2 < params.var_threshold_gen * variance {
                fits = true;
                weight += alpha;
                let k = alpha / weight;
                for (mean, d) in gaussian.mean.iter_mut().zip(diff) {
                    *mean -= k * d;
                }
                gaussian.variance =
                    (variance + k * (dist2 - variance)).clamp(params.var_min, params.var_max);

                while slot > 0 && weight >= modes[slot - 1].weight {
                    modes.swap(slot, slot - 1);
                    slot -= 1;
                }
            }
        }

        if weight < -prune {
            weight = 0.0;
            active -= 1;
        }
        modes[slot].weight = weight;
        total_weight += weight;
        mode += 1;
    }

    if total_weight > f32::EPSILON {
        let inverse = 1.0 / total_weight;
        for gaussian in &mut modes[..active] {
            gaussian.weight *= inverse;
        }
    }

    if !fits && alpha > 0.0 {
        if active < MAX_MODES {
            active += 1;
        }
        let slot = active - 1;

        if active == 1 {
            modes[slot].weight = 1.0;
        } else {
            modes[slot].weight = alpha;
            for gaussian in &mut modes[..slot] {
                gaussian.weight *= retain;
            }
        }
        modes[slot].mean = data;
        modes[slot].variance = params.var_init;

        let mut slot = slot;
        while slot > 0 && alpha >= modes[slot - 1].weight {
            modes.swap(slot, slot - 1);
            slot -= 1;
        }
    }

    *used = active as u8;
    !background
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::*;

    fn foreground_pixels(mask: &ForegroundMask) -> usize {
        mask.pixels().filter(|p| p.0[0] == 255).count()
    }

    #[test]
    fn test_first_frame_is_all_foreground() {
        let mut model = Mog2Model::new(1000, 16.0);
        let mask = model.update(&create_blank_frame(10, 10));
        assert_eq!(foreground_pixels(&mask), 100);
        assert_eq!(model.frames_seen(), 1);
    }

    #[test]
    fn test_static_scene_becomes_background() {
        let mut model = Mog2Model::new(1000, 16.0);
        let frame = create_blank_frame(10, 10);
        model.update(&frame);

        for _ in 0..5 {
            let mask = model.update(&frame);
            assert_eq!(foreground_pixels(&mask), 0);
        }
    }

    #[test]
    fn test_new_object_is_foreground() {
        let mut model = Mog2Model::new(1000, 16.0);
        let background = create_blank_frame(20, 20);
        for _ in 0..10 {
            model.update(&background);
        }

        let with_object = create_test_frame_with_motion(20, 20, 5, 5, 4, 5, 200);
        let mask = model.update(&with_object);
        assert_eq!(foreground_pixels(&mask), 20);
        assert_eq!(mask.get_pixel(6, 6).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);

        // Object gone: the dominant component still explains the scene
        let mask = model.update(&background);
        assert_eq!(foreground_pixels(&mask), 0);
    }

    #[test]
    fn test_learning_rate_follows_history() {
        let mut model = Mog2Model::new(10, 16.0);
        let frame = create_blank_frame(2, 2);

        model.update(&frame);
        assert!((model.learning_rate() - 0.5).abs() < f32::EPSILON);

        for _ in 0..20 {
            model.update(&frame);
        }
        assert!((model.learning_rate() - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_persistent_change_is_absorbed() {
        let mut model = Mog2Model::new(20, 16.0);
        for _ in 0..20 {
            model.update(&create_blank_frame(4, 4));
        }

        let moved = create_test_frame_with_motion(4, 4, 0, 0, 4, 4, 180);
        let first = model.update(&moved);
        assert_eq!(foreground_pixels(&first), 16);

        let mut last = first;
        for _ in 0..60 {
            last = model.update(&moved);
        }
        assert_eq!(foreground_pixels(&last), 0);
    }

    #[test]
    fn test_background_estimate_tracks_scene() {
        let mut model = Mog2Model::new(100, 16.0);
        assert_eq!(model.current_background_estimate().dimensions(), (0, 0));

        let frame = create_blank_frame(6, 4);
        for _ in 0..5 {
            model.update(&frame);
        }

        let estimate = model.current_background_estimate();
        assert_eq!(estimate.dimensions(), (6, 4));
        assert_eq!(estimate.get_pixel(3, 2).0, BACKGROUND.0);
    }

    #[test]
    fn test_reset_forgets_model() {
        let mut model = Mog2Model::new(100, 16.0);
        let frame = create_blank_frame(5, 5);
        model.update(&frame);
        model.update(&frame);

        model.reset();
        assert_eq!(model.frames_seen(), 0);

        // A different frame size is accepted after a reset
        let mask = model.update(&create_blank_frame(7, 3));
        assert_eq!(foreground_pixels(&mask), 21);
    }

    #[test]
    fn test_modes_stay_sorted_and_bounded() {
        let mut model = Mog2Model::new(50, 16.0);
        for value in [10u8, 60, 110, 160, 210, 250, 30, 10] {
            let frame = create_test_frame_with_motion(1, 1, 0, 0, 1, 1, value);
            model.update(&frame);
        }

        let used = model.modes_used[0] as usize;
        assert!(used <= MAX_MODES);
        let weights: Vec<f32> = model.modes[0][..used].iter().map(|g| g.weight).collect();
        assert!(weights.windows(2).all(|w| w[0] >= w[1]));
        let total: f32 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-3);
    }
}
