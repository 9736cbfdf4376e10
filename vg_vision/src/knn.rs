//! ABOUTME: Nearest-neighbour background model (KNN)
//! ABOUTME: Keeps a small set of colour samples per pixel and flags pixels with too few close samples

use crate::background::{assert_same_shape, BackgroundModel};
use crate::{ForegroundMask, Frame};
use image::Luma;

/// Samples retained per pixel
const SAMPLES: usize = 7;
/// Close samples needed for a pixel to count as background
const MATCHES_REQUIRED: usize = 2;

/// Per-pixel sample set refreshed on a fixed round-robin schedule.
///
/// The first `SAMPLES` frames fill the set; afterwards one slot is overwritten
/// every `history / SAMPLES` frames, so the set always spans roughly the last
/// `history` frames.
#[derive(Debug, Clone)]
pub struct KnnModel {
    history: u32,
    dist2_threshold: f32,
    dimensions: Option<(u32, u32)>,
    samples: Vec<[f32; 3]>,
    filled: usize,
    next_slot: usize,
    frames_seen: u64,
}

impl KnnModel {
    pub fn new(history: u32, dist2_threshold: f32) -> Self {
        Self {
            history,
            dist2_threshold,
            dimensions: None,
            samples: Vec::new(),
            filled: 0,
            next_slot: 0,
            frames_seen: 0,
        }
    }

    fn refresh_period(&self) -> u64 {
        (self.history as u64 / SAMPLES as u64).max(1)
    }

    fn ensure_shape(&mut self, dimensions: (u32, u32)) {
        match self.dimensions {
            Some(expected) => assert_same_shape(expected, dimensions),
            None => {
                let pixels = dimensions.0 as usize * dimensions.1 as usize;
                self.samples = vec![[0.0; 3]; pixels * SAMPLES];
                self.dimensions = Some(dimensions);
            }
        }
    }

    fn store(&mut self, frame: &Frame, slot: usize) {
        for (pixel, set) in frame.pixels().zip(self.samples.chunks_exact_mut(SAMPLES)) {
            set[slot] = pixel.0.map(f32::from);
        }
    }
}

impl BackgroundModel for KnnModel {
    fn update(&mut self, frame: &Frame) -> ForegroundMask {
        self.ensure_shape(frame.dimensions());
        self.frames_seen += 1;

        let mut mask = ForegroundMask::new(frame.width(), frame.height());
        let sets = self.samples.chunks_exact(SAMPLES);
        for ((pixel, out), set) in frame.pixels().zip(mask.pixels_mut()).zip(sets) {
            let data = pixel.0.map(f32::from);
            let matches = set[..self.filled]
                .iter()
                .filter(|sample| {
                    let dist2: f32 = sample
                        .iter()
                        .zip(data)
                        .map(|(s, d)| (s - d) * (s - d))
                        .sum();
                    dist2 < self.dist2_threshold
                })
                .count();
            *out = Luma([if matches < MATCHES_REQUIRED { 255 } else { 0 }]);
        }

        if self.filled < SAMPLES {
            let slot = self.filled;
            self.store(frame, slot);
            self.filled += 1;
        } else if self.frames_seen % self.refresh_period() == 0 {
            let slot = self.next_slot;
            self.store(frame, slot);
            self.next_slot = (slot + 1) % SAMPLES;
        }

        mask
    }

    fn current_background_estimate(&self) -> Frame {
        let Some((width, height)) = self.dimensions else {
            return Frame::new(0, 0);
        };

        let mut image = Frame::new(width, height);
        if self.filled == 0 {
            return image;
        }

        for (out, set) in image.pixels_mut().zip(self.samples.chunks_exact(SAMPLES)) {
            let mut acc = [0.0f32; 3];
            for sample in &set[..self.filled] {
                for (value, s) in acc.iter_mut().zip(sample) {
                    *value += s;
                }
            }
            let count = self.filled as f32;
            out.0 = acc.map(|value| (value / count).round().clamp(0.0, 255.0) as u8);
        }

        image
    }

    fn reset(&mut self) {
        self.dimensions = None;
        self.samples.clear();
        self.filled = 0;
        self.next_slot = 0;
        self.frames_seen = 0;
    }

    fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    fn algorithm_name(&self) -> &'static str {
        "KNN"
    }

    fn box_clone(&self) -> Box<dyn BackgroundModel> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::*;

    fn foreground_pixels(mask: &ForegroundMask) -> usize {
        mask.pixels().filter(|p| p.0[0] == 255).count()
    }

    #[test]
    fn test_needs_two_samples_before_background() {
        let mut model = KnnModel::new(500, 400.0);
        let frame = create_blank_frame(6, 6);

        assert_eq!(foreground_pixels(&model.update(&frame)), 36);
        assert_eq!(foreground_pixels(&model.update(&frame)), 36);
        assert_eq!(foreground_pixels(&model.update(&frame)), 0);
    }

    #[test]
    fn test_object_detected_against_samples() {
        let mut model = KnnModel::new(500, 400.0);
        for _ in 0..10 {
            model.update(&create_blank_frame(12, 12));
        }

        let mask = model.update(&create_test_frame_with_motion(12, 12, 2, 2, 3, 3, 200));
        assert_eq!(foreground_pixels(&mask), 9);
    }

    #[test]
    fn test_small_deviation_within_threshold() {
        let mut model = KnnModel::new(500, 400.0);
        for _ in 0..10 {
            model.update(&create_blank_frame(4, 4));
        }

        // 3 * 10^2 = 300 < 400
        let mask = model.update(&create_test_frame_with_motion(4, 4, 0, 0, 4, 4, 74));
        assert_eq!(foreground_pixels(&mask), 0);
    }

    #[test]
    fn test_round_robin_refresh_absorbs_change() {
        let mut model = KnnModel::new(14, 400.0);
        for _ in 0..SAMPLES {
            model.update(&create_blank_frame(2, 2));
        }

        let moved = create_test_frame_with_motion(2, 2, 0, 0, 2, 2, 220);
        assert_eq!(foreground_pixels(&model.update(&moved)), 4);

        // Refresh period is 2 frames, so three slots hold the new scene by now
        for _ in 0..4 {
            model.update(&moved);
        }
        assert_eq!(foreground_pixels(&model.update(&moved)), 0);
    }

    #[test]
    fn test_background_estimate_and_reset() {
        let mut model = KnnModel::new(100, 400.0);
        let frame = create_blank_frame(3, 3);
        model.update(&frame);
        model.update(&frame);

        assert_eq!(model.current_background_estimate().get_pixel(1, 1).0, BACKGROUND.0);

        model.reset();
        assert_eq!(model.frames_seen(), 0);
        assert_eq!(model.current_background_estimate().dimensions(), (0, 0));
    }
}
