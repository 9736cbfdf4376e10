//! ABOUTME: Shared testing utilities and helper functions
//! ABOUTME: Controllable clocks and scene builders used across crate tests

use chrono::{DateTime, Local, TimeZone};
use image::{Rgb, RgbImage};
use std::sync::Mutex;
use std::time::Duration;
use vg_core::Clock;

/// Fixed, readable instant to start test sessions from
pub fn test_start() -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 6, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(Local::now)
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    fn current(&self) -> std::sync::MutexGuard<'_, DateTime<Local>> {
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        *self.current() += step;
    }

    pub fn set(&self, to: DateTime<Local>) {
        *self.current() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.current()
    }
}

/// Uniform frame of the given grey level
pub fn solid_frame(width: u32, height: u32, level: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([level; 3]))
}

/// `background` with a `w`x`h` block of `level` pasted at (x, y)
pub fn frame_with_block(
    background: &RgbImage,
    (x, y): (u32, u32),
    (w, h): (u32, u32),
    level: u8,
) -> RgbImage {
    let mut frame = background.clone();
    for py in y..(y + h).min(frame.height()) {
        for px in x..(x + w).min(frame.width()) {
            frame.put_pixel(px, py, Rgb([level; 3]));
        }
    }
    frame
}
