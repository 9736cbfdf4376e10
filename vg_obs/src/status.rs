//! ABOUTME: Live recorder status shared between the capture loop and the HTTP handlers
//! ABOUTME: A display decorator records every cycle before the wrapped preview sees it

use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use vg_core::{MonotonicTimer, Result};
use vg_record::{CycleOutput, Display, DisplayControl, RecorderSession};
use vg_vision::{ForegroundMask, Frame};

/// Window the processing rate is averaged over
const FPS_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub frames_processed: u64,
    pub is_recording: bool,
    pub last_score: u64,
    /// Frames processed per second over the last complete window
    pub fps: f64,
    /// Nominal rate of the frame source
    pub source_fps: f64,
    pub last_frame_at: Option<DateTime<Local>>,
}

/// Frame rate measured over fixed windows
#[derive(Debug, Clone, Default)]
pub struct FpsMeter {
    frames: u64,
    fps: f64,
}

impl FpsMeter {
    /// Count one frame seen `window_elapsed` after the window opened.
    ///
    /// Returns true when the window closed; the caller opens the next one.
    pub fn record(&mut self, window_elapsed: Duration) -> bool {
        self.frames += 1;
        if window_elapsed < FPS_WINDOW {
            return false;
        }

        self.fps = self.frames as f64 / window_elapsed.as_secs_f64();
        self.frames = 0;
        true
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

#[derive(Debug, Default)]
struct LiveState {
    snapshot: StatusSnapshot,
    frame: Option<Frame>,
    mask: Option<ForegroundMask>,
    meter: FpsMeter,
    window: MonotonicTimer,
}

/// Cheaply cloneable handle onto the latest cycle
#[derive(Debug, Clone, Default)]
pub struct LiveStatus {
    state: Arc<RwLock<LiveState>>,
}

impl LiveStatus {
    pub fn new(source_fps: f64) -> Self {
        let status = Self::default();
        status.write().snapshot.source_fps = source_fps;
        status
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, LiveState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, LiveState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the outcome of one capture cycle
    pub fn record(&self, output: &CycleOutput, frames_processed: u64) {
        let mut guard = self.write();
        let state = &mut *guard;

        if state.snapshot.frames_processed == 0 {
            state.window.restart();
        }
        if state.meter.record(state.window.elapsed()) {
            state.window.restart();
        }

        state.snapshot.frames_processed = frames_processed;
        state.snapshot.is_recording = output.is_recording;
        state.snapshot.last_score = output.motion.score;
        state.snapshot.fps = state.meter.fps();
        state.snapshot.last_frame_at = Some(output.timestamp);
        state.frame = Some(output.frame.clone());
        state.mask = Some(output.motion.mask.clone());
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.read().snapshot.clone()
    }

    /// Latest annotated frame
    pub fn current_frame(&self) -> Option<Frame> {
        self.read().frame.clone()
    }

    /// Latest binarized foreground mask
    pub fn motion_mask(&self) -> Option<ForegroundMask> {
        self.read().mask.clone()
    }
}

/// Publishes every cycle to a [`LiveStatus`], then defers to the wrapped display
pub struct StatusDisplay {
    inner: Box<dyn Display>,
    status: LiveStatus,
}

impl StatusDisplay {
    pub fn new(inner: Box<dyn Display>, status: LiveStatus) -> Self {
        Self { inner, status }
    }
}

impl Display for StatusDisplay {
    fn show(&mut self, output: &CycleOutput, session: &RecorderSession) -> Result<DisplayControl> {
        self.status.record(output, session.frames_processed());
        self.inner.show(output, session)
    }
}
