//! ABOUTME: Preview surfaces for the annotated frame, the motion mask and the background estimate
//! ABOUTME: Headless no-op display and a snapshot display that refreshes preview images on disk

use crate::{CycleOutput, RecorderSession};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vg_core::Result;

/// What the capture loop should do after a frame was shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayControl {
    Continue,
    Quit,
}

/// Shows each processed frame; returning [`DisplayControl::Quit`] ends the session
pub trait Display: Send {
    fn show(&mut self, output: &CycleOutput, session: &RecorderSession) -> Result<DisplayControl>;
}

/// Shows nothing and never asks to quit
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessDisplay;

impl Display for HeadlessDisplay {
    fn show(&mut self, _output: &CycleOutput, _session: &RecorderSession) -> Result<DisplayControl> {
        Ok(DisplayControl::Continue)
    }
}

/// Overwrites `frame.png`, `mask.png` and `background.png` in a directory every `every` frames
#[derive(Debug)]
pub struct SnapshotDisplay {
    dir: PathBuf,
    every: u64,
    shown: u64,
}

impl SnapshotDisplay {
    pub fn new<P: AsRef<Path>>(dir: P, every: u64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), every, "Preview snapshots enabled");
        Ok(Self {
            dir,
            every: every.max(1),
            shown: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Display for SnapshotDisplay {
    fn show(&mut self, output: &CycleOutput, session: &RecorderSession) -> Result<DisplayControl> {
        self.shown += 1;
        if (self.shown - 1) % self.every != 0 {
            return Ok(DisplayControl::Continue);
        }

        output.frame.save(self.dir.join("frame.png"))?;
        output.motion.mask.save(self.dir.join("mask.png"))?;
        session
            .background_estimate()
            .save(self.dir.join("background.png"))?;
        debug!(frame = self.shown, "Preview snapshots refreshed");

        Ok(DisplayControl::Continue)
    }
}
