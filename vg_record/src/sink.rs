//! ABOUTME: Destinations for annotated frames captured while recording
//! ABOUTME: Writes numbered image sequences into per-run, optionally dated, directories

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vg_core::{Error, Result};
use vg_vision::Frame;

/// Receives every frame captured while recording
pub trait FrameSink: Send {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and release the destination; called once when the session ends
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Directory for one run: `<prefix>/<YYYY-MM-DD>/<HH.MM.SS>` with date folders, else `prefix`
pub fn run_directory(prefix: &Path, started_at: &DateTime<Local>, date_folders: bool) -> PathBuf {
    if !date_folders {
        return prefix.to_path_buf();
    }
    prefix
        .join(started_at.format("%Y-%m-%d").to_string())
        .join(started_at.format("%H.%M.%S").to_string())
}

/// Saves frames as `frame_000001.<ext>`, `frame_000002.<ext>`, ...
#[derive(Debug)]
pub struct ImageSequenceSink {
    dir: PathBuf,
    extension: String,
    written: u64,
}

impl ImageSequenceSink {
    pub fn create<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Self> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        if image::ImageFormat::from_extension(&extension).is_none() {
            return Err(Error::Sink(format!(
                "Unsupported image extension: {extension}"
            )));
        }

        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), extension = %extension, "Writing frames to image sequence");

        Ok(Self {
            dir,
            extension,
            written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }

    fn next_path(&self) -> PathBuf {
        self.dir
            .join(format!("frame_{:06}.{}", self.written + 1, self.extension))
    }
}

impl FrameSink for ImageSequenceSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        let path = self.next_path();
        frame.save(&path)?;
        self.written += 1;
        debug!(path = %path.display(), "Frame written");
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        info!(
            dir = %self.dir.display(),
            frames = self.written,
            "Image sequence closed"
        );
        Ok(())
    }
}
