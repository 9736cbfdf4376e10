//! ABOUTME: Builds a ready-to-run capture pipeline from configuration
//! ABOUTME: Shared by the vigil binary and the end-to-end tests

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::info;
use vg_config::Config;
use vg_core::{Clock, Error, FrameIntervalClock, Result, SystemClock};
use vg_record::{
    run, run_directory, BufferedSource, Display, FrameSink, FrameSource, HeadlessDisplay,
    ImageDirSource, ImageSequenceSink, RecorderSession, RunSummary, SnapshotDisplay, StopHandle,
};

/// Everything one run needs, owned so it can move onto a blocking thread
pub struct Pipeline {
    session: RecorderSession,
    source: Box<dyn FrameSource>,
    sink: Box<dyn FrameSink>,
    display: Box<dyn Display>,
    clock: Box<dyn Clock>,
    output_dir: PathBuf,
}

impl Pipeline {
    /// Open the input, prepare the output directory and build the session
    pub fn build(config: &Config, started_at: DateTime<Local>) -> Result<Self> {
        let input_dir = config
            .input_dir()
            .ok_or_else(|| Error::Config("source.input_dir is not set".to_string()))?;

        let session = RecorderSession::from_config(
            &config.motion_config(),
            config.recording_policy(),
            config.annotation_style(),
            started_at,
        )?;

        let images = ImageDirSource::open(&input_dir, config.source.fps)?;
        let source: Box<dyn FrameSource> = if config.source.buffer_frames > 0 {
            Box::new(BufferedSource::spawn(images, config.source.buffer_frames)?)
        } else {
            Box::new(images)
        };

        let clock: Box<dyn Clock> = if config.source.wall_clock {
            Box::new(SystemClock)
        } else {
            Box::new(FrameIntervalClock::from_fps(started_at, config.source.fps)?)
        };

        let output_dir = run_directory(
            &config.output_prefix(),
            &started_at,
            config.output.date_folders,
        );
        let sink = Box::new(ImageSequenceSink::create(&output_dir, &config.output.extension)?);

        let display: Box<dyn Display> = match &config.display.snapshot_dir {
            Some(dir) => Box::new(SnapshotDisplay::new(dir, config.display.snapshot_every)?),
            None => Box::new(HeadlessDisplay),
        };

        info!(
            input = %input_dir.display(),
            output = %output_dir.display(),
            "Pipeline ready"
        );

        Ok(Self {
            session,
            source,
            sink,
            display,
            clock,
            output_dir,
        })
    }

    /// Publish every cycle to the status server before the configured preview sees it
    #[cfg(feature = "status_server")]
    pub fn with_status(mut self, status: vg_obs::LiveStatus) -> Self {
        self.display = Box::new(vg_obs::StatusDisplay::new(self.display, status));
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Drive the capture loop to completion
    pub fn run(mut self, stop: &StopHandle) -> Result<RunSummary> {
        run(
            &mut self.session,
            self.source.as_mut(),
            self.sink.as_mut(),
            self.display.as_mut(),
            self.clock.as_ref(),
            stop,
        )
    }
}
