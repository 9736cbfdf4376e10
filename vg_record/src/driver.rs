//! ABOUTME: Capture loop tying a frame source, a recorder session, a sink and a display together
//! ABOUTME: Runs until the stream ends, the display asks to quit or a stop is requested

use crate::{Display, DisplayControl, FrameSink, FrameSource, RecorderSession, Transition};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use vg_core::{Clock, MonotonicTimer, Result};

/// Shared flag asking a running capture loop to stop after the current frame
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Totals for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub frames_written: u64,
    /// Number of separate recording stretches
    pub segments: u64,
    pub elapsed_ms: u64,
}

/// Process frames until the source is exhausted or the run is stopped.
///
/// The sink is always finished, also when a cycle fails. Source read errors end
/// the run like the end of the stream does; display errors are logged and skipped.
pub fn run(
    session: &mut RecorderSession,
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    display: &mut dyn Display,
    clock: &dyn Clock,
    stop: &StopHandle,
) -> Result<RunSummary> {
    let timer = MonotonicTimer::new();
    let metadata = source.metadata();
    info!(
        width = metadata.width,
        height = metadata.height,
        fps = metadata.fps,
        "Capture loop started"
    );

    let mut summary = RunSummary::default();
    let outcome = run_cycles(session, source, sink, display, clock, stop, &mut summary);
    let finished = sink.finish();
    summary.elapsed_ms = timer.elapsed_ms();

    outcome?;
    finished?;

    info!(
        frames_processed = summary.frames_processed,
        frames_written = summary.frames_written,
        segments = summary.segments,
        elapsed_ms = summary.elapsed_ms,
        "Capture loop finished"
    );
    Ok(summary)
}

fn run_cycles(
    session: &mut RecorderSession,
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    display: &mut dyn Display,
    clock: &dyn Clock,
    stop: &StopHandle,
    summary: &mut RunSummary,
) -> Result<()> {
    let mut was_recording = false;

    loop {
        if stop.is_stop_requested() {
            info!("Stop requested, ending capture loop");
            return Ok(());
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("End of stream");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "Frame read failed, treating as end of stream");
                return Ok(());
            }
        };

        let now = clock.now();
        let output = session.process(frame, now);
        summary.frames_processed += 1;

        match output.transition {
            Some(Transition::Started) => {
                info!(score = output.motion.score, at = %now, "Motion detected, recording")
            }
            Some(Transition::Stopped) => info!(at = %now, "Scene quiet, recording paused"),
            None => {}
        }

        if output.is_recording {
            if !was_recording {
                summary.segments += 1;
            }
            sink.write(&output.frame)?;
            summary.frames_written += 1;
        }
        was_recording = output.is_recording;

        debug!(
            frame = summary.frames_processed,
            score = output.motion.score,
            recording = output.is_recording,
            "Cycle complete"
        );

        match display.show(&output, session) {
            Ok(DisplayControl::Quit) => {
                info!("Display requested quit");
                return Ok(());
            }
            Ok(DisplayControl::Continue) => {}
            Err(e) => warn!(error = %e, "Preview update failed, recording continues"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnnotationStyle, HeadlessDisplay, RecordingPolicy, VecSource};
    use chrono::{Local, TimeZone};
    use std::time::Duration;
    use vg_core::{Error, FrameIntervalClock};
    use vg_vision::utils::{create_blank_frame, create_test_frame_with_motion};
    use vg_vision::{Frame, MotionConfig, PreprocessConfig, Smoothing};

    #[derive(Default)]
    struct CountingSink {
        frames: usize,
        finished: bool,
        fail_after: Option<usize>,
    }

    impl FrameSink for CountingSink {
        fn write(&mut self, _frame: &Frame) -> Result<()> {
            if self.fail_after == Some(self.frames) {
                return Err(Error::Sink("disk full".to_string()));
            }
            self.frames += 1;
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    struct QuitAfter(u64);

    impl Display for QuitAfter {
        fn show(
            &mut self,
            _output: &crate::CycleOutput,
            session: &RecorderSession,
        ) -> Result<DisplayControl> {
            if session.frames_processed() >= self.0 {
                Ok(DisplayControl::Quit)
            } else {
                Ok(DisplayControl::Continue)
            }
        }
    }

    struct BrokenPreview {
        attempts: u64,
    }

    impl Display for BrokenPreview {
        fn show(
            &mut self,
            _output: &crate::CycleOutput,
            _session: &RecorderSession,
        ) -> Result<DisplayControl> {
            self.attempts += 1;
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no space left on device",
            )))
        }
    }

    fn setup() -> (RecorderSession, FrameIntervalClock) {
        let start = Local.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        let motion = MotionConfig {
            preprocess: PreprocessConfig {
                resize_factor: None,
                to_gray: false,
                smoothing: Smoothing::None,
            },
            ..Default::default()
        };
        let policy = RecordingPolicy {
            min_area: 20,
            cooldown: Duration::from_millis(500),
        };
        let session =
            RecorderSession::from_config(&motion, policy, AnnotationStyle::default(), start)
                .unwrap();
        (session, FrameIntervalClock::new(start, Duration::from_millis(100)))
    }

    fn scene() -> Vec<Frame> {
        let mut frames = vec![create_blank_frame(64, 48); 20];
        frames.push(create_test_frame_with_motion(64, 48, 10, 10, 8, 8, 220));
        frames.extend(vec![create_blank_frame(64, 48); 10]);
        frames
    }

    #[test]
    fn test_run_counts_segments_and_writes() {
        let (mut session, clock) = setup();
        let mut source = VecSource::new(scene(), 10.0);
        let mut sink = CountingSink::default();

        let summary = run(
            &mut session,
            &mut source,
            &mut sink,
            &mut HeadlessDisplay,
            &clock,
            &StopHandle::new(),
        )
        .unwrap();

        assert_eq!(summary.frames_processed, 31);
        assert_eq!(summary.segments, 2);
        assert_eq!(summary.frames_written as usize, sink.frames);
        assert!(sink.finished);
        // Six startup frames, then the object frame and five cooldown frames
        assert_eq!(summary.frames_written, 12);
    }

    #[test]
    fn test_stop_before_start_processes_nothing() {
        let (mut session, clock) = setup();
        let mut source = VecSource::new(scene(), 10.0);
        let mut sink = CountingSink::default();
        let stop = StopHandle::new();
        stop.request_stop();

        let summary = run(
            &mut session,
            &mut source,
            &mut sink,
            &mut HeadlessDisplay,
            &clock,
            &stop,
        )
        .unwrap();
        assert_eq!(summary.frames_processed, 0);
        assert!(sink.finished);
    }

    #[test]
    fn test_display_quit_ends_run() {
        let (mut session, clock) = setup();
        let mut source = VecSource::new(scene(), 10.0);
        let mut sink = CountingSink::default();

        let summary = run(
            &mut session,
            &mut source,
            &mut sink,
            &mut QuitAfter(4),
            &clock,
            &StopHandle::new(),
        )
        .unwrap();
        assert_eq!(summary.frames_processed, 4);
    }

    #[test]
    fn test_sink_failure_still_finishes() {
        let (mut session, clock) = setup();
        let mut source = VecSource::new(scene(), 10.0);
        let mut sink = CountingSink {
            fail_after: Some(2),
            ..Default::default()
        };

        let err = run(
            &mut session,
            &mut source,
            &mut sink,
            &mut HeadlessDisplay,
            &clock,
            &StopHandle::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Sink(_)));
        assert!(sink.finished);
        assert_eq!(sink.frames, 2);
    }

    #[test]
    fn test_empty_source_finishes_cleanly() {
        let (mut session, clock) = setup();
        let mut source = VecSource::new(Vec::new(), 10.0);
        let mut sink = CountingSink::default();

        let summary = run(
            &mut session,
            &mut source,
            &mut sink,
            &mut HeadlessDisplay,
            &clock,
            &StopHandle::new(),
        )
        .unwrap();
        assert_eq!(summary.frames_processed, 0);
        assert_eq!(summary.segments, 0);
    }

    #[test]
    fn test_display_failure_does_not_stop_recording() {
        let (mut session, clock) = setup();
        let mut source = VecSource::new(scene(), 10.0);
        let mut sink = CountingSink::default();
        let mut display = BrokenPreview { attempts: 0 };

        let summary = run(
            &mut session,
            &mut source,
            &mut sink,
            &mut display,
            &clock,
            &StopHandle::new(),
        )
        .unwrap();

        assert_eq!(display.attempts, 31);
        assert_eq!(summary.frames_processed, 31);
        assert_eq!(summary.frames_written, 12);
        assert!(sink.finished);
    }
}
