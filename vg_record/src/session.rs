//! ABOUTME: One recording session: motion extraction, recording decision and annotation per frame
//! ABOUTME: Owns the background model and state machine for the lifetime of a run

use crate::{AnnotationStyle, Annotator, RecordingPolicy, RecordingStateMachine, Transition};
use chrono::{DateTime, Local};
use vg_core::Result;
use vg_vision::{Frame, MotionConfig, MotionExtractor, MotionSample};

/// Everything produced for one input frame
#[derive(Debug, Clone)]
pub struct CycleOutput {
    /// Input frame with the timestamp banner and, while recording, the indicator
    pub frame: Frame,
    pub motion: MotionSample,
    pub is_recording: bool,
    pub transition: Option<Transition>,
    pub timestamp: DateTime<Local>,
}

#[derive(Clone)]
pub struct RecorderSession {
    extractor: MotionExtractor,
    recorder: RecordingStateMachine,
    annotator: Annotator,
    frames_processed: u64,
}

impl RecorderSession {
    pub fn new(
        extractor: MotionExtractor,
        recorder: RecordingStateMachine,
        annotator: Annotator,
    ) -> Self {
        Self {
            extractor,
            recorder,
            annotator,
            frames_processed: 0,
        }
    }

    pub fn from_config(
        motion: &MotionConfig,
        policy: RecordingPolicy,
        style: AnnotationStyle,
        started_at: DateTime<Local>,
    ) -> Result<Self> {
        Ok(Self::new(
            MotionExtractor::new(motion)?,
            RecordingStateMachine::new(policy, started_at),
            Annotator::new(style)?,
        ))
    }

    /// Run one capture cycle on `frame` observed at `now`
    pub fn process(&mut self, frame: Frame, now: DateTime<Local>) -> CycleOutput {
        let motion = self.extractor.extract(&frame);
        let transition = self.recorder.observe(motion.score, now);
        let is_recording = self.recorder.is_recording();
        let frame = self.annotator.annotate(frame, &now, is_recording);
        self.frames_processed += 1;

        CycleOutput {
            frame,
            motion,
            is_recording,
            transition,
            timestamp: now,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn background_estimate(&self) -> Frame {
        self.extractor.background_estimate()
    }

    pub fn recorder(&self) -> &RecordingStateMachine {
        &self.recorder
    }

    pub fn extractor(&self) -> &MotionExtractor {
        &self.extractor
    }
}
