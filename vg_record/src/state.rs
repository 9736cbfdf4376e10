//! ABOUTME: Debounced recording state machine driven by per-frame motion scores
//! ABOUTME: Starts recording on motion and stops only after a quiet cooldown has elapsed

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

/// Thresholds governing when recording starts and stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingPolicy {
    /// Moving-pixel count at or above which a frame counts as motion
    pub min_area: u64,
    /// Quiet time after the last motion before recording stops
    pub cooldown: Duration,
}

impl Default for RecordingPolicy {
    fn default() -> Self {
        Self {
            min_area: 500,
            cooldown: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Idle,
    Recording,
}

/// Change of status produced by a single observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Started,
    Stopped,
}

/// Recording session state.
///
/// Sessions begin in [`RecordingStatus::Recording`] with the start time as the
/// last motion, so the first cooldown runs from startup even if nothing moves.
#[derive(Debug, Clone)]
pub struct RecordingStateMachine {
    policy: RecordingPolicy,
    status: RecordingStatus,
    last_motion_at: DateTime<Local>,
}

impl RecordingStateMachine {
    pub fn new(policy: RecordingPolicy, started_at: DateTime<Local>) -> Self {
        Self {
            policy,
            status: RecordingStatus::Recording,
            last_motion_at: started_at,
        }
    }

    /// Feed one frame's motion score observed at `now`
    pub fn observe(&mut self, motion_score: u64, now: DateTime<Local>) -> Option<Transition> {
        let previous = self.status;

        if motion_score >= self.policy.min_area {
            self.last_motion_at = now;
            self.status = RecordingStatus::Recording;
        } else if self.quiet_for(now) > self.policy.cooldown {
            self.status = RecordingStatus::Idle;
        }

        trace!(
            motion_score,
            status = ?self.status,
            last_motion_at = %self.last_motion_at,
            "Recording state evaluated"
        );

        match (previous, self.status) {
            (RecordingStatus::Idle, RecordingStatus::Recording) => Some(Transition::Started),
            (RecordingStatus::Recording, RecordingStatus::Idle) => Some(Transition::Stopped),
            _ => None,
        }
    }

    /// Time since the last motion; a clock that stepped backwards counts as no time
    fn quiet_for(&self, now: DateTime<Local>) -> Duration {
        now.signed_duration_since(self.last_motion_at)
            .to_std()
            .unwrap_or_default()
    }

    pub fn is_recording(&self) -> bool {
        self.status == RecordingStatus::Recording
    }

    pub fn status(&self) -> RecordingStatus {
        self.status
    }

    pub fn last_motion_at(&self) -> DateTime<Local> {
        self.last_motion_at
    }

    pub fn policy(&self) -> &RecordingPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 17, 10, 0, 0).unwrap()
    }

    fn at_ms(ms: i64) -> DateTime<Local> {
        start() + chrono::Duration::milliseconds(ms)
    }

    fn machine() -> RecordingStateMachine {
        RecordingStateMachine::new(RecordingPolicy::default(), start())
    }

    #[test]
    fn test_initial_state_is_recording() {
        let machine = machine();
        assert!(machine.is_recording());
        assert_eq!(machine.last_motion_at(), start());
    }

    #[test]
    fn test_initial_recording_times_out_without_motion() {
        let mut machine = machine();
        assert_eq!(machine.observe(0, at_ms(5_000)), None);
        assert!(machine.is_recording());

        assert_eq!(machine.observe(0, at_ms(5_001)), Some(Transition::Stopped));
        assert_eq!(machine.status(), RecordingStatus::Idle);
    }

    #[test]
    fn test_min_area_is_inclusive() {
        let mut machine = machine();
        machine.observe(0, at_ms(6_000));
        assert!(!machine.is_recording());

        assert_eq!(machine.observe(499, at_ms(6_100)), None);
        assert!(!machine.is_recording());

        assert_eq!(machine.observe(500, at_ms(6_200)), Some(Transition::Started));
        assert!(machine.is_recording());
        assert_eq!(machine.last_motion_at(), at_ms(6_200));
    }

    #[test]
    fn test_motion_refreshes_last_motion_while_recording() {
        let mut machine = machine();
        assert_eq!(machine.observe(10_000, at_ms(1_000)), None);
        assert_eq!(machine.last_motion_at(), at_ms(1_000));

        assert_eq!(machine.observe(10_000, at_ms(2_000)), None);
        assert_eq!(machine.last_motion_at(), at_ms(2_000));
    }

    #[test]
    fn test_quiet_frames_do_not_move_last_motion() {
        let mut machine = machine();
        machine.observe(800, at_ms(1_000));
        machine.observe(10, at_ms(3_000));
        assert_eq!(machine.last_motion_at(), at_ms(1_000));
    }

    #[test]
    fn test_cooldown_boundary() {
        let mut machine = machine();
        machine.observe(600, at_ms(1_000));

        // Exactly at the cooldown the recording continues
        assert_eq!(machine.observe(0, at_ms(6_000)), None);
        assert!(machine.is_recording());

        assert_eq!(machine.observe(0, at_ms(6_001)), Some(Transition::Stopped));
    }

    #[test]
    fn test_idle_stays_idle_without_motion() {
        let mut machine = machine();
        machine.observe(0, at_ms(10_000));
        for second in 11..20 {
            assert_eq!(machine.observe(0, at_ms(second * 1_000)), None);
            assert!(!machine.is_recording());
        }
    }

    #[test]
    fn test_bursts_within_cooldown_stay_recording() {
        let mut machine = machine();
        machine.observe(0, at_ms(6_000));
        assert!(!machine.is_recording());

        // Burst, 2 s pause, burst: one continuous recording
        machine.observe(1_000, at_ms(7_000));
        for ms in (7_100..9_000).step_by(100) {
            assert_eq!(machine.observe(0, at_ms(ms)), None);
            assert!(machine.is_recording());
        }
        assert_eq!(machine.observe(1_000, at_ms(9_000)), None);
        assert!(machine.is_recording());
    }

    #[test]
    fn test_clock_stepping_backwards_keeps_recording() {
        let mut machine = machine();
        machine.observe(900, at_ms(10_000));
        assert_eq!(machine.observe(0, at_ms(2_000)), None);
        assert!(machine.is_recording());
    }

    #[test]
    fn test_policy_serialization() {
        let policy = RecordingPolicy {
            min_area: 42,
            cooldown: Duration::from_millis(2_500),
        };
        let json = serde_json::to_string(&policy).unwrap();
        let parsed: RecordingPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, policy);
    }
}
