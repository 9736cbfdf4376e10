//! ABOUTME: End-to-end recording scenarios over synthetic scenes
//! ABOUTME: Cooldown timing, burst merging and on-disk output of the capture loop

use std::time::Duration;
use tempfile::TempDir;
use test_support::{frame_with_block, solid_frame, test_start, ManualClock};
use vg_core::{Clock, FrameIntervalClock};
use vg_record::{
    run, AnnotationStyle, HeadlessDisplay, ImageSequenceSink, RecorderSession, RecordingPolicy,
    StopHandle, Transition, VecSource,
};
use vg_vision::{MotionConfig, PreprocessConfig, Smoothing};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

fn unsmoothed() -> MotionConfig {
    MotionConfig {
        preprocess: PreprocessConfig {
            resize_factor: None,
            to_gray: false,
            smoothing: Smoothing::None,
        },
        ..Default::default()
    }
}

fn session(policy: RecordingPolicy) -> RecorderSession {
    RecorderSession::from_config(&unsmoothed(), policy, AnnotationStyle::default(), test_start())
        .unwrap()
}

#[test]
fn test_single_object_frame_records_for_cooldown() {
    let policy = RecordingPolicy {
        min_area: 500,
        cooldown: Duration::from_secs(5),
    };
    let mut session = session(policy);
    let clock = FrameIntervalClock::new(test_start(), Duration::from_millis(100));
    let background = solid_frame(WIDTH, HEIGHT, 64);

    for _ in 0..1000 {
        session.process(background.clone(), clock.now());
    }
    assert!(!session.is_recording());

    // 40x25 block: exactly 1000 moving pixels for one cycle
    let object = frame_with_block(&background, (10, 10), (40, 25), 220);
    let output = session.process(object, clock.now());
    assert_eq!(output.motion.score, 1000);
    assert_eq!(output.transition, Some(Transition::Started));
    assert!(output.is_recording);

    // 5 s at 100 ms per frame
    for cycle in 1..=50 {
        let output = session.process(background.clone(), clock.now());
        assert!(output.is_recording, "stopped early at cycle {cycle}");
    }

    let output = session.process(background.clone(), clock.now());
    assert!(!output.is_recording);
    assert_eq!(output.transition, Some(Transition::Stopped));
}

#[test]
fn test_bursts_two_seconds_apart_form_one_recording() {
    let policy = RecordingPolicy {
        min_area: 500,
        cooldown: Duration::from_secs(5),
    };
    let mut session = session(policy);
    let clock = ManualClock::new(test_start());
    let background = solid_frame(WIDTH, HEIGHT, 64);
    let object = frame_with_block(&background, (5, 5), (30, 30), 230);
    let step = Duration::from_millis(100);

    for _ in 0..100 {
        session.process(background.clone(), clock.now());
        clock.advance(step);
    }
    assert!(!session.is_recording());

    let mut transitions = Vec::new();
    let burst = |session: &mut RecorderSession, transitions: &mut Vec<Transition>| {
        for _ in 0..3 {
            transitions.extend(session.process(object.clone(), clock.now()).transition);
            clock.advance(step);
        }
    };

    burst(&mut session, &mut transitions);
    for _ in 0..20 {
        let output = session.process(background.clone(), clock.now());
        assert!(output.is_recording);
        transitions.extend(output.transition);
        clock.advance(step);
    }
    burst(&mut session, &mut transitions);

    assert!(session.is_recording());
    assert_eq!(transitions, vec![Transition::Started]);
}

#[test]
fn test_min_area_boundary_through_pipeline() {
    let background = solid_frame(WIDTH, HEIGHT, 64);
    let clock = ManualClock::new(test_start());

    for (pixels, expect_recording) in [(499u32, false), (500u32, true)] {
        let mut session = session(RecordingPolicy {
            min_area: 500,
            cooldown: Duration::from_secs(1),
        });
        clock.set(test_start());
        for _ in 0..30 {
            session.process(background.clone(), clock.now());
            clock.advance(Duration::from_millis(100));
        }
        assert!(!session.is_recording());

        // Full rows plus one partial row give the exact pixel count
        let mut object = frame_with_block(&background, (0, 20), (WIDTH, pixels / WIDTH), 220);
        object = frame_with_block(&object, (0, 20 + pixels / WIDTH), (pixels % WIDTH, 1), 220);

        let output = session.process(object, clock.now());
        assert_eq!(output.motion.score, pixels as u64);
        assert_eq!(output.is_recording, expect_recording, "{pixels} pixels");
    }
}

#[test]
fn test_capture_loop_writes_recorded_frames_to_disk() {
    let root = TempDir::new().unwrap();
    let background = solid_frame(WIDTH, HEIGHT, 64);
    let mut frames = vec![background.clone(); 30];
    frames.push(frame_with_block(&background, (20, 10), (20, 20), 200));
    frames.extend(vec![background.clone(); 10]);

    let mut session = session(RecordingPolicy {
        min_area: 100,
        cooldown: Duration::from_millis(300),
    });
    let mut source = VecSource::new(frames, 10.0);
    let mut sink = ImageSequenceSink::create(root.path().join("run"), "png").unwrap();
    let clock = FrameIntervalClock::from_fps(test_start(), 10.0).unwrap();

    let summary = run(
        &mut session,
        &mut source,
        &mut sink,
        &mut HeadlessDisplay,
        &clock,
        &StopHandle::new(),
    )
    .unwrap();

    assert_eq!(summary.frames_processed, 41);
    assert_eq!(summary.segments, 2);

    let written = std::fs::read_dir(root.path().join("run")).unwrap().count() as u64;
    assert_eq!(written, summary.frames_written);
    assert!(root.path().join("run").join("frame_000001.png").is_file());
}
