//! ABOUTME: Integration tests for motion extraction with synthetic scenes
//! ABOUTME: Covers warm-up, object appearance and both background algorithms

use vg_vision::{
    utils::{create_blank_frame, create_test_frame_with_motion},
    BackgroundAlgorithm, BackgroundConfig, MotionConfig, MotionExtractor, PreprocessConfig,
    Smoothing,
};

fn config(algorithm: BackgroundAlgorithm, smoothing: Smoothing) -> MotionConfig {
    MotionConfig {
        preprocess: PreprocessConfig {
            resize_factor: None,
            to_gray: false,
            smoothing,
        },
        background: BackgroundConfig {
            algorithm,
            ..Default::default()
        },
        binary_threshold: 127,
    }
}

/// Warm up on a static scene, then show a 40x25 object for a single frame
fn object_scenario(mut extractor: MotionExtractor) -> (u64, u64, u64) {
    let background = create_blank_frame(64, 48);
    let mut warm_scores = Vec::new();
    for _ in 0..30 {
        warm_scores.push(extractor.extract(&background).score);
    }
    let settled = *warm_scores.last().unwrap();

    let object = create_test_frame_with_motion(64, 48, 10, 10, 40, 25, 200);
    let with_object = extractor.extract(&object).score;
    let after = extractor.extract(&background).score;

    (settled, with_object, after)
}

#[test]
fn test_mog2_detects_object_after_warmup() {
    let extractor = MotionExtractor::new(&config(
        BackgroundAlgorithm::Mog2,
        Smoothing::Gaussian {
            kernel_size: 3,
            sigma: 0.0,
        },
    ))
    .unwrap();

    let (settled, with_object, after) = object_scenario(extractor);
    assert_eq!(settled, 0);
    // The blur bleeds the object into its border, never shrinking it
    assert!(with_object >= 1000, "score was {}", with_object);
    assert!(with_object <= 64 * 48);
    assert_eq!(after, 0);
}

#[test]
fn test_knn_detects_object_after_warmup() {
    let extractor = MotionExtractor::new(&config(
        BackgroundAlgorithm::Knn,
        Smoothing::Median { kernel_size: 3 },
    ))
    .unwrap();

    let (settled, with_object, after) = object_scenario(extractor);
    assert_eq!(settled, 0);
    assert!(with_object >= 900, "score was {}", with_object);
    assert_eq!(after, 0);
}

#[test]
fn test_default_pipeline_on_vga_frame() {
    let mut extractor = MotionExtractor::new(&MotionConfig::default()).unwrap();
    let background = create_blank_frame(640, 480);
    extractor.extract(&background);
    assert_eq!(extractor.extract(&background).score, 0);

    let object = create_test_frame_with_motion(640, 480, 300, 200, 50, 40, 220);
    let score = extractor.extract(&object).score;
    assert!(score >= 500, "score was {}", score);
    assert!(score <= 640 * 480);
}

#[test]
fn test_background_estimate_matches_scene() {
    let mut extractor = MotionExtractor::new(&config(BackgroundAlgorithm::Mog2, Smoothing::None))
        .unwrap();
    let background = create_blank_frame(10, 10);
    for _ in 0..5 {
        extractor.extract(&background);
    }

    assert_eq!(extractor.background_estimate(), background);
}
