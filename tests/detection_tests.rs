// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for normalization and candidate detection

use depth_roi::config::DetectorConfig;
use depth_roi::depth::{FrameNormalizer, OffsetMode};
use depth_roi::{CandidateDetector, DepthFrame, Roi};

const BACKGROUND: u16 = 60000;
const BLOB: u16 = 1000;

/// Full-size frame with one 15x15 near blob at (124, 124)
fn blob_scene() -> DepthFrame {
    let mut frame = DepthFrame::filled(640, 480, BACKGROUND);
    frame.fill_rect(Roi::new(124, 124, 15, 15), BLOB);
    frame
}

fn assert_within(actual: u32, expected: u32, tolerance: u32, what: &str) {
    assert!(
        actual.abs_diff(expected) <= tolerance,
        "{} was {}, expected {} +/- {}",
        what,
        actual,
        expected,
        tolerance
    );
}

#[test]
fn test_wrapping_normalization_boundaries() {
    let frame = DepthFrame::new(5, 1, vec![0, 7499, 7500, 7501, u16::MAX]).unwrap();
    let normalizer = FrameNormalizer::new(7500, OffsetMode::Wrapping);
    let out = normalizer.normalize(&frame);

    for (&d, &v) in frame.data.iter().zip(&out.data) {
        let expected = (d as i64 - 7500).rem_euclid(65536) as u16;
        assert_eq!(v, expected, "sample {}", d);
    }
    assert_eq!(out.data[1], 65535, "d < o wraps to the top of the range");
}

#[test]
fn test_single_blob_gives_single_candidate() {
    let detector = CandidateDetector::new(DetectorConfig::default());
    let detection = detector
        .detect(&blob_scene(), Roi::new(100, 100, 64, 64), 2.0)
        .unwrap();

    assert_eq!(
        detection.candidates.len(),
        1,
        "candidates: {:?}",
        detection.candidates
    );
    let rect = detection.candidates[0].rect;
    assert_within(rect.x, 124, 2, "x");
    assert_within(rect.y, 124, 2, "y");
    assert_within(rect.width, 15, 3, "width");
    assert_within(rect.height, 15, 3, "height");
    assert_eq!(detection.region, Roi::new(100, 100, 64, 64));
}

#[test]
fn test_candidates_are_in_full_frame_coordinates() {
    let detector = CandidateDetector::new(DetectorConfig::default());
    let detection = detector
        .detect(&blob_scene(), Roi::new(100, 100, 64, 64), 2.0)
        .unwrap();

    for candidate in &detection.candidates {
        assert!(detection.region.contains(&candidate.rect));
    }
}

#[test]
fn test_candidate_bounds_hold_exactly() {
    let mut frame = DepthFrame::filled(320, 240, BACKGROUND);
    // Too small, about right, too large, too elongated
    frame.fill_rect(Roi::new(20, 20, 5, 5), BLOB);
    frame.fill_rect(Roi::new(60, 20, 15, 15), BLOB);
    frame.fill_rect(Roi::new(20, 60, 30, 30), BLOB);
    frame.fill_rect(Roi::new(80, 70, 6, 40), BLOB);
    frame.fill_rect(Roi::new(100, 20, 14, 18), BLOB);

    let config = DetectorConfig::default();
    let detector = CandidateDetector::new(config.clone());

    for scaling in [1.0, 2.0, 5.0, 20.0] {
        let detection = detector
            .detect(&frame, Roi::new(0, 0, 160, 128), scaling)
            .unwrap();
        for candidate in &detection.candidates {
            let area = candidate.rect.area();
            let aspect = candidate.rect.width as f64
                / (candidate.rect.width as f64 + candidate.rect.height as f64);
            assert!(area > 200 && area < 350, "area {} out of bounds", area);
            assert!((aspect - 0.5).abs() < 0.2, "aspect {} out of bounds", aspect);
            assert_eq!(candidate.aspect, aspect);
        }
    }
}

#[test]
fn test_uniform_grid_has_no_candidates() {
    let detector = CandidateDetector::new(DetectorConfig::default());

    for value in [0u16, 1200, BACKGROUND, u16::MAX] {
        let frame = DepthFrame::filled(640, 480, value);
        for scaling in [1.0, 5.0] {
            let detection = detector
                .detect(&frame, Roi::new(200, 150, 120, 90), scaling)
                .unwrap();
            assert!(
                detection.candidates.is_empty(),
                "value {} scaling {} gave {:?}",
                value,
                scaling,
                detection.candidates
            );
        }
    }
}

#[test]
fn test_region_is_clipped_to_frame() {
    let detector = CandidateDetector::new(DetectorConfig::default());
    let frame = DepthFrame::filled(640, 480, BACKGROUND);
    let detection = detector
        .detect(&frame, Roi::new(600, 450, 100, 100), 5.0)
        .unwrap();

    assert_eq!(detection.region, Roi::new(600, 450, 40, 30));
    assert_eq!(
        (detection.enhanced.width, detection.enhanced.height),
        (40, 30)
    );
}
