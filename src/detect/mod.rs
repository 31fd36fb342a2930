// SPDX-License-Identifier: GPL-3.0-only

//! Candidate object detection inside the region of interest
//!
//! A fixed recipe tuned for small round objects on a table seen from
//! above: contrast-enhance the crop, drop everything far from the camera,
//! trace edges and keep contour boxes of the right size and shape.
//! Nothing is carried between frames.

pub mod clahe;

pub use clahe::Clahe;

use crate::config::DetectorConfig;
use crate::depth::{DepthFrame, Roi};
use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::edges::canny;
use tracing::{debug, trace};

// imageproc hysteresis is inclusive
const CANNY_EPSILON: f32 = 1e-3;

/// Filtered contour bounding box in full-frame coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateBox {
    pub rect: Roi,
    /// `width / (width + height)`
    pub aspect: f64,
}

impl CandidateBox {
    pub fn new(rect: Roi) -> Self {
        let aspect = rect.width as f64 / (rect.width as f64 + rect.height as f64);
        Self { rect, aspect }
    }
}

/// Result of one detection pass
#[derive(Debug, Clone)]
pub struct Detection {
    /// Region actually searched (the requested one clipped to the frame)
    pub region: Roi,
    /// Crop after contrast enhancement
    pub enhanced: DepthFrame,
    pub candidates: Vec<CandidateBox>,
}

/// Detector with a fixed calibration
#[derive(Debug, Clone)]
pub struct CandidateDetector {
    config: DetectorConfig,
    clahe: Clahe,
}

impl CandidateDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let clahe = Clahe::new(config.clahe_tiles, config.clahe_clip_limit);
        Self { config, clahe }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run the detection recipe on `frame` inside `roi`
    ///
    /// Returns `None` when the region does not overlap the frame.
    pub fn detect(&self, frame: &DepthFrame, roi: Roi, scaling: f64) -> Option<Detection> {
        let region = roi.clip_to(frame.width, frame.height)?;
        let mut enhanced = frame.crop(region)?;
        self.clahe.apply(&mut enhanced);

        let mask = self.threshold_to_8bit(&enhanced, scaling);
        let edges = canny(
            &mask,
            self.config.canny_low + CANNY_EPSILON,
            self.config.canny_high + CANNY_EPSILON,
        );

        let boxes: Vec<Roi> = find_contours::<i32>(&edges)
            .iter()
            .filter_map(|contour| bounding_rect(contour.points.iter().map(|p| (p.x, p.y))))
            .map(|rect| rect.offset_by(&region))
            .collect();
        trace!(contours = boxes.len(), "Contours traced");

        let mut candidates: Vec<CandidateBox> = boxes
            .into_iter()
            .map(CandidateBox::new)
            .filter(|c| passes_filter(c, &self.config))
            .collect();
        if self.config.suppress_nested {
            candidates = suppress_nested(candidates);
        }

        debug!(region = %region, candidates = candidates.len(), "Detection pass");

        Some(Detection {
            region,
            enhanced,
            candidates,
        })
    }

    /// Zero far samples and convert the rest to 8 bits
    fn threshold_to_8bit(&self, enhanced: &DepthFrame, scaling: f64) -> GrayImage {
        let threshold = self.config.threshold_ratio * enhanced.mean();
        let raw = enhanced
            .data
            .iter()
            .map(|&v| {
                if v as f64 > threshold {
                    0
                } else {
                    scale_to_u8(v, scaling)
                }
            })
            .collect();

        // Buffer length always matches the crop
        GrayImage::from_raw(enhanced.width, enhanced.height, raw)
            .unwrap_or_else(|| GrayImage::new(enhanced.width, enhanced.height))
    }
}

/// `saturate(round(v / scaling))`
#[inline]
pub fn scale_to_u8(v: u16, scaling: f64) -> u8 {
    (v as f64 / scaling).round().clamp(0.0, u8::MAX as f64) as u8
}

/// Bounding box of a point chain, `None` for an empty chain
pub fn bounding_rect(points: impl IntoIterator<Item = (i32, i32)>) -> Option<Roi> {
    let mut iter = points.into_iter();
    let (x0, y0) = iter.next()?;
    let (min_x, min_y, max_x, max_y) = iter.fold((x0, y0, x0, y0), |(a, b, c, d), (x, y)| {
        (a.min(x), b.min(y), c.max(x), d.max(y))
    });

    Some(Roi::new(
        min_x.max(0) as u32,
        min_y.max(0) as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}

/// Size and shape test applied to every contour box
pub fn passes_filter(candidate: &CandidateBox, config: &DetectorConfig) -> bool {
    let area = candidate.rect.area();
    area > config.min_area as u64
        && area < config.max_area as u64
        && (candidate.aspect - 0.5).abs() < config.max_aspect_deviation
}

/// Drop boxes enclosed by another box; of identical boxes the first is kept
///
/// Canny outlines yield both an outer and an inner border per object.
pub fn suppress_nested(candidates: Vec<CandidateBox>) -> Vec<CandidateBox> {
    candidates
        .iter()
        .enumerate()
        .filter(|&(i, c)| {
            !candidates.iter().enumerate().any(|(j, other)| {
                j != i
                    && other.rect.contains(&c.rect)
                    && (other.rect != c.rect || j < i)
            })
        })
        .map(|(_, c)| *c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(x: u32, y: u32, w: u32, h: u32) -> CandidateBox {
        CandidateBox::new(Roi::new(x, y, w, h))
    }

    #[test]
    fn test_bounding_rect_is_inclusive() {
        let rect = bounding_rect([(3, 4), (10, 4), (10, 9), (3, 9)]).unwrap();
        assert_eq!(rect, Roi::new(3, 4, 8, 6));
        assert_eq!(bounding_rect([(5, 5)]), Some(Roi::new(5, 5, 1, 1)));
        assert_eq!(bounding_rect(std::iter::empty()), None);
    }

    #[test]
    fn test_filter_bounds_are_exclusive() {
        let config = DetectorConfig::default();
        // 16x16 = 256 passes
        assert!(passes_filter(&boxed(0, 0, 16, 16), &config));
        // 10x20 = 200 sits on the lower bound
        assert!(!passes_filter(&boxed(0, 0, 10, 20), &config));
        // 14x25 = 350 sits on the upper bound
        assert!(!passes_filter(&boxed(0, 0, 14, 25), &config));
        // 8x30: aspect 0.21, too elongated
        assert!(!passes_filter(&boxed(0, 0, 8, 30), &config));
    }

    #[test]
    fn test_aspect_bound_is_exclusive() {
        let config = DetectorConfig::default();
        // 12x28 (area 336) has aspect 0.3, right on the bound
        assert!(!passes_filter(&boxed(0, 0, 12, 28), &config));
        // 13x21 (area 273) has aspect ~0.38
        assert!(passes_filter(&boxed(0, 0, 13, 21), &config));
    }

    #[test]
    fn test_suppress_nested() {
        let outer = boxed(10, 10, 17, 17);
        let inner = boxed(11, 11, 15, 15);
        let apart = boxed(50, 50, 16, 16);
        let kept = suppress_nested(vec![inner, outer, apart]);
        assert_eq!(kept, vec![outer, apart]);
    }

    #[test]
    fn test_suppress_keeps_first_duplicate() {
        let a = boxed(10, 10, 16, 16);
        let kept = suppress_nested(vec![a, a]);
        assert_eq!(kept, vec![a]);
    }

    #[test]
    fn test_scale_to_u8_saturates() {
        assert_eq!(scale_to_u8(1000, 5.0), 200);
        assert_eq!(scale_to_u8(1002, 4.0), 251);
        assert_eq!(scale_to_u8(60000, 5.0), 255);
        assert_eq!(scale_to_u8(0, 5.0), 0);
    }

    #[test]
    fn test_region_outside_frame() {
        let detector = CandidateDetector::new(DetectorConfig::default());
        let frame = DepthFrame::filled(64, 64, 100);
        assert!(detector.detect(&frame, Roi::new(100, 100, 10, 10), 5.0).is_none());
    }

    #[test]
    fn test_uniform_region_has_no_candidates() {
        let detector = CandidateDetector::new(DetectorConfig::default());
        let frame = DepthFrame::filled(160, 120, 60000);
        let detection = detector.detect(&frame, Roi::new(20, 20, 64, 64), 5.0).unwrap();
        assert!(detection.candidates.is_empty());
        assert_eq!((detection.enhanced.width, detection.enhanced.height), (64, 64));
    }
}
