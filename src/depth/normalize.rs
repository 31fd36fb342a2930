// SPDX-License-Identifier: GPL-3.0-only

//! Near-plane offset subtraction
//!
//! Every sample has a scalar offset removed. Samples closer than the offset
//! wrap around to the top of the 16-bit range instead of clamping to zero,
//! so after the 8-bit conversion near clutter shows up bright and is kept
//! apart from the dark band around the objects of interest.

use crate::config::NormalizerConfig;
use super::DepthFrame;
use tracing::debug;

/// How samples smaller than the offset are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetMode {
    /// `(d - o) mod 2^16`
    #[default]
    Wrapping,
    /// `max(d - o, 0)`
    Saturating,
}

/// Offset in depth units for a surface at `surface_distance_m` and objects
/// `object_height_m` tall
///
/// Out-of-range results saturate to `0..=u16::MAX`.
pub fn near_plane_offset(
    surface_distance_m: f64,
    object_height_m: f64,
    units_per_meter: f64,
) -> u16 {
    // float-to-int casts saturate and map NaN to 0
    ((surface_distance_m - object_height_m) * units_per_meter).round() as u16
}

/// Remove `offset` from a single sample
#[inline]
pub fn subtract_offset(sample: u16, offset: u16, mode: OffsetMode) -> u16 {
    match mode {
        OffsetMode::Wrapping => sample.wrapping_sub(offset),
        OffsetMode::Saturating => sample.saturating_sub(offset),
    }
}

/// Applies the near-plane offset to whole frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameNormalizer {
    offset: u16,
    mode: OffsetMode,
}

impl FrameNormalizer {
    pub fn new(offset: u16, mode: OffsetMode) -> Self {
        Self { offset, mode }
    }

    /// Build from configuration and the source's calibration
    pub fn from_config(config: &NormalizerConfig, units_per_meter: f64) -> Self {
        let offset = near_plane_offset(
            config.surface_distance_m,
            config.object_height_m,
            units_per_meter,
        );
        let mode = if config.wrapping {
            OffsetMode::Wrapping
        } else {
            OffsetMode::Saturating
        };

        debug!(offset, ?mode, units_per_meter, "Frame normalizer configured");
        Self::new(offset, mode)
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn mode(&self) -> OffsetMode {
        self.mode
    }

    pub fn normalize_in_place(&self, frame: &mut DepthFrame) {
        if self.offset == 0 {
            return;
        }
        for sample in &mut frame.data {
            *sample = subtract_offset(*sample, self.offset, self.mode);
        }
    }

    pub fn normalize(&self, frame: &DepthFrame) -> DepthFrame {
        let mut out = frame.clone();
        self.normalize_in_place(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_below_offset() {
        assert_eq!(subtract_offset(7499, 7500, OffsetMode::Wrapping), 65535);
        assert_eq!(subtract_offset(0, 7500, OffsetMode::Wrapping), 58036);
        assert_eq!(subtract_offset(7500, 7500, OffsetMode::Wrapping), 0);
        assert_eq!(subtract_offset(8000, 7500, OffsetMode::Wrapping), 500);
    }

    #[test]
    fn test_saturating_below_offset() {
        assert_eq!(subtract_offset(7499, 7500, OffsetMode::Saturating), 0);
        assert_eq!(subtract_offset(8000, 7500, OffsetMode::Saturating), 500);
    }

    #[test]
    fn test_wrap_matches_modular_arithmetic() {
        let offset = 7500u16;
        for d in (0u32..=u16::MAX as u32).step_by(97) {
            let expected = (d as i64 - offset as i64).rem_euclid(1 << 16) as u16;
            assert_eq!(
                subtract_offset(d as u16, offset, OffsetMode::Wrapping),
                expected
            );
        }
    }

    #[test]
    fn test_near_plane_offset() {
        assert_eq!(near_plane_offset(0.9, 0.02, 1000.0), 880);
        assert_eq!(near_plane_offset(7.5, 0.0, 1000.0), 7500);
        // Object taller than the camera height
        assert_eq!(near_plane_offset(0.1, 0.5, 1000.0), 0);
        // Beyond the 16-bit range
        assert_eq!(near_plane_offset(100.0, 0.0, 1000.0), u16::MAX);
    }

    #[test]
    fn test_normalize_frame() {
        let frame = DepthFrame::new(3, 1, vec![100, 1000, 5]).unwrap();
        let normalizer = FrameNormalizer::new(10, OffsetMode::Wrapping);
        let out = normalizer.normalize(&frame);
        assert_eq!(out.data, vec![90, 990, 65531]);
        // Source frame untouched
        assert_eq!(frame.data, vec![100, 1000, 5]);
    }

    #[test]
    fn test_from_config_picks_mode() {
        let mut config = NormalizerConfig::default();
        config.surface_distance_m = 1.0;
        config.object_height_m = 0.25;
        config.wrapping = false;
        let normalizer = FrameNormalizer::from_config(&config, 1000.0);
        assert_eq!(normalizer.offset(), 750);
        assert_eq!(normalizer.mode(), OffsetMode::Saturating);
    }
}
