// SPDX-License-Identifier: GPL-3.0-only

//! Depth source abstraction
//!
//! The viewer only needs a handful of operations from a depth camera:
//! sensor option queries, a calibration constant, and a blocking
//! "next frame" call. [`DepthSource`] captures exactly that so the loop can
//! run against a V4L2 device or a recorded sequence.
//!
//! ```text
//! ┌──────────────────────┐
//! │   Session loop       │
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │  DepthSource trait   │  ← options, calibration, wait_for_frame
//! └──────────┬───────────┘
//!       ┌────┴─────┐
//!       ▼          ▼
//!  ┌─────────┐ ┌────────┐
//!  │  V4L2   │ │ Replay │
//!  └─────────┘ └────────┘
//! ```

pub mod replay;
pub mod v4l2_controls;
pub mod v4l2_depth;

pub use replay::ReplaySource;
pub use v4l2_depth::{V4l2DepthSource, enumerate_depth_devices};

use crate::config::SourceConfig;
use crate::depth::DepthFrame;
use crate::errors::{SourceError, SourceResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Sensor options the viewer knows how to configure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorOption {
    EmitterEnabled,
    LaserPower,
    Accuracy,
    MotionRange,
    FilterOption,
    ConfidenceThreshold,
    FramesQueueSize,
    DepthUnits,
    Exposure,
    Gain,
}

impl SensorOption {
    pub const ALL: [SensorOption; 10] = [
        SensorOption::EmitterEnabled,
        SensorOption::LaserPower,
        SensorOption::Accuracy,
        SensorOption::MotionRange,
        SensorOption::FilterOption,
        SensorOption::ConfidenceThreshold,
        SensorOption::FramesQueueSize,
        SensorOption::DepthUnits,
        SensorOption::Exposure,
        SensorOption::Gain,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SensorOption::EmitterEnabled => "Emitter Enabled",
            SensorOption::LaserPower => "Laser Power",
            SensorOption::Accuracy => "Accuracy",
            SensorOption::MotionRange => "Motion Range",
            SensorOption::FilterOption => "Filter Option",
            SensorOption::ConfidenceThreshold => "Confidence Threshold",
            SensorOption::FramesQueueSize => "Frames Queue Size",
            SensorOption::DepthUnits => "Depth Units",
            SensorOption::Exposure => "Exposure",
            SensorOption::Gain => "Gain",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SensorOption::EmitterEnabled => "Turn the structured-light projector on or off",
            SensorOption::LaserPower => "Projector power level",
            SensorOption::Accuracy => "Number of patterns projected per frame",
            SensorOption::MotionRange => "Trade-off between motion blur and range",
            SensorOption::FilterOption => "Depth post-processing filter preset",
            SensorOption::ConfidenceThreshold => "Minimum confidence for a valid depth sample",
            SensorOption::FramesQueueSize => "Frames buffered before the oldest is dropped",
            SensorOption::DepthUnits => "Size of one depth unit in micrometres",
            SensorOption::Exposure => "Sensor exposure time",
            SensorOption::Gain => "Sensor analog gain",
        }
    }
}

impl fmt::Display for SensorOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value range of a sensor option
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
}

/// What a source is streaming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Human-readable name (V4L2 card or replay directory)
    pub name: String,
    /// Device path or replay directory
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {}x{}@{}fps",
            self.name, self.path, self.width, self.height, self.fps
        )
    }
}

/// A producer of depth frames
pub trait DepthSource {
    fn descriptor(&self) -> &SourceDescriptor;

    /// Depth units per meter, read once from the device
    fn depth_units_per_meter(&self) -> f64;

    fn supports(&self, option: SensorOption) -> bool;

    fn get_option(&self, option: SensorOption) -> Option<f32>;

    fn set_option(&mut self, option: SensorOption, value: f32) -> SourceResult<()>;

    fn option_range(&self, option: SensorOption) -> Option<OptionRange>;

    /// Block until the next frame is available
    ///
    /// The wait is bounded by the source; a timeout is reported as
    /// [`SourceError::Timeout`].
    fn wait_for_frame(&mut self) -> SourceResult<DepthFrame>;
}

/// State of one sensor option on a source
#[derive(Debug, Clone, PartialEq)]
pub struct OptionReport {
    pub option: SensorOption,
    pub supported: bool,
    pub value: Option<f32>,
    pub range: Option<OptionRange>,
}

/// Query every known option, in [`SensorOption::ALL`] order
pub fn describe_options(source: &dyn DepthSource) -> Vec<OptionReport> {
    SensorOption::ALL
        .iter()
        .map(|&option| {
            let supported = source.supports(option);
            OptionReport {
                option,
                supported,
                value: supported.then(|| source.get_option(option)).flatten(),
                range: supported.then(|| source.option_range(option)).flatten(),
            }
        })
        .collect()
}

/// Apply the startup sensor configuration
///
/// Options the source does not support are skipped silently. Failures to set
/// a supported option are logged and do not stop startup.
pub fn configure_sensor(source: &mut dyn DepthSource, config: &SourceConfig) {
    if config.emitter_enabled {
        apply_option(source, SensorOption::EmitterEnabled, 1.0);
    }

    if source.supports(SensorOption::LaserPower) {
        if let Some(range) = source.option_range(SensorOption::LaserPower) {
            debug!(min = range.min, max = range.max, "Laser power range");
            apply_option(source, SensorOption::LaserPower, range.max);
        }
        if let Some(power) = config.laser_power {
            apply_option(source, SensorOption::LaserPower, power);
        }
    }

    for (&option, &value) in &config.options {
        apply_option(source, option, value);
    }
}

fn apply_option(source: &mut dyn DepthSource, option: SensorOption, value: f32) {
    if !source.supports(option) {
        debug!(%option, "Sensor option not supported, skipping");
        return;
    }

    match source.set_option(option, value) {
        Ok(()) => info!(%option, value, "Sensor option set"),
        Err(e) => warn!(%option, value, error = %e, "Failed to set sensor option"),
    }
}

/// Open the source described by the configuration
///
/// A replay directory wins over a device. Without either, the first V4L2
/// node that offers 16-bit depth is used.
pub fn open_source(config: &SourceConfig) -> SourceResult<Box<dyn DepthSource>> {
    if let Some(dir) = &config.replay_dir {
        return Ok(Box::new(ReplaySource::open(dir, config)?));
    }

    let path = match &config.device {
        Some(path) => path.clone(),
        None => enumerate_depth_devices()
            .into_iter()
            .find(|d| d.has_z16)
            .map(|d| d.path)
            .ok_or_else(|| {
                SourceError::DeviceNotFound("no V4L2 node offers Z16 depth".to_string())
            })?,
    };

    Ok(Box::new(V4l2DepthSource::open(&path, config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_serde_names() {
        let json = serde_json::to_string(&SensorOption::LaserPower).unwrap();
        assert_eq!(json, "\"laser_power\"");
        let parsed: SensorOption = serde_json::from_str("\"emitter_enabled\"").unwrap();
        assert_eq!(parsed, SensorOption::EmitterEnabled);
    }

    #[test]
    fn test_describe_options_covers_all() {
        let source = ReplaySource::from_frames(vec![DepthFrame::filled(2, 2, 0)]).unwrap();
        let reports = describe_options(&source);
        assert_eq!(reports.len(), SensorOption::ALL.len());

        let laser = reports
            .iter()
            .find(|r| r.option == SensorOption::LaserPower)
            .unwrap();
        assert!(laser.supported);
        assert_eq!(laser.range.map(|r| r.max), Some(360.0));

        let accuracy = reports
            .iter()
            .find(|r| r.option == SensorOption::Accuracy)
            .unwrap();
        assert!(!accuracy.supported);
        assert_eq!(accuracy.value, None);
    }

    #[test]
    fn test_all_options_named() {
        for option in SensorOption::ALL {
            assert!(!option.name().is_empty());
            assert!(!option.description().is_empty());
        }
    }
}
