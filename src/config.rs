// SPDX-License-Identifier: GPL-3.0-only

//! Runtime configuration
//!
//! Loaded from JSON. Every field has a default from [`crate::constants`], so
//! a config file only needs the values that differ for a given scene.

use crate::backends::SensorOption;
use crate::constants::{self, APP_NAME};
use crate::depth::Roi;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Depth source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// V4L2 device path (e.g. `/dev/video2`); first depth-capable node if unset
    pub device: Option<String>,
    /// Replay directory used instead of a device
    pub replay_dir: Option<PathBuf>,
    /// Requested frame width
    pub width: u32,
    /// Requested frame height
    pub height: u32,
    /// Requested frame rate
    pub fps: u32,
    /// Turn the IR emitter on at startup
    pub emitter_enabled: bool,
    /// Laser power applied after the power range has been probed
    pub laser_power: Option<f32>,
    /// Additional sensor options applied at startup
    pub options: BTreeMap<SensorOption, f32>,
    /// Consecutive acquisition failures tolerated before giving up
    pub max_consecutive_errors: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            device: None,
            replay_dir: None,
            width: constants::stream::WIDTH,
            height: constants::stream::HEIGHT,
            fps: constants::stream::FPS,
            emitter_enabled: true,
            // Probed at max then switched off, as the viewer always has
            laser_power: Some(0.0),
            options: BTreeMap::new(),
            max_consecutive_errors: constants::stream::MAX_CONSECUTIVE_ERRORS,
        }
    }
}

/// Near-plane offset settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerConfig {
    /// Camera to table distance (meters)
    pub surface_distance_m: f64,
    /// Object height above the table (meters)
    pub object_height_m: f64,
    /// Wrap samples closer than the offset instead of clamping them to zero
    pub wrapping: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            surface_distance_m: constants::normalizer::SURFACE_DISTANCE_M,
            object_height_m: constants::normalizer::OBJECT_HEIGHT_M,
            wrapping: true,
        }
    }
}

/// Candidate detector calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    /// CLAHE tiles per axis
    pub clahe_tiles: u32,
    /// CLAHE clip limit
    pub clahe_clip_limit: f64,
    /// Samples above `threshold_ratio * mean` are zeroed
    pub threshold_ratio: f64,
    /// Canny low threshold
    pub canny_low: f32,
    /// Canny high threshold
    pub canny_high: f32,
    /// Exclusive lower area bound
    pub min_area: u32,
    /// Exclusive upper area bound
    pub max_area: u32,
    /// Exclusive bound on `|w / (w + h) - 0.5|`
    pub max_aspect_deviation: f64,
    /// Drop candidates enclosed by another candidate
    pub suppress_nested: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            clahe_tiles: constants::detector::CLAHE_TILES,
            clahe_clip_limit: constants::detector::CLAHE_CLIP_LIMIT,
            threshold_ratio: constants::detector::THRESHOLD_RATIO,
            canny_low: constants::detector::CANNY_LOW,
            canny_high: constants::detector::CANNY_HIGH,
            min_area: constants::detector::MIN_AREA,
            max_area: constants::detector::MAX_AREA,
            max_aspect_deviation: constants::detector::MAX_ASPECT_DEVIATION,
            suppress_nested: true,
        }
    }
}

/// Visualization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Initial 16-bit to 8-bit divisor
    pub initial_scaling: f64,
    /// Burn candidate labels and the frame counter into the image
    pub burn_labels: bool,
    /// TrueType font for burned-in labels, the bundled font when unset
    pub label_font: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            initial_scaling: constants::display::INITIAL_SCALING,
            burn_labels: true,
            label_font: None,
        }
    }
}

/// One-time debug snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotConfig {
    pub enabled: bool,
    /// Frame number (1-based) to capture
    pub frame: u64,
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frame: constants::snapshot::FRAME,
            path: PathBuf::from(constants::snapshot::PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source: SourceConfig,
    pub normalizer: NormalizerConfig,
    pub detector: DetectorConfig,
    pub display: DisplayConfig,
    pub snapshot: SnapshotConfig,
    /// Preset region of interest; skips interactive selection
    pub roi: Option<Roi>,
}

impl Config {
    /// Default config file location (`$XDG_CONFIG_HOME/depth-roi/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.json"))
    }

    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the default location is
    /// tried and defaults are used if nothing is there.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json(&text)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_json(text: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> AppResult<()> {
        let fail = |msg: &str| Err(AppError::Config(msg.to_string()));

        if self.source.width == 0 || self.source.height == 0 {
            return fail("source width and height must be non-zero");
        }
        if self.source.fps == 0 {
            return fail("source fps must be non-zero");
        }
        if self.source.max_consecutive_errors == 0 {
            return fail("source.max_consecutive_errors must be at least 1");
        }
        if !(self.display.initial_scaling.is_finite() && self.display.initial_scaling > 0.0) {
            return fail("display.initial_scaling must be a positive number");
        }
        if self.detector.clahe_tiles == 0 {
            return fail("detector.clahe_tiles must be non-zero");
        }
        if self.detector.min_area >= self.detector.max_area {
            return fail("detector.min_area must be below detector.max_area");
        }
        if self.detector.canny_low > self.detector.canny_high {
            return fail("detector.canny_low must not exceed detector.canny_high");
        }
        if !(self.detector.max_aspect_deviation > 0.0) {
            return fail("detector.max_aspect_deviation must be positive");
        }
        if let Some(roi) = self.roi
            && roi.is_empty()
        {
            return fail("roi must have a non-zero area");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{ "detector": { "min_area": 150 } }"#).unwrap();
        assert_eq!(config.detector.min_area, 150);
        assert_eq!(config.detector.max_area, constants::detector::MAX_AREA);
        assert_eq!(config.source, SourceConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Config::from_json(r#"{ "detectr": {} }"#).is_err());
    }

    #[test]
    fn test_sensor_options_by_name() {
        let config =
            Config::from_json(r#"{ "source": { "options": { "accuracy": 2.0 } } }"#).unwrap();
        assert_eq!(config.source.options.get(&SensorOption::Accuracy), Some(&2.0));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.display.initial_scaling = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.detector.min_area = 400;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.roi = Some(Roi::new(10, 10, 0, 5));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.source.max_consecutive_errors = 0;
        assert!(config.validate().is_err());
        config.source.max_consecutive_errors = 1;
        assert!(config.validate().is_ok());
    }
}
