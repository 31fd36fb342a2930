// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants
//!
//! Defaults for every tunable live here; `config` copies them into the
//! runtime configuration so scene-specific calibration can be overridden.

use std::time::Duration;

/// Application name used for config and cache directories
pub const APP_NAME: &str = "depth-roi";

/// Depth stream settings requested from the device
pub mod stream {
    /// Frame width in pixels
    pub const WIDTH: u32 = 640;
    /// Frame height in pixels
    pub const HEIGHT: u32 = 480;
    /// Target frame rate
    pub const FPS: u32 = 30;
    /// V4L2 FourCC for 16-bit little-endian depth
    pub const Z16_FOURCC: &[u8; 4] = b"Z16 ";
    /// Number of memory-mapped capture buffers
    pub const BUFFER_COUNT: u32 = 4;
    /// How long a blocking frame wait may take before it counts as a failure
    pub const FRAME_TIMEOUT: super::Duration = super::Duration::from_millis(1000);
    /// Consecutive acquisition failures tolerated before the run ends
    pub const MAX_CONSECUTIVE_ERRORS: u32 = 30;
}

/// Depth unit calibration
pub mod depth {
    /// Depth units per meter when the device does not report them (1 unit = 1 mm)
    pub const DEFAULT_UNITS_PER_METER: f64 = 1000.0;
    /// Micrometres in a meter, for converting the V4L2 depth unit control
    pub const MICROMETERS_PER_METER: f64 = 1_000_000.0;
}

/// Near-plane offset defaults
///
/// With the default calibration these produce the 7500-unit offset the
/// viewer has always used.
pub mod normalizer {
    /// Distance from the camera to the table surface (meters)
    pub const SURFACE_DISTANCE_M: f64 = 7.5;
    /// Expected height of the objects above the surface (meters)
    pub const OBJECT_HEIGHT_M: f64 = 0.0;
}

/// Candidate detector defaults
pub mod detector {
    /// CLAHE tile grid (tiles per axis)
    pub const CLAHE_TILES: u32 = 8;
    /// CLAHE clip limit
    pub const CLAHE_CLIP_LIMIT: f64 = 5.0;
    /// Samples above `ratio * mean` are zeroed after enhancement
    pub const THRESHOLD_RATIO: f64 = 0.5;
    /// Canny hysteresis low threshold
    pub const CANNY_LOW: f32 = 0.0;
    /// Canny hysteresis high threshold
    pub const CANNY_HIGH: f32 = 255.0;
    /// Candidate area lower bound (exclusive, pixels)
    pub const MIN_AREA: u32 = 200;
    /// Candidate area upper bound (exclusive, pixels)
    pub const MAX_AREA: u32 = 350;
    /// Maximum deviation of `w / (w + h)` from 0.5 (exclusive)
    pub const MAX_ASPECT_DEVIATION: f64 = 0.2;
}

/// Visualization defaults
pub mod display {
    /// Initial divisor for the 16-bit to 8-bit conversion
    pub const INITIAL_SCALING: f64 = 5.0;
    /// Amount one `+` or `-` key press changes the divisor by
    pub const SCALING_STEP: f64 = 1.0;
    /// Pixel height of candidate labels and the frame counter
    pub const LABEL_SCALE: f32 = 14.0;
    /// Label color (RGB)
    pub const LABEL_COLOR: [u8; 3] = [255, 255, 0];
    /// Candidate outline color (RGB)
    pub const BOX_COLOR: [u8; 3] = [255, 64, 64];
    /// Frame counter position in image pixels
    pub const COUNTER_POSITION: (i32, i32) = (8, 8);
    /// Key poll interval for the terminal surface
    pub const KEY_POLL_INTERVAL: super::Duration = super::Duration::from_millis(1);
}

/// Debug snapshot defaults
pub mod snapshot {
    /// Frame number at which the annotated image is written
    pub const FRAME: u64 = 100;
    /// Output path, relative to the working directory
    pub const PATH: &str = "depth_snapshot.png";
}

/// Logging cadence
pub mod timing {
    /// Interval (in frames) between periodic summary logs
    pub const FRAME_LOG_INTERVAL: u64 = 30;
}

/// Replay input formats
pub mod file_formats {
    /// 16-bit grayscale image formats accepted by the replay source
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "tif", "tiff", "pgm"];
    /// Raw little-endian 16-bit depth dumps
    pub const RAW_EXTENSION: &str = "z16";

    /// Check if a lowercase extension is a replayable frame file
    pub fn is_frame_extension(ext: &str) -> bool {
        ext == RAW_EXTENSION || IMAGE_EXTENSIONS.contains(&ext)
    }
}
