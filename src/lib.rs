// SPDX-License-Identifier: GPL-3.0-only

//! depth-roi - live depth camera viewer with region-of-interest object detection
//!
//! Captures 16-bit depth frames, removes a near-plane offset, and looks for
//! small round objects inside a region the user selects once per run.
//!
//! # Architecture
//!
//! - [`backends`]: Depth sources (V4L2 `Z16` capture, recorded replay) and sensor options
//! - [`depth`]: Depth frame and region types, near-plane normalization
//! - [`detect`]: CLAHE, edge and contour based candidate detection
//! - [`render`]: Ocean colormap, overlays and the debug snapshot
//! - [`session`]: Per-run state and the capture loop
//! - [`display`] / [`terminal`]: Display surfaces
//! - [`config`]: JSON configuration
//!
//! # Example
//!
//! ```ignore
//! // Replay a recording without a terminal:
//! // depth-roi --replay ./recording --headless --roi 100,80,160,120
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod depth;
pub mod detect;
pub mod display;
pub mod errors;
pub mod render;
pub mod session;
pub mod terminal;

// Re-export commonly used types
pub use backends::{DepthSource, ReplaySource, SensorOption, V4l2DepthSource};
pub use config::Config;
pub use depth::{DepthFrame, FrameNormalizer, OffsetMode, Roi};
pub use detect::{CandidateBox, CandidateDetector, Detection};
pub use display::{DisplaySurface, HeadlessSurface};
pub use errors::{AppError, AppResult, SourceError, SourceResult};
pub use render::{DisplayFrame, Renderer};
pub use session::{RegionState, RunLimits, RunSummary, Scaling, Session};
pub use terminal::TerminalSurface;
