// SPDX-License-Identifier: GPL-3.0-only

//! Per-run viewer state and the capture loop
//!
//! A [`Session`] owns everything that changes while the viewer runs: the
//! 8-bit conversion divisor, the region of interest and the frame counter.
//! [`run`] drives one blocking iteration per frame:
//!
//! ```text
//! wait_for_frame ─► normalize ─► [select region once] ─► detect ─► render
//!        ▲                                                          │
//!        └──────────── keys (+ / -) ◄── present ◄── [snapshot] ◄────┘
//! ```

use crate::backends::DepthSource;
use crate::config::Config;
use crate::constants::{display, timing};
use crate::depth::{FrameNormalizer, Roi};
use crate::detect::CandidateDetector;
use crate::display::DisplaySurface;
use crate::errors::{AppError, AppResult};
use crate::render::{DisplayFrame, Renderer, save_snapshot};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Divisor for the 16-bit to 8-bit conversion, always positive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling(f64);

impl Scaling {
    /// `None` unless `value` is a positive finite number
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && value > 0.0).then_some(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn increment(&mut self) {
        self.0 += display::SCALING_STEP;
    }

    /// Returns false (and keeps the value) if the result would not be positive
    pub fn decrement(&mut self) -> bool {
        let next = self.0 - display::SCALING_STEP;
        if next <= 0.0 {
            return false;
        }
        self.0 = next;
        true
    }

    /// Handle a key press; returns true if the divisor changed
    pub fn apply_key(&mut self, key: char) -> bool {
        match key {
            '+' => {
                self.increment();
                debug!(scaling = self.0, "Scaling increased");
                true
            }
            '-' => {
                let changed = self.decrement();
                if changed {
                    debug!(scaling = self.0, "Scaling decreased");
                } else {
                    info!(scaling = self.0, "Scaling already at its minimum");
                }
                changed
            }
            _ => false,
        }
    }
}

impl Default for Scaling {
    fn default() -> Self {
        Self(display::INITIAL_SCALING)
    }
}

impl fmt::Display for Scaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// Region of interest lifecycle; moves to `Tracking` exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionState {
    #[default]
    AwaitingRegion,
    Tracking(Roi),
}

/// Mutable state of one viewer run
#[derive(Debug, Clone)]
pub struct Session {
    region: RegionState,
    scaling: Scaling,
    frame_counter: u64,
}

impl Session {
    pub fn new(scaling: Scaling) -> Self {
        Self {
            region: RegionState::AwaitingRegion,
            scaling,
            frame_counter: 0,
        }
    }

    pub fn region_state(&self) -> RegionState {
        self.region
    }

    pub fn region(&self) -> Option<Roi> {
        match self.region {
            RegionState::AwaitingRegion => None,
            RegionState::Tracking(roi) => Some(roi),
        }
    }

    /// Offer a selection for a `width` x `height` frame
    ///
    /// Accepted only while no region is set, and only if something of it
    /// remains after clipping to the frame. Returns true on the transition.
    pub fn offer_region(&mut self, selection: Option<Roi>, width: u32, height: u32) -> bool {
        if let RegionState::Tracking(current) = self.region {
            debug!(region = %current, "Region already set, ignoring selection");
            return false;
        }

        match selection.and_then(|roi| roi.clip_to(width, height)) {
            Some(roi) => {
                info!(region = %roi, "Region of interest set");
                self.region = RegionState::Tracking(roi);
                true
            }
            None => {
                debug!(?selection, "Empty region selection, will ask again");
                false
            }
        }
    }

    /// Count a new frame; the first frame is number 1
    pub fn advance(&mut self) -> u64 {
        self.frame_counter += 1;
        self.frame_counter
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn scaling(&self) -> Scaling {
        self.scaling
    }

    pub fn scaling_mut(&mut self) -> &mut Scaling {
        &mut self.scaling
    }
}

/// Bounds on a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunLimits {
    /// Stop after this many frames have been shown
    pub max_frames: Option<u64>,
}

/// What a finished run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub candidates_seen: u64,
    pub region: Option<Roi>,
    pub final_scaling: f64,
    pub snapshot_written: bool,
    pub acquisition_errors: u64,
}

fn status_line(session: &Session, frame: &DisplayFrame) -> String {
    let region = match frame.region {
        Some(roi) => roi.to_string(),
        None => "no region".to_string(),
    };
    format!(
        "scale {} | frame {} | {} candidates | {} | +/- scale, q quit",
        session.scaling(),
        frame.frame_counter,
        frame.candidates.len(),
        region
    )
}

/// Run the viewer until the surface asks to quit, the frame limit is hit,
/// or the source keeps failing
pub fn run(
    source: &mut dyn DepthSource,
    surface: &mut dyn DisplaySurface,
    config: &Config,
    limits: RunLimits,
) -> AppResult<RunSummary> {
    let scaling = Scaling::new(config.display.initial_scaling).ok_or_else(|| {
        AppError::Config(format!(
            "invalid initial scaling {}",
            config.display.initial_scaling
        ))
    })?;

    let normalizer =
        FrameNormalizer::from_config(&config.normalizer, source.depth_units_per_meter());
    let detector = CandidateDetector::new(config.detector.clone());
    let renderer = Renderer::new(&config.display);
    let mut session = Session::new(scaling);

    let mut summary = RunSummary {
        frames: 0,
        candidates_seen: 0,
        region: None,
        final_scaling: scaling.value(),
        snapshot_written: false,
        acquisition_errors: 0,
    };
    let mut consecutive_errors = 0u32;
    let mut preset_rejected = false;
    let started = Instant::now();

    info!(
        source = %source.descriptor(),
        offset = normalizer.offset(),
        scaling = %scaling,
        "Starting depth viewer"
    );

    loop {
        if surface.should_quit() {
            info!("Quit requested");
            break;
        }
        if limits.max_frames.is_some_and(|max| session.frame_counter() >= max) {
            info!(frames = session.frame_counter(), "Frame limit reached");
            break;
        }

        let mut frame = match source.wait_for_frame() {
            Ok(frame) => {
                consecutive_errors = 0;
                frame
            }
            Err(e) => {
                consecutive_errors += 1;
                summary.acquisition_errors += 1;
                warn!(error = %e, consecutive_errors, "Failed to acquire depth frame");
                if consecutive_errors >= config.source.max_consecutive_errors {
                    return Err(e.into());
                }
                continue;
            }
        };

        normalizer.normalize_in_place(&mut frame);
        let counter = session.advance();
        trace!(counter, sequence = frame.sequence, "Frame normalized");

        if session.region().is_none() {
            let selection = match config.roi {
                Some(roi) => Some(roi),
                None if surface.can_select_region() => {
                    let preview = renderer.render(&frame, None, session.scaling().value(), counter);
                    surface.select_region(&preview)?
                }
                None => None,
            };
            let accepted = session.offer_region(selection, frame.width, frame.height);

            if let Some(roi) = config.roi
                && !accepted
                && !preset_rejected
            {
                warn!(
                    region = %roi,
                    width = frame.width,
                    height = frame.height,
                    "Configured region lies outside the frame, nothing will be detected"
                );
                preset_rejected = true;
            }
        }

        let detection = session
            .region()
            .and_then(|roi| detector.detect(&frame, roi, session.scaling().value()));
        let display_frame =
            renderer.render(&frame, detection.as_ref(), session.scaling().value(), counter);
        summary.candidates_seen += display_frame.candidates.len() as u64;

        if config.snapshot.enabled && counter == config.snapshot.frame {
            match save_snapshot(&display_frame, &config.snapshot.path) {
                Ok(()) => summary.snapshot_written = true,
                Err(e) => warn!(error = %e, "Failed to save debug snapshot"),
            }
        }

        surface.present(&display_frame, &status_line(&session, &display_frame))?;

        while let Some(key) = surface.poll_key()? {
            session.scaling_mut().apply_key(key);
        }

        if counter % timing::FRAME_LOG_INTERVAL == 0 {
            let elapsed = started.elapsed().as_secs_f64();
            debug!(
                frames = counter,
                fps = %format!("{:.1}", counter as f64 / elapsed.max(f64::EPSILON)),
                candidates = display_frame.candidates.len(),
                scaling = %session.scaling(),
                "Viewer progress"
            );
        }
    }

    summary.frames = session.frame_counter();
    summary.region = session.region();
    summary.final_scaling = session.scaling().value();
    info!(
        frames = summary.frames,
        candidates = summary.candidates_seen,
        errors = summary.acquisition_errors,
        "Depth viewer stopped"
    );
    Ok(summary)
}
