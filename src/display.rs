// SPDX-License-Identifier: GPL-3.0-only

//! Display surfaces
//!
//! The session loop hands every annotated frame to a [`DisplaySurface`] and
//! asks it for key presses and the one-time region selection. The terminal
//! viewer lives in [`crate::terminal`]; [`HeadlessSurface`] only logs.

use crate::depth::Roi;
use crate::errors::{AppError, AppResult};
use crate::render::DisplayFrame;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Where annotated frames go
pub trait DisplaySurface {
    /// Show a frame together with a one-line status
    fn present(&mut self, frame: &DisplayFrame, status: &str) -> AppResult<()>;

    /// Next pending key press, without blocking
    fn poll_key(&mut self) -> AppResult<Option<char>>;

    /// Let the user pick the region of interest on `frame`
    ///
    /// `None` means no selection was made; the caller asks again on a later
    /// frame.
    fn select_region(&mut self, frame: &DisplayFrame) -> AppResult<Option<Roi>>;

    /// False for surfaces whose `select_region` never yields a region
    fn can_select_region(&self) -> bool {
        true
    }

    /// The user asked to stop
    fn should_quit(&self) -> bool;
}

/// Surface for runs without a terminal
///
/// Candidates are reported through the log. The region has to come from
/// the configuration or the command line.
pub struct HeadlessSurface {
    quit: Arc<AtomicBool>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self {
            quit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop cleanly on Ctrl+C
    ///
    /// Installs the process-wide handler, so call it once per process.
    pub fn with_interrupt_handler() -> AppResult<Self> {
        let surface = Self::new();
        let quit = surface.quit.clone();
        ctrlc::set_handler(move || {
            quit.store(true, Ordering::SeqCst);
        })
        .map_err(|e| AppError::Other(format!("Failed to install Ctrl+C handler: {}", e)))?;
        Ok(surface)
    }

    /// Flag that ends the run when set
    pub fn quit_flag(&self) -> Arc<AtomicBool> {
        self.quit.clone()
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySurface for HeadlessSurface {
    fn present(&mut self, frame: &DisplayFrame, status: &str) -> AppResult<()> {
        if !frame.candidates.is_empty() {
            let boxes: Vec<String> = frame
                .candidates
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{}:{}", i, c.rect))
                .collect();
            info!(
                frame = frame.frame_counter,
                count = frame.candidates.len(),
                boxes = %boxes.join(" "),
                "Candidates"
            );
        }
        debug!(status, "Frame presented");
        Ok(())
    }

    fn poll_key(&mut self) -> AppResult<Option<char>> {
        Ok(None)
    }

    fn select_region(&mut self, _frame: &DisplayFrame) -> AppResult<Option<Roi>> {
        Ok(None)
    }

    fn can_select_region(&self) -> bool {
        false
    }

    fn should_quit(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }
}
