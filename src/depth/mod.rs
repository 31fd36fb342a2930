// SPDX-License-Identifier: GPL-3.0-only

//! Depth frame and region types
//!
//! A [`DepthFrame`] is a row-major grid of 16-bit samples in the camera's
//! depth units. Crops of a frame are frames too, so every pipeline stage
//! works on the same type.

pub mod normalize;

use crate::errors::{SourceError, SourceResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

pub use normalize::{FrameNormalizer, OffsetMode, near_plane_offset, subtract_offset};

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned by two drag points (end point exclusive)
    pub fn from_corners(a: (u32, u32), b: (u32, u32)) -> Self {
        let (x0, x1) = (a.0.min(b.0), a.0.max(b.0));
        let (y0, y1) = (a.1.min(b.1), a.1.max(b.1));
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// One past the last column
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// One past the last row
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Intersect with a `width` x `height` frame, `None` if nothing is left
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Roi> {
        let x0 = self.x.min(width);
        let y0 = self.y.min(height);
        let x1 = self.right().min(width);
        let y1 = self.bottom().min(height);
        let clipped = Roi::new(x0, y0, x1 - x0, y1 - y0);
        (!clipped.is_empty()).then_some(clipped)
    }

    /// Check if `other` lies entirely inside this rectangle
    pub fn contains(&self, other: &Roi) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Shift by the origin of an enclosing rectangle
    pub fn offset_by(&self, origin: &Roi) -> Roi {
        Roi::new(self.x + origin.x, self.y + origin.y, self.width, self.height)
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.x, self.y
        )
    }
}

impl FromStr for Roi {
    type Err = String;

    /// Parse `x,y,width,height`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!("expected x,y,width,height, got '{}'", s));
        }

        let mut values = [0u32; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse()
                .map_err(|e| format!("invalid region component '{}': {}", part, e))?;
        }

        Ok(Roi::new(values[0], values[1], values[2], values[3]))
    }
}

/// One captured grid of depth samples
#[derive(Debug, Clone)]
pub struct DepthFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Row-major samples in depth units
    pub data: Vec<u16>,
    /// Frame sequence number from the source
    pub sequence: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl DepthFrame {
    /// Create a frame, checking that the sample count matches the dimensions
    pub fn new(width: u32, height: u32, data: Vec<u16>) -> SourceResult<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(SourceError::InvalidFrame(format!(
                "{}x{} frame needs {} samples, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            data,
            sequence: 0,
            captured_at: Instant::now(),
        })
    }

    /// Frame with every sample set to `value`
    pub fn filled(width: u32, height: u32, value: u16) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u16 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: u16) {
        let idx = y as usize * self.width as usize + x as usize;
        self.data[idx] = value;
    }

    /// Fill a rectangle (clipped to the frame) with `value`
    pub fn fill_rect(&mut self, rect: Roi, value: u16) {
        let Some(rect) = rect.clip_to(self.width, self.height) else {
            return;
        };
        for y in rect.y..rect.bottom() {
            let row = y as usize * self.width as usize;
            self.data[row + rect.x as usize..row + rect.right() as usize].fill(value);
        }
    }

    /// Copy out the sub-grid under `roi` (clipped to the frame)
    pub fn crop(&self, roi: Roi) -> Option<DepthFrame> {
        let roi = roi.clip_to(self.width, self.height)?;
        let mut data = Vec::with_capacity(roi.area() as usize);
        for y in roi.y..roi.bottom() {
            let row = y as usize * self.width as usize;
            data.extend_from_slice(&self.data[row + roi.x as usize..row + roi.right() as usize]);
        }

        Some(DepthFrame {
            width: roi.width,
            height: roi.height,
            data,
            sequence: self.sequence,
            captured_at: self.captured_at,
        })
    }

    /// Mean sample value, 0 for an empty frame
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&v| v as u64).sum();
        sum as f64 / self.data.len() as f64
    }
}

/// Decode little-endian 16-bit samples from a raw byte buffer
///
/// A trailing odd byte is ignored.
pub fn samples_from_le_bytes(bytes: &[u8]) -> Vec<u16> {
    let even = &bytes[..bytes.len() & !1];
    let mut samples: Vec<u16> = bytemuck::pod_collect_to_vec(even);
    if cfg!(target_endian = "big") {
        for sample in &mut samples {
            *sample = u16::from_le(*sample);
        }
    }
    samples
}
