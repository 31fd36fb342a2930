// SPDX-License-Identifier: GPL-3.0-only

//! Recorded depth playback
//!
//! Streams frames from a directory of 16-bit grayscale images or raw `.z16`
//! dumps, in file name order, looping at the end. Sensor options live in a
//! small in-memory table so startup configuration behaves like it does on
//! hardware.

use super::{DepthSource, OptionRange, SensorOption, SourceDescriptor};
use crate::config::SourceConfig;
use crate::constants::{depth, file_formats};
use crate::depth::{DepthFrame, samples_from_le_bytes};
use crate::errors::{SourceError, SourceResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
struct OptionState {
    value: f32,
    range: OptionRange,
}

enum Frames {
    Files(Vec<PathBuf>),
    Memory(Vec<DepthFrame>),
}

impl Frames {
    fn len(&self) -> usize {
        match self {
            Frames::Files(files) => files.len(),
            Frames::Memory(frames) => frames.len(),
        }
    }
}

/// Depth source replaying recorded frames
pub struct ReplaySource {
    descriptor: SourceDescriptor,
    frames: Frames,
    next_index: usize,
    sequence: u32,
    frame_interval: Option<Duration>,
    last_frame_at: Option<Instant>,
    options: BTreeMap<SensorOption, OptionState>,
}

impl ReplaySource {
    /// Open a replay directory
    ///
    /// Frames must match the configured dimensions.
    pub fn open(dir: &Path, config: &SourceConfig) -> SourceResult<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| SourceError::DeviceNotFound(format!("{}: {}", dir.display(), e)))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| file_formats::is_frame_extension(&e.to_lowercase()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(SourceError::DeviceNotFound(format!(
                "no depth frames in {}",
                dir.display()
            )));
        }

        info!(dir = %dir.display(), frames = files.len(), "Opened replay source");

        let descriptor = SourceDescriptor {
            name: "Replay".to_string(),
            path: dir.display().to_string(),
            width: config.width,
            height: config.height,
            fps: config.fps,
        };
        Ok(Self::with_frames(descriptor, Frames::Files(files)))
    }

    /// Replay frames held in memory, without pacing
    pub fn from_frames(frames: Vec<DepthFrame>) -> SourceResult<Self> {
        let first = frames
            .first()
            .ok_or_else(|| SourceError::DeviceNotFound("no frames to replay".to_string()))?;
        if let Some(bad) = frames
            .iter()
            .find(|f| f.width != first.width || f.height != first.height)
        {
            return Err(SourceError::InvalidFrame(format!(
                "mixed frame sizes: {}x{} and {}x{}",
                first.width, first.height, bad.width, bad.height
            )));
        }

        let descriptor = SourceDescriptor {
            name: "Memory".to_string(),
            path: "memory".to_string(),
            width: first.width,
            height: first.height,
            fps: 0,
        };
        Ok(Self::with_frames(descriptor, Frames::Memory(frames)))
    }

    fn with_frames(descriptor: SourceDescriptor, frames: Frames) -> Self {
        let frame_interval =
            (descriptor.fps > 0).then(|| Duration::from_secs_f64(1.0 / descriptor.fps as f64));

        Self {
            descriptor,
            frames,
            next_index: 0,
            sequence: 0,
            frame_interval,
            last_frame_at: None,
            options: default_options(),
        }
    }

    /// Disable real-time pacing (frames are returned as fast as they load)
    pub fn without_pacing(mut self) -> Self {
        self.frame_interval = None;
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn load(&self, index: usize) -> SourceResult<DepthFrame> {
        let (width, height) = (self.descriptor.width, self.descriptor.height);
        match &self.frames {
            Frames::Memory(frames) => Ok(frames[index].clone()),
            Frames::Files(files) => load_frame_file(&files[index], width, height),
        }
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_frame_at) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

/// Options a recorded session pretends to have
fn default_options() -> BTreeMap<SensorOption, OptionState> {
    let mut options = BTreeMap::new();
    let entry = |value: f32, min: f32, max: f32, step: f32| OptionState {
        value,
        range: OptionRange {
            min,
            max,
            step,
            default: value,
        },
    };

    options.insert(SensorOption::EmitterEnabled, entry(1.0, 0.0, 1.0, 1.0));
    options.insert(SensorOption::LaserPower, entry(150.0, 0.0, 360.0, 30.0));
    let um_per_unit = (depth::MICROMETERS_PER_METER / depth::DEFAULT_UNITS_PER_METER) as f32;
    options.insert(
        SensorOption::DepthUnits,
        entry(um_per_unit, um_per_unit, um_per_unit, 0.0),
    );
    options
}

/// Decode one recorded frame file
pub fn load_frame_file(path: &Path, width: u32, height: u32) -> SourceResult<DepthFrame> {
    let is_raw = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(file_formats::RAW_EXTENSION));

    if is_raw {
        let bytes = std::fs::read(path)?;
        let expected = width as usize * height as usize * 2;
        if bytes.len() != expected {
            return Err(SourceError::InvalidFrame(format!(
                "{}: {} bytes, expected {}",
                path.display(),
                bytes.len(),
                expected
            )));
        }
        return DepthFrame::new(width, height, samples_from_le_bytes(&bytes));
    }

    let image = image::open(path)?.into_luma16();
    if image.width() != width || image.height() != height {
        return Err(SourceError::InvalidFrame(format!(
            "{}: {}x{}, expected {}x{}",
            path.display(),
            image.width(),
            image.height(),
            width,
            height
        )));
    }
    DepthFrame::new(width, height, image.into_raw())
}

/// Write a frame as a 16-bit PNG that [`ReplaySource`] can read back
pub fn save_frame_png(frame: &DepthFrame, path: &Path) -> SourceResult<()> {
    let image: image::ImageBuffer<image::Luma<u16>, Vec<u16>> =
        image::ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| SourceError::InvalidFrame("frame buffer size mismatch".to_string()))?;
    image.save(path)?;
    Ok(())
}

impl DepthSource for ReplaySource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn depth_units_per_meter(&self) -> f64 {
        self.options
            .get(&SensorOption::DepthUnits)
            .filter(|s| s.value > 0.0)
            .map(|s| depth::MICROMETERS_PER_METER / s.value as f64)
            .unwrap_or(depth::DEFAULT_UNITS_PER_METER)
    }

    fn supports(&self, option: SensorOption) -> bool {
        self.options.contains_key(&option)
    }

    fn get_option(&self, option: SensorOption) -> Option<f32> {
        self.options.get(&option).map(|s| s.value)
    }

    fn set_option(&mut self, option: SensorOption, value: f32) -> SourceResult<()> {
        let state = self
            .options
            .get_mut(&option)
            .ok_or_else(|| SourceError::OptionFailed(format!("{} is not supported", option)))?;
        if value < state.range.min || value > state.range.max {
            return Err(SourceError::OptionFailed(format!(
                "{} out of range {}..={}",
                value, state.range.min, state.range.max
            )));
        }
        state.value = value;
        debug!(%option, value, "Replay option set");
        Ok(())
    }

    fn option_range(&self, option: SensorOption) -> Option<OptionRange> {
        self.options.get(&option).map(|s| s.range)
    }

    fn wait_for_frame(&mut self) -> SourceResult<DepthFrame> {
        self.pace();

        let index = self.next_index;
        self.next_index = (self.next_index + 1) % self.frames.len();

        let mut frame = self.load(index)?;
        frame.sequence = self.sequence;
        frame.captured_at = Instant::now();
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }
}
