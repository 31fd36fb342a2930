// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture of 16-bit depth (Z16)
//!
//! Structured-light cameras expose their depth stream as a `Z16 ` node:
//! one little-endian `u16` per pixel in device depth units. Frames are read
//! synchronously from a memory-mapped stream; the caller's loop blocks on
//! [`DepthSource::wait_for_frame`] and nothing runs in the background.

use super::v4l2_controls::{self, cid};
use super::{DepthSource, OptionRange, SensorOption, SourceDescriptor};
use crate::config::SourceConfig;
use crate::constants::{depth, stream as stream_defaults};
use crate::depth::{DepthFrame, samples_from_le_bytes};
use crate::errors::{SourceError, SourceResult};
use std::time::Instant;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;

/// A V4L2 node found during enumeration
#[derive(Debug, Clone)]
pub struct DepthDeviceInfo {
    pub path: String,
    pub card: String,
    pub driver: String,
    /// Node advertises the `Z16 ` pixel format
    pub has_z16: bool,
}

/// List `/dev/video*` nodes, marking those that can stream 16-bit depth
pub fn enumerate_depth_devices() -> Vec<DepthDeviceInfo> {
    let z16 = v4l::FourCC::new(stream_defaults::Z16_FOURCC);

    let mut paths: Vec<String> = match std::fs::read_dir("/dev") {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path().to_string_lossy().to_string())
            .filter(|p| p.starts_with("/dev/video"))
            .collect(),
        Err(e) => {
            warn!(error = %e, "Failed to read /dev");
            return Vec::new();
        }
    };
    // /dev/video10 after /dev/video9
    paths.sort_by_key(|p| {
        p.trim_start_matches("/dev/video")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    paths
        .into_iter()
        .filter_map(|path| {
            let info = v4l2_controls::query_device_info(&path)?;
            let has_z16 = Device::with_path(&path)
                .and_then(|dev| dev.enum_formats())
                .map(|formats| formats.iter().any(|f| f.fourcc == z16))
                .unwrap_or(false);

            debug!(path, card = %info.card, has_z16, "Found V4L2 node");
            Some(DepthDeviceInfo {
                path,
                card: info.card,
                driver: info.driver,
                has_z16,
            })
        })
        .collect()
}

/// Depth camera streaming Z16 frames over V4L2
pub struct V4l2DepthSource {
    descriptor: SourceDescriptor,
    stream: MmapStream<'static>,
    units_per_meter: f64,
    frame_count: u64,
}

impl V4l2DepthSource {
    /// Open `device_path` and start streaming at the configured size and rate
    pub fn open(device_path: &str, config: &SourceConfig) -> SourceResult<Self> {
        info!(
            device_path,
            width = config.width,
            height = config.height,
            fps = config.fps,
            "Opening V4L2 depth device"
        );

        let dev = Device::with_path(device_path).map_err(|e| {
            SourceError::InitializationFailed(format!(
                "Failed to open V4L2 device {}: {}",
                device_path, e
            ))
        })?;

        let z16 = v4l::FourCC::new(stream_defaults::Z16_FOURCC);
        let mut format = dev.format().map_err(|e| {
            SourceError::InitializationFailed(format!("Failed to query format: {}", e))
        })?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = z16;

        let applied = dev.set_format(&format).map_err(|e| {
            SourceError::FormatNotSupported(format!(
                "{}x{} Z16: {}",
                config.width, config.height, e
            ))
        })?;
        if applied.fourcc != z16 {
            return Err(SourceError::FormatNotSupported(format!(
                "device switched to {} instead of Z16",
                applied.fourcc
            )));
        }
        if applied.width != config.width || applied.height != config.height {
            warn!(
                requested_width = config.width,
                requested_height = config.height,
                width = applied.width,
                height = applied.height,
                "Device adjusted the depth resolution"
            );
        }

        if let Err(e) = dev.set_params(&Parameters::with_fps(config.fps)) {
            warn!(error = %e, fps = config.fps, "Could not set frame rate, using device default");
        }

        let card = v4l2_controls::query_device_info(device_path)
            .map(|info| info.card)
            .unwrap_or_else(|| device_path.to_string());

        let units_per_meter = v4l2_controls::get_control(device_path, cid::DEPTH_UNITS)
            .filter(|&um| um > 0)
            .map(|um| depth::MICROMETERS_PER_METER / um as f64)
            .unwrap_or(depth::DEFAULT_UNITS_PER_METER);
        info!(units_per_meter, "Depth calibration");

        let mut stream =
            MmapStream::with_buffers(&dev, Type::VideoCapture, stream_defaults::BUFFER_COUNT)
                .map_err(|e| {
                    SourceError::InitializationFailed(format!(
                        "Failed to create buffer stream: {}",
                        e
                    ))
                })?;
        stream.set_timeout(stream_defaults::FRAME_TIMEOUT);

        info!("V4L2 depth capture stream started");

        Ok(Self {
            descriptor: SourceDescriptor {
                name: card,
                path: device_path.to_string(),
                width: applied.width,
                height: applied.height,
                fps: config.fps,
            },
            stream,
            units_per_meter,
            frame_count: 0,
        })
    }

    fn control(&self, option: SensorOption) -> Option<v4l2_controls::ControlInfo> {
        let id = v4l2_controls::control_id(option)?;
        v4l2_controls::query_control(&self.descriptor.path, id).filter(|info| !info.is_disabled())
    }
}

impl DepthSource for V4l2DepthSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn depth_units_per_meter(&self) -> f64 {
        self.units_per_meter
    }

    fn supports(&self, option: SensorOption) -> bool {
        v4l2_controls::control_id(option)
            .is_some_and(|id| v4l2_controls::has_control(&self.descriptor.path, id))
    }

    fn get_option(&self, option: SensorOption) -> Option<f32> {
        let id = v4l2_controls::control_id(option)?;
        v4l2_controls::get_control(&self.descriptor.path, id).map(|v| v as f32)
    }

    fn set_option(&mut self, option: SensorOption, value: f32) -> SourceResult<()> {
        let info = self
            .control(option)
            .ok_or_else(|| SourceError::OptionFailed(format!("{} is not supported", option)))?;
        if info.is_read_only() {
            return Err(SourceError::OptionFailed(format!("{} is read-only", option)));
        }

        v4l2_controls::set_control(&self.descriptor.path, info.id, value.round() as i32)
            .map_err(SourceError::OptionFailed)
    }

    fn option_range(&self, option: SensorOption) -> Option<OptionRange> {
        self.control(option).map(|info| OptionRange {
            min: info.minimum as f32,
            max: info.maximum as f32,
            step: info.step as f32,
            default: info.default_value as f32,
        })
    }

    fn wait_for_frame(&mut self) -> SourceResult<DepthFrame> {
        let captured_at = Instant::now();
        let (buf, meta) = self.stream.next()?;

        let expected = self.descriptor.width as usize * self.descriptor.height as usize * 2;
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        if used < expected {
            return Err(SourceError::InvalidFrame(format!(
                "got {} bytes, expected {}",
                used, expected
            )));
        }

        let mut frame = DepthFrame::new(
            self.descriptor.width,
            self.descriptor.height,
            samples_from_le_bytes(&buf[..expected]),
        )?;
        frame.sequence = meta.sequence;
        frame.captured_at = captured_at;

        self.frame_count += 1;
        if self.frame_count % 60 == 0 {
            debug!(
                frame = self.frame_count,
                sequence = meta.sequence,
                elapsed_us = captured_at.elapsed().as_micros(),
                "Depth frame captured"
            );
        }

        Ok(frame)
    }
}

impl Drop for V4l2DepthSource {
    fn drop(&mut self) {
        info!(device = %self.descriptor.path, "Closing V4L2 depth stream");
    }
}
