// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 control access for depth sensors
//!
//! Sensor options are plain V4L2 controls. Projector and depth-unit
//! controls come from the depth control class (`V4L2_CTRL_CLASS_DEPTH`),
//! exposure and gain from the standard user and camera classes.

use super::SensorOption;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use tracing::{debug, warn};

// ===== V4L2 Control Class Bases =====
const V4L2_CTRL_CLASS_USER: u32 = 0x0098_0000;
const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a_0000;
const V4L2_CTRL_CLASS_DEPTH: u32 = 0x00a6_0000;

const V4L2_CID_BASE: u32 = V4L2_CTRL_CLASS_USER | 0x900;
const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;
const V4L2_CID_DEPTH_CLASS_BASE: u32 = V4L2_CTRL_CLASS_DEPTH | 0x900;

/// V4L2 control IDs used for sensor options
pub mod cid {
    use super::{V4L2_CID_BASE, V4L2_CID_CAMERA_CLASS_BASE, V4L2_CID_DEPTH_CLASS_BASE};

    /// Gain control
    pub const GAIN: u32 = V4L2_CID_BASE + 19;
    /// Absolute exposure time in 100µs units
    pub const EXPOSURE_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 2;
    /// Depth unit size in micrometres
    pub const DEPTH_UNITS: u32 = V4L2_CID_DEPTH_CLASS_BASE + 1;
    /// Projector on/off
    pub const DEPTH_ILLUMINATOR_ENABLE: u32 = V4L2_CID_DEPTH_CLASS_BASE + 7;
    /// Projector power
    pub const DEPTH_ILLUMINATOR_POWER: u32 = V4L2_CID_DEPTH_CLASS_BASE + 8;
}

/// Map a sensor option to its V4L2 control, if there is one
pub fn control_id(option: SensorOption) -> Option<u32> {
    match option {
        SensorOption::EmitterEnabled => Some(cid::DEPTH_ILLUMINATOR_ENABLE),
        SensorOption::LaserPower => Some(cid::DEPTH_ILLUMINATOR_POWER),
        SensorOption::DepthUnits => Some(cid::DEPTH_UNITS),
        SensorOption::Exposure => Some(cid::EXPOSURE_ABSOLUTE),
        SensorOption::Gain => Some(cid::GAIN),
        SensorOption::Accuracy
        | SensorOption::MotionRange
        | SensorOption::FilterOption
        | SensorOption::ConfidenceThreshold
        | SensorOption::FramesQueueSize => None,
    }
}

// ===== V4L2 Control Types =====
const V4L2_CTRL_TYPE_INTEGER: u32 = 1;
const V4L2_CTRL_TYPE_BOOLEAN: u32 = 2;
const V4L2_CTRL_TYPE_MENU: u32 = 3;

// ===== V4L2 Control Flags =====
const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;
const V4L2_CTRL_FLAG_READ_ONLY: u32 = 0x0004;

// ===== V4L2 ioctl Numbers =====
// Calculated as: (dir << 30) | (size << 16) | ('V' << 8) | nr

/// Query device capabilities (v4l2_capability: 104 bytes)
const VIDIOC_QUERYCAP: libc::c_ulong = 0x8068_5600;
/// Get control value (v4l2_control: 8 bytes)
const VIDIOC_G_CTRL: libc::c_ulong = 0xC008_561B;
/// Set control value (v4l2_control: 8 bytes)
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008_561C;
/// Query control info (v4l2_queryctrl: 68 bytes)
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC044_5624;

// ===== V4L2 ioctl Structures =====

#[repr(C)]
struct V4l2Capability {
    driver: [u8; 16],
    card: [u8; 32],
    bus_info: [u8; 32],
    version: u32,
    capabilities: u32,
    device_caps: u32,
    reserved: [u32; 3],
}

#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

#[repr(C)]
struct V4l2Queryctrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

// ===== Public Types =====

/// Device identity from QUERYCAP
#[derive(Debug, Clone, Default)]
pub struct V4l2DeviceInfo {
    pub driver: String,
    pub card: String,
    pub bus_info: String,
}

/// V4L2 control type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    Integer,
    Boolean,
    Menu,
    Unknown(u32),
}

impl From<u32> for ControlType {
    fn from(value: u32) -> Self {
        match value {
            V4L2_CTRL_TYPE_INTEGER => ControlType::Integer,
            V4L2_CTRL_TYPE_BOOLEAN => ControlType::Boolean,
            V4L2_CTRL_TYPE_MENU => ControlType::Menu,
            other => ControlType::Unknown(other),
        }
    }
}

/// Information about a V4L2 control
#[derive(Debug, Clone)]
pub struct ControlInfo {
    pub id: u32,
    pub name: String,
    pub ctrl_type: ControlType,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
}

impl ControlInfo {
    pub fn is_disabled(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_DISABLED != 0
    }

    pub fn is_read_only(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_READ_ONLY != 0
    }
}

/// Extract a null-terminated string from a fixed-size byte array
fn extract_name(bytes: &[u8]) -> String {
    let name_len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..name_len]).to_string()
}

// ===== Public Functions =====

/// Query driver, card and bus info
pub fn query_device_info(device_path: &str) -> Option<V4l2DeviceInfo> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut caps = V4l2Capability {
        driver: [0; 16],
        card: [0; 32],
        bus_info: [0; 32],
        version: 0,
        capabilities: 0,
        device_caps: 0,
        reserved: [0; 3],
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCAP, &mut caps as *mut V4l2Capability) };
    if result < 0 {
        return None;
    }

    Some(V4l2DeviceInfo {
        driver: extract_name(&caps.driver),
        card: extract_name(&caps.card),
        bus_info: extract_name(&caps.bus_info),
    })
}

/// Query if a control exists and get its information
pub fn query_control(device_path: &str, control_id: u32) -> Option<ControlInfo> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut qctrl = V4l2Queryctrl {
        id: control_id,
        ctrl_type: 0,
        name: [0; 32],
        minimum: 0,
        maximum: 0,
        step: 0,
        default_value: 0,
        flags: 0,
        reserved: [0; 2],
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCTRL, &mut qctrl as *mut V4l2Queryctrl) };
    if result < 0 {
        return None;
    }

    Some(ControlInfo {
        id: qctrl.id,
        name: extract_name(&qctrl.name),
        ctrl_type: qctrl.ctrl_type.into(),
        minimum: qctrl.minimum,
        maximum: qctrl.maximum,
        step: qctrl.step,
        default_value: qctrl.default_value,
        flags: qctrl.flags,
    })
}

/// Get current value of a control
pub fn get_control(device_path: &str, control_id: u32) -> Option<i32> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value: 0,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_G_CTRL, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        debug!(device_path, control_id, "Failed to get V4L2 control");
        return None;
    }

    Some(ctrl.value)
}

/// Set value of a control
pub fn set_control(device_path: &str, control_id: u32, value: i32) -> Result<(), String> {
    let file = File::open(device_path).map_err(|e| format!("Failed to open device: {}", e))?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_S_CTRL, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        let errno = std::io::Error::last_os_error();
        warn!(
            device_path,
            control_id,
            value,
            ?errno,
            "Failed to set V4L2 control"
        );
        return Err(format!("Failed to set control: {}", errno));
    }

    if ctrl.value != value {
        debug!(
            device_path,
            control_id,
            requested = value,
            actual = ctrl.value,
            "V4L2 control value was clamped"
        );
    }

    Ok(())
}

/// Check if a control is available on the device
pub fn has_control(device_path: &str, control_id: u32) -> bool {
    query_control(device_path, control_id)
        .map(|info| !info.is_disabled())
        .unwrap_or(false)
}
