// SPDX-License-Identifier: GPL-3.0-only

//! Error types for depth capture and the viewer loop

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for depth source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Depth source errors
    Source(SourceError),
    /// Configuration errors
    Config(String),
    /// Display surface errors (terminal I/O)
    Display(String),
    /// Debug snapshot errors
    Snapshot(String),
    /// Generic error with message
    Other(String),
}

/// Depth source errors
#[derive(Debug, Clone)]
pub enum SourceError {
    /// No depth device or replay input found
    DeviceNotFound(String),
    /// Device open or stream setup failed
    InitializationFailed(String),
    /// Device rejected the requested format
    FormatNotSupported(String),
    /// No frame arrived within the source's wait period
    Timeout,
    /// Device went away during streaming
    Disconnected,
    /// Frame had an unexpected size or could not be decoded
    InvalidFrame(String),
    /// Sensor option could not be applied
    OptionFailed(String),
    /// Filesystem or ioctl error
    Io(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Source(e) => write!(f, "Depth source error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Display(msg) => write!(f, "Display error: {}", msg),
            AppError::Snapshot(msg) => write!(f, "Snapshot error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            SourceError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            SourceError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            SourceError::Timeout => write!(f, "Timed out waiting for a depth frame"),
            SourceError::Disconnected => write!(f, "Depth device disconnected"),
            SourceError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            SourceError::OptionFailed(msg) => write!(f, "Sensor option failed: {}", msg),
            SourceError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for SourceError {}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::Source(err)
    }
}

// Terminal drawing is the only I/O the app layer does directly
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Display(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => SourceError::Timeout,
            std::io::ErrorKind::NotFound => SourceError::DeviceNotFound(err.to_string()),
            _ if err.raw_os_error() == Some(libc::ENODEV) => SourceError::Disconnected,
            _ => SourceError::Io(err.to_string()),
        }
    }
}

impl From<image::ImageError> for SourceError {
    fn from(err: image::ImageError) -> Self {
        SourceError::InvalidFrame(err.to_string())
    }
}
