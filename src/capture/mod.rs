//! The capture side of a meter: anything that can hand out a live window of recent samples.

use std::error::Error;
use std::fmt::Display;

use crate::sample_buffer::SampleBuffer;

mod cpal_input;
mod devices;
#[cfg(test)]
pub(crate) mod testing;

pub use cpal_input::{CpalCapture, CpalCaptureHandle};
pub use devices::{get_input_devices, AudioDeviceError};

/// Opens capture handles. Called once per session start.
pub trait CaptureSource {
    type Handle: CaptureHandle;

    /// Acquire a live handle producing windows of `buffer_len` samples.
    fn open(&mut self, buffer_len: usize) -> Result<Self::Handle, CaptureError>;
}

/// A live capture, polled once per tick until released.
pub trait CaptureHandle {
    /// Refresh `buffer` in place with the most recent window of samples.
    fn poll(&mut self, buffer: &mut SampleBuffer);

    /// Stop capturing. Consumes the handle so it cannot be polled afterwards.
    fn release(self);
}

#[derive(Debug)]
pub enum CaptureError {
    PermissionDenied(String),
    NoInputDevice,
    DeviceNotFound(String),
    UnsupportedFormat(String),
    Backend(String),
}

impl CaptureError {
    /// Classify a backend message. Hosts report refused microphone access as a backend error.
    fn from_backend(description: String) -> Self {
        let lower = description.to_lowercase();
        if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
            CaptureError::PermissionDenied(description)
        } else {
            CaptureError::Backend(description)
        }
    }
}

impl Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::PermissionDenied(e) => write!(f, "Microphone access was denied: {}", e),
            CaptureError::NoInputDevice => write!(f, "No default input device is available"),
            CaptureError::DeviceNotFound(name) => write!(f, "Input device not found: {}", name),
            CaptureError::UnsupportedFormat(format) => write!(f, "Unsupported sample format: {}", format),
            CaptureError::Backend(e) => write!(f, "Audio backend error: {}", e),
        }
    }
}

impl Error for CaptureError {}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(value: cpal::BuildStreamError) -> Self {
        match value {
            cpal::BuildStreamError::DeviceNotAvailable => CaptureError::NoInputDevice,
            cpal::BuildStreamError::BackendSpecific { err } => CaptureError::from_backend(err.description),
            other => CaptureError::Backend(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(value: cpal::PlayStreamError) -> Self {
        match value {
            cpal::PlayStreamError::DeviceNotAvailable => CaptureError::NoInputDevice,
            cpal::PlayStreamError::BackendSpecific { err } => CaptureError::from_backend(err.description),
        }
    }
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(value: cpal::DefaultStreamConfigError) -> Self {
        match value {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => CaptureError::NoInputDevice,
            cpal::DefaultStreamConfigError::BackendSpecific { err } => CaptureError::from_backend(err.description),
            other => CaptureError::Backend(other.to_string()),
        }
    }
}

impl From<AudioDeviceError> for CaptureError {
    fn from(value: AudioDeviceError) -> Self {
        CaptureError::Backend(value.to_string())
    }
}
