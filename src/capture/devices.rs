//! List the audio input devices available on the system.

use std::error::Error;
use std::fmt::Display;
use cpal::{DeviceNameError, DevicesError, Host};
use cpal::traits::{HostTrait, DeviceTrait};

#[derive(Debug)]
pub enum AudioDeviceError {
    DevicesError(DevicesError),
    DeviceNameError(DeviceNameError),
}

impl Display for AudioDeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioDeviceError::DevicesError(e) => write!(f, "Failed to get devices: {}", e),
            AudioDeviceError::DeviceNameError(e) => write!(f, "Failed to get device name: {}", e),
        }
    }
}

impl Error for AudioDeviceError {}

pub fn get_input_devices(host: &Host) -> Result<Vec<String>, AudioDeviceError> {
    host.input_devices()
        .map_err(AudioDeviceError::DevicesError)?
        .map(|d| d.name().map_err(AudioDeviceError::DeviceNameError))
        .collect()
}

/// Find an input device by exact name.
pub(crate) fn find_input_device(host: &Host, name: &str) -> Result<Option<cpal::Device>, AudioDeviceError> {
    for device in host.input_devices().map_err(AudioDeviceError::DevicesError)? {
        if device.name().map_err(AudioDeviceError::DeviceNameError)? == name {
            return Ok(Some(device));
        }
    }
    Ok(None)
}
