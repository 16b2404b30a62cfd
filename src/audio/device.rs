//! Audio device lookup by name

use cpal::traits::{DeviceTrait, HostTrait};

use super::Direction;
use crate::error::AudioError;

/// Name that selects the host default device, as does the empty string
pub const DEFAULT_DEVICE: &str = "default";

fn wants_default(name: &str) -> bool {
    name.is_empty() || name == DEFAULT_DEVICE
}

/// Find the device called `name` for `direction` on the default host
pub fn find_device(direction: Direction, name: &str) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();

    if wants_default(name) {
        let device = match direction {
            Direction::Capture => host.default_input_device(),
            Direction::Playback => host.default_output_device(),
        };
        return device.ok_or_else(|| {
            AudioError::DeviceNotFound(format!("no default {} device", direction))
        });
    }

    let devices = match direction {
        Direction::Capture => host.input_devices(),
        Direction::Playback => host.output_devices(),
    }
    .map_err(|e| AudioError::CpalError(e.to_string()))?;

    let mut seen = Vec::new();
    for device in devices {
        if let Ok(device_name) = device.name() {
            if device_name == name {
                return Ok(device);
            }
            seen.push(device_name);
        }
    }

    Err(AudioError::DeviceNotFound(format!(
        "{} device '{}' (available: {})",
        direction,
        name,
        seen.join(", ")
    )))
}

/// Device as shown to the user
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeviceEntry {
    pub name: String,
    pub is_default: bool,
}

/// List the devices available for `direction`, default first
pub fn list_devices(direction: Direction) -> Vec<DeviceEntry> {
    let host = cpal::default_host();
    let (default_name, names) = match direction {
        Direction::Capture => (
            host.default_input_device().and_then(|d| d.name().ok()),
            host.input_devices()
                .map(|devices| devices.filter_map(|d| d.name().ok()).collect::<Vec<_>>()),
        ),
        Direction::Playback => (
            host.default_output_device().and_then(|d| d.name().ok()),
            host.output_devices()
                .map(|devices| devices.filter_map(|d| d.name().ok()).collect::<Vec<_>>()),
        ),
    };

    let mut entries: Vec<DeviceEntry> = match names {
        Ok(names) => names
            .into_iter()
            .map(|name| DeviceEntry {
                is_default: default_name.as_ref() == Some(&name),
                name,
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Could not enumerate {} devices: {}", direction, e);
            Vec::new()
        }
    };
    entries.sort_by_key(|e| !e.is_default);
    entries
}
