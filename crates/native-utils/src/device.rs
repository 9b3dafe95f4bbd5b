use crate::audio::AudioError;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};
use std::fmt;

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Summary of one output device as shown by `--list-devices`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub is_default: bool,
}

impl fmt::Display for OutputDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " * {}({}ch, {}hz)",
            self.name, self.channels, self.sample_rate
        )?;
        if self.is_default {
            f.write_str(" [default]")?;
        }
        Ok(())
    }
}

/// Finds the output device called `device_name`, or the host's default output
/// when no name is given.
pub fn get_or_default_output(device_name: Option<&str>) -> Result<Device, AudioError> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_output_device()
            .ok_or_else(|| AudioError::Device("no default output device".into()));
    };

    let devices = host
        .output_devices()
        .map_err(|e| AudioError::Device(e.to_string()))?;
    for device in devices {
        if device.name().is_ok_and(|name| name == target) {
            return Ok(device);
        }
    }
    Err(AudioError::Device(format!("no output device named {target:?}")))
}

/// Lists output devices. Devices whose name or default config cannot be read
/// are skipped.
pub fn available_outputs() -> Result<Vec<OutputDeviceInfo>, AudioError> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::Device(e.to_string()))?;

    let mut infos = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else {
            continue;
        };
        let config = match device.default_output_config() {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("skipping {}: {}", name, e);
                continue;
            }
        };
        infos.push(OutputDeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            channels: config.channels(),
            sample_rate: config.sample_rate().0,
            name,
        });
    }
    Ok(infos)
}
