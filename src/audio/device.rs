//! Output device enumeration and lookup

use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

use crate::error::AudioError;

/// Description of an output device for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// Wrapper around a cpal output device
pub struct OutputDevice {
    inner: cpal::Device,
    pub name: String,
}

impl OutputDevice {
    pub fn from_cpal(device: cpal::Device) -> Self {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        Self { inner: device, name }
    }

    pub fn into_inner(self) -> cpal::Device {
        self.inner
    }

    /// Pick a supported output config running at `sample_rate`.
    /// The default config's format and channel layout win when they allow it.
    pub fn output_config_for(&self, sample_rate: u32) -> Result<cpal::SupportedStreamConfig, AudioError> {
        let preferred = self
            .inner
            .default_output_config()
            .ok()
            .map(|c| (c.sample_format(), c.channels()));
        let ranges: Vec<_> = self
            .inner
            .supported_output_configs()
            .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?
            .collect();

        select_output_config(&ranges, preferred, sample_rate).ok_or_else(|| {
            AudioError::UnsupportedFormat(format!("{} does not support {} Hz", self.name, sample_rate))
        })
    }
}

/// Sample formats the output callback can produce
fn is_playable_format(format: cpal::SampleFormat) -> bool {
    matches!(
        format,
        cpal::SampleFormat::F32 | cpal::SampleFormat::I16 | cpal::SampleFormat::U16 | cpal::SampleFormat::I32
    )
}

fn select_output_config(
    ranges: &[cpal::SupportedStreamConfigRange],
    preferred: Option<(cpal::SampleFormat, u16)>,
    sample_rate: u32,
) -> Option<cpal::SupportedStreamConfig> {
    let rate = cpal::SampleRate(sample_rate);
    ranges
        .iter()
        .filter(|r| rate >= r.min_sample_rate() && rate <= r.max_sample_rate())
        .filter(|r| is_playable_format(r.sample_format()))
        .min_by_key(|r| match preferred {
            Some((format, channels)) if r.sample_format() == format && r.channels() == channels => 0,
            Some((format, _)) if r.sample_format() == format => 1,
            _ => 2,
        })
        .map(|r| r.clone().with_sample_rate(rate))
}

/// List all output devices on the default host
pub fn list_output_devices() -> Vec<OutputDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Ok(name) = device.name() {
                let (sample_rates, channels) = get_device_capabilities(&device);
                devices.push(OutputDeviceInfo {
                    is_default: default_name.as_ref() == Some(&name),
                    name,
                    sample_rates,
                    channels,
                });
            }
        }
    }
    devices
}

fn get_device_capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();

    if let Ok(configs) = device.supported_output_configs() {
        for config in configs {
            for rate_val in [44100u32, 48000, 88200, 96000] {
                let rate = cpal::SampleRate(rate_val);
                if rate >= config.min_sample_rate()
                    && rate <= config.max_sample_rate()
                    && !sample_rates.contains(&rate_val)
                {
                    sample_rates.push(rate_val);
                }
            }
            if !channels.contains(&config.channels()) {
                channels.push(config.channels());
            }
        }
    }

    sample_rates.sort_unstable();
    channels.sort_unstable();
    (sample_rates, channels)
}

/// Find an output device by exact name
pub fn find_output_device(name: &str) -> Result<OutputDevice, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;

    for device in devices {
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(OutputDevice::from_cpal(device));
        }
    }
    Err(AudioError::DeviceNotFound(name.to_string()))
}

/// Get default output device
pub fn default_output_device() -> Result<OutputDevice, AudioError> {
    cpal::default_host()
        .default_output_device()
        .map(OutputDevice::from_cpal)
        .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()))
}

/// Resolve the configured device name, or the default when `None`
pub fn resolve_output_device(name: Option<&str>) -> Result<OutputDevice, AudioError> {
    match name {
        Some(name) => find_output_device(name),
        None => default_output_device(),
    }
}
