//! Stream and application configuration
//!
//! `StreamConfig` is fixed for the lifetime of one session. `AppConfig` is the
//! settings file the binary keeps between runs; the streaming core never reads it.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::Error;

/// What to do with datagrams that are not exactly one frame long
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizePolicy {
    /// Drop anything that is not exactly `frame_bytes()` long
    #[default]
    Strict,
    /// Play any datagram holding a whole number of samples
    Lenient,
}

/// Parameters of one listening session
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel in one datagram
    pub frame_size: usize,
    /// Receive wait before the loop re-checks for cancellation
    pub recv_timeout: Duration,
    pub size_policy: SizePolicy,
    /// Output device name, `None` for the host default
    pub output_device: Option<String>,
    /// Output ring capacity in frames
    pub buffer_frames: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_UDP_PORT,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            frame_size: DEFAULT_FRAME_SIZE,
            recv_timeout: Duration::from_millis(DEFAULT_RECV_TIMEOUT_MS),
            size_policy: SizePolicy::default(),
            output_device: None,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
        }
    }
}

impl StreamConfig {
    /// Same config bound to another port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Expected datagram length in bytes
    pub fn frame_bytes(&self) -> usize {
        self.frame_size * BYTES_PER_SAMPLE * self.channels as usize
    }

    /// Output ring capacity in samples
    pub fn buffer_samples(&self) -> usize {
        self.frame_size * self.channels as usize * self.buffer_frames
    }

    /// Check the fixed stream parameters before any resource is opened
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be non-zero".into());
        }
        if self.channels == 0 {
            return Err("channel count must be non-zero".into());
        }
        if self.frame_size == 0 {
            return Err("frame size must be non-zero".into());
        }
        if self.buffer_frames == 0 {
            return Err("output buffer must hold at least one frame".into());
        }
        if self.frame_bytes() > MAX_DATAGRAM_SIZE {
            return Err(format!(
                "frame of {} bytes does not fit in one datagram ({} max)",
                self.frame_bytes(),
                MAX_DATAGRAM_SIZE
            ));
        }
        if self.recv_timeout.is_zero() {
            return Err("receive timeout must be non-zero".into());
        }
        Ok(())
    }
}

/// Settings persisted by the receiver binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub volume: u8,
    pub output_device: Option<String>,
    pub size_policy: SizePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_UDP_PORT,
            volume: DEFAULT_VOLUME_PERCENT,
            output_device: None,
            size_policy: SizePolicy::default(),
        }
    }
}

impl AppConfig {
    /// Default location: `<platform config dir>/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "udp-mic-receiver").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Read settings, falling back to defaults when the file is absent
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Settings for an interactive run, plus the path to save them back to.
    /// A file that exists but cannot be read yields defaults and no save path,
    /// so the user's file is never overwritten.
    pub fn load_for_session(path: Option<PathBuf>) -> (Self, Option<PathBuf>) {
        let Some(path) = path else {
            return (Self::default(), None);
        };
        match Self::load_from(&path) {
            Ok(config) => (config, Some(path)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable config, it will not be saved: {}", e);
                (Self::default(), None)
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Session parameters derived from these settings
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            bind_address: self.bind_address,
            port: self.port,
            size_policy: self.size_policy,
            output_device: self.output_device.clone(),
            ..StreamConfig::default()
        }
    }
}
