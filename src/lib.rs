//! # UDP Mic Receiver
//!
//! Plays a raw PCM microphone stream arriving over UDP on a local output device.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────┐
//! │  Phone / sender          │   one datagram per frame:
//! │  (i16 LE mono PCM)       │   [s0 lo|s0 hi|s1 lo|s1 hi| ... ]
//! └────────────┬─────────────┘
//!              │ UDP
//!              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        RECEIVER PC                              │
//! │                                                                 │
//! │  UI / CLI ──start/stop/set_volume──▶ StreamController           │
//! │     ▲                                   │   owns SessionState,  │
//! │     │ Status callbacks                  │   GainControl, thread │
//! │     │                                   ▼                       │
//! │     │                  ┌────────────────────────────────┐       │
//! │     └──────────────────│  receive thread                │       │
//! │                        │  AudioReceiver::run_once()     │       │
//! │                        │   recv (bounded timeout)       │       │
//! │                        │   decode i16 LE ─▶ × gain      │       │
//! │                        │   classify peer transport      │       │
//! │                        └───────────────┬────────────────┘       │
//! │                                        │ SampleRing (lock-free) │
//! │                                        ▼                        │
//! │                        ┌────────────────────────────────┐       │
//! │                        │  playback thread (cpal stream) │       │
//! │                        └───────────────┬────────────────┘       │
//! │                                        ▼                        │
//! │                                 Output device                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod network;
pub mod protocol;
pub mod status;

pub use config::{SizePolicy, StreamConfig};
pub use controller::{SessionState, SessionStats, StreamController};
pub use error::{Error, Result};
pub use status::{Status, StatusListener};

/// Application-wide constants
pub mod constants {
    /// Default sample rate agreed out-of-band with the sender
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default channel count (mono)
    pub const DEFAULT_CHANNELS: u16 = 1;

    /// Samples per channel carried by one datagram
    pub const DEFAULT_FRAME_SIZE: usize = 1024;

    /// Signed 16-bit PCM
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// Default UDP port for audio streaming
    pub const DEFAULT_UDP_PORT: u16 = 5005;

    /// Upper bound on how long a blocked receive can delay `stop()`
    pub const DEFAULT_RECV_TIMEOUT_MS: u64 = 100;

    /// Output ring capacity, in frames
    pub const DEFAULT_BUFFER_FRAMES: usize = 8;

    /// Largest UDP payload over IPv4
    pub const MAX_DATAGRAM_SIZE: usize = 65_507;

    /// Kernel receive buffer requested for the socket
    pub const SOCKET_RECV_BUFFER_BYTES: usize = 256 * 1024;

    /// Volume applied before the user touches the control
    pub const DEFAULT_VOLUME_PERCENT: u8 = 100;
}
