//! Error types for the UDP microphone receiver

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors loading or saving application settings
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors returned by `StreamController::start`
#[derive(Error, Debug)]
pub enum StartError {
    #[error("A session is already listening")]
    AlreadyRunning,

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error(transparent)]
    Open(#[from] OpenError),

    #[error("Failed to spawn receive thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Errors opening the socket/output pair
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("Socket bind failed on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Output device error: {0}")]
    Device(#[from] AudioError),

    #[error("Invalid stream configuration: {0}")]
    InvalidConfig(String),
}

/// Audio output device errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to build stream: {0}")]
    BuildStream(String),

    #[error("Failed to start stream: {0}")]
    PlayStream(String),
}

/// Output stream write failures during an active session
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Output stream error: {0}")]
    Stream(String),

    #[error("Output stream is no longer running")]
    Disconnected,
}

/// Failures of a single receive-and-play step; all are terminal for the session
#[derive(Error, Debug)]
pub enum ReceiveError {
    #[error("Socket receive failed: {0}")]
    Socket(#[source] io::Error),

    #[error("Playback failed: {0}")]
    Playback(#[from] PlaybackError),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
