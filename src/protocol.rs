//! Wire format
//!
//! One UDP datagram carries one frame of raw little-endian signed 16-bit PCM.
//! There is no header, no sequence number and no in-band negotiation: the
//! sample rate and frame size are agreed out-of-band with the sender.

use bytes::Buf;

use crate::config::{SizePolicy, StreamConfig};
use crate::constants::BYTES_PER_SAMPLE;

/// Why a datagram was discarded instead of played
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Empty,
    /// Length is not a whole number of samples
    PartialSample { len: usize },
    /// Whole samples, but not one frame (strict policy only)
    SizeMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::Empty => write!(f, "empty datagram"),
            DropReason::PartialSample { len } => {
                write!(f, "{} bytes is not a whole number of samples", len)
            }
            DropReason::SizeMismatch { expected, actual } => {
                write!(f, "expected {} bytes, got {}", expected, actual)
            }
        }
    }
}

/// Decide whether a datagram of `len` bytes is playable under `config`
pub fn check_datagram(len: usize, config: &StreamConfig) -> Result<(), DropReason> {
    let sample_width = BYTES_PER_SAMPLE * config.channels as usize;
    if len == 0 {
        return Err(DropReason::Empty);
    }
    if len % sample_width != 0 {
        return Err(DropReason::PartialSample { len });
    }
    match config.size_policy {
        SizePolicy::Strict if len != config.frame_bytes() => Err(DropReason::SizeMismatch {
            expected: config.frame_bytes(),
            actual: len,
        }),
        _ => Ok(()),
    }
}

/// Decode little-endian i16 samples into `out`, replacing its contents.
/// A trailing odd byte is ignored.
pub fn decode_samples(payload: &[u8], out: &mut Vec<i16>) {
    out.clear();
    out.reserve(payload.len() / BYTES_PER_SAMPLE);
    let mut buf = payload;
    while buf.remaining() >= BYTES_PER_SAMPLE {
        out.push(buf.get_i16_le());
    }
}
