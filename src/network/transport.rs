//! Best-effort guess at how the sender is connected
//!
//! The guess comes from the sender's address alone. Loopback usually means a
//! phone forwarded over USB (e.g. `adb reverse`); a private address usually
//! means the local network, which is reported as wifi even on a wired LAN.
//! It is a display hint, not a classification anything should depend on.

use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportGuess {
    Wifi,
    Local,
    Unknown,
}

impl fmt::Display for TransportGuess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportGuess::Wifi => "wifi",
            TransportGuess::Local => "local",
            TransportGuess::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Sender details refreshed on every received packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub connected: bool,
    pub peer_address: SocketAddr,
    pub transport_guess: TransportGuess,
}

impl ConnectionInfo {
    pub fn from_peer(peer_address: SocketAddr) -> Self {
        Self {
            connected: true,
            peer_address,
            transport_guess: classify(peer_address.ip()),
        }
    }
}

/// Loopback is local, RFC 1918 / unique-local is wifi, anything else unknown
pub fn classify(ip: IpAddr) -> TransportGuess {
    match ip {
        IpAddr::V4(v4) if v4.is_loopback() => TransportGuess::Local,
        IpAddr::V4(v4) if v4.is_private() => TransportGuess::Wifi,
        IpAddr::V4(_) => TransportGuess::Unknown,
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => classify(IpAddr::V4(v4)),
            None if v6.is_loopback() => TransportGuess::Local,
            None if is_unique_local(&v6) => TransportGuess::Wifi,
            None => TransportGuess::Unknown,
        },
    }
}

// fc00::/7
fn is_unique_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}
