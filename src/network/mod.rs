//! Network subsystem for UDP audio transport

pub mod receiver;
pub mod transport;
pub mod udp;

pub use receiver::{AudioReceiver, PacketOutcome};
pub use transport::{classify, ConnectionInfo, TransportGuess};
pub use udp::create_socket;
