//! UDP socket creation

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::constants::SOCKET_RECV_BUFFER_BYTES;

/// Bind a blocking UDP socket whose reads give up after `recv_timeout`.
///
/// `SO_REUSEADDR` is not set: a port already held by another socket fails to bind.
pub fn create_socket(addr: SocketAddr, recv_timeout: Duration) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

    if let Err(e) = socket.set_recv_buffer_size(SOCKET_RECV_BUFFER_BYTES) {
        tracing::debug!("Could not enlarge receive buffer: {}", e);
    }

    socket.bind(&addr.into())?;
    socket.set_read_timeout(Some(recv_timeout))?;

    Ok(socket.into())
}

/// Whether a receive error only means the timeout elapsed
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
