//! UDP audio receiver
//!
//! Owns one bound socket and one output sink. Each [`AudioReceiver::run_once`]
//! waits (at most `recv_timeout`) for one datagram, decodes it, applies the
//! current gain and writes the frame to the sink.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use crate::audio::gain::{apply_gain, SharedGain};
use crate::audio::playback::{AudioSink, CpalBackend, OutputBackend};
use crate::config::StreamConfig;
use crate::error::{OpenError, ReceiveError};
use crate::network::transport::ConnectionInfo;
use crate::network::udp::{create_socket, is_timeout};
use crate::protocol::{check_datagram, decode_samples, DropReason};

const RECV_BUFFER_SIZE: usize = 65_536;

/// Result of one receive step
#[derive(Debug, Clone, PartialEq)]
pub enum PacketOutcome {
    /// A frame was decoded, scaled and handed to the output
    Played {
        bytes_played: usize,
        connection: ConnectionInfo,
    },
    /// A datagram arrived but could not be played
    Dropped {
        reason: DropReason,
        connection: ConnectionInfo,
    },
    /// Nothing arrived before the receive timeout
    Idle,
}

pub struct AudioReceiver {
    config: StreamConfig,
    socket: Option<UdpSocket>,
    sink: Option<Box<dyn AudioSink>>,
    gain: SharedGain,
    recv_buf: Vec<u8>,
    samples: Vec<i16>,
    connection: Option<ConnectionInfo>,
}

impl AudioReceiver {
    /// Bind the socket and open the default cpal output
    pub fn open(config: StreamConfig, gain: SharedGain) -> Result<Self, OpenError> {
        Self::open_with(config, gain, &CpalBackend)
    }

    /// Bind the socket and open an output through `backend`.
    /// Nothing stays open if either step fails.
    pub fn open_with(
        config: StreamConfig,
        gain: SharedGain,
        backend: &dyn OutputBackend,
    ) -> Result<Self, OpenError> {
        config.validate().map_err(OpenError::InvalidConfig)?;

        let addr = config.socket_addr();
        let socket =
            create_socket(addr, config.recv_timeout).map_err(|source| OpenError::Bind { addr, source })?;

        // The socket is dropped (closed) on the error return
        let sink = backend.open(&config)?;

        tracing::info!(
            "Receiver bound to {} ({} Hz, {} ch, {} samples/frame)",
            socket.local_addr().unwrap_or(addr),
            config.sample_rate,
            config.channels,
            config.frame_size
        );

        let frame_samples = config.frame_size * config.channels as usize;
        Ok(Self {
            config,
            socket: Some(socket),
            sink: Some(sink),
            gain,
            recv_buf: vec![0u8; RECV_BUFFER_SIZE],
            samples: Vec::with_capacity(frame_samples),
            connection: None,
        })
    }

    /// Address the socket is actually bound to
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Output ring statistics as (overflows, underruns)
    pub fn xruns(&self) -> (u64, u64) {
        self.sink.as_ref().map(|s| s.xruns()).unwrap_or((0, 0))
    }

    /// Receive and play at most one datagram
    pub fn run_once(&mut self) -> Result<PacketOutcome, ReceiveError> {
        let (Some(socket), Some(sink)) = (self.socket.as_ref(), self.sink.as_mut()) else {
            return Err(ReceiveError::Socket(io::Error::new(
                io::ErrorKind::NotConnected,
                "receiver is closed",
            )));
        };

        let (len, peer) = match socket.recv_from(&mut self.recv_buf) {
            Ok(received) => received,
            Err(e) if is_timeout(&e) => return Ok(PacketOutcome::Idle),
            Err(e) => return Err(ReceiveError::Socket(e)),
        };

        let connection = ConnectionInfo::from_peer(peer);
        if self.connection.map(|c| c.peer_address) != Some(peer) {
            tracing::debug!("Sender {} ({})", peer, connection.transport_guess);
        }
        self.connection = Some(connection);

        if let Err(reason) = check_datagram(len, &self.config) {
            return Ok(PacketOutcome::Dropped { reason, connection });
        }

        decode_samples(&self.recv_buf[..len], &mut self.samples);
        apply_gain(&mut self.samples, self.gain.ratio());
        sink.write(&self.samples)?;

        Ok(PacketOutcome::Played {
            bytes_played: len,
            connection,
        })
    }

    /// Stop the output, then close the socket. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.close();
        }
        if let Some(socket) = self.socket.take() {
            tracing::debug!("Closing socket {:?}", socket.local_addr().ok());
            drop(socket);
        }
        self.connection = None;
    }
}

impl Drop for AudioReceiver {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::gain::GainControl;
    use crate::error::{AudioError, PlaybackError};
    use crate::network::transport::TransportGuess;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default, Clone)]
    struct Recorder {
        frames: Arc<Mutex<Vec<Vec<i16>>>>,
        closed: Arc<Mutex<usize>>,
    }

    struct RecordingSink(Recorder);

    impl AudioSink for RecordingSink {
        fn write(&mut self, samples: &[i16]) -> Result<(), PlaybackError> {
            self.0.frames.lock().push(samples.to_vec());
            Ok(())
        }

        fn close(&mut self) {
            *self.0.closed.lock() += 1;
        }
    }

    impl OutputBackend for Recorder {
        fn open(&self, _config: &StreamConfig) -> Result<Box<dyn AudioSink>, AudioError> {
            Ok(Box::new(RecordingSink(self.clone())))
        }
    }

    struct NoDevice;

    impl OutputBackend for NoDevice {
        fn open(&self, _config: &StreamConfig) -> Result<Box<dyn AudioSink>, AudioError> {
            Err(AudioError::DeviceNotFound("No default output device".into()))
        }
    }

    fn loopback_config() -> StreamConfig {
        StreamConfig {
            bind_address: "127.0.0.1".parse().unwrap(),
            port: 0,
            frame_size: 4,
            recv_timeout: Duration::from_millis(50),
            ..StreamConfig::default()
        }
    }

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_plays_scaled_frame() {
        let recorder = Recorder::default();
        let gain = Arc::new(GainControl::from_percent(50));
        let mut receiver = AudioReceiver::open_with(loopback_config(), gain, &recorder).unwrap();
        let addr = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&pcm(&[1000, -1000, 3, i16::MIN]), addr).unwrap();

        match receiver.run_once().unwrap() {
            PacketOutcome::Played { bytes_played, connection } => {
                assert_eq!(bytes_played, 8);
                assert_eq!(connection.transport_guess, TransportGuess::Local);
                assert_eq!(connection.peer_address, sender.local_addr().unwrap());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(recorder.frames.lock().as_slice(), &[vec![500i16, -500, 2, -16384]]);
    }

    #[test]
    fn test_drops_malformed_and_keeps_going() {
        let recorder = Recorder::default();
        let mut receiver =
            AudioReceiver::open_with(loopback_config(), Arc::new(GainControl::default()), &recorder).unwrap();
        let addr = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&[1, 2, 3], addr).unwrap();
        sender.send_to(&pcm(&[1, 2, 3, 4]), addr).unwrap();

        assert!(matches!(
            receiver.run_once().unwrap(),
            PacketOutcome::Dropped { reason: DropReason::PartialSample { len: 3 }, .. }
        ));
        assert!(matches!(receiver.run_once().unwrap(), PacketOutcome::Played { .. }));
        assert_eq!(recorder.frames.lock().len(), 1);
    }

    #[test]
    fn test_idle_when_nothing_arrives() {
        let recorder = Recorder::default();
        let mut receiver =
            AudioReceiver::open_with(loopback_config(), Arc::new(GainControl::default()), &recorder).unwrap();
        assert_eq!(receiver.run_once().unwrap(), PacketOutcome::Idle);
    }

    #[test]
    fn test_close_is_idempotent() {
        let recorder = Recorder::default();
        let mut receiver =
            AudioReceiver::open_with(loopback_config(), Arc::new(GainControl::default()), &recorder).unwrap();
        let addr = receiver.local_addr().unwrap();
        receiver.close();
        receiver.close();
        drop(receiver);
        assert_eq!(*recorder.closed.lock(), 1);

        // Port is free again
        UdpSocket::bind(addr).unwrap();
    }

    #[test]
    fn test_run_after_close_is_an_error() {
        let recorder = Recorder::default();
        let mut receiver =
            AudioReceiver::open_with(loopback_config(), Arc::new(GainControl::default()), &recorder).unwrap();
        receiver.close();
        assert!(matches!(receiver.run_once(), Err(ReceiveError::Socket(_))));
    }

    #[test]
    fn test_device_failure_releases_socket() {
        let holder = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();
        drop(holder);

        let config = loopback_config().with_port(port);
        let result = AudioReceiver::open_with(config, Arc::new(GainControl::default()), &NoDevice);
        assert!(matches!(result, Err(OpenError::Device(_))));
        UdpSocket::bind(("127.0.0.1", port)).unwrap();
    }

    #[test]
    fn test_bind_failure() {
        let holder = UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = loopback_config().with_port(holder.local_addr().unwrap().port());
        let recorder = Recorder::default();
        let result = AudioReceiver::open_with(config, Arc::new(GainControl::default()), &recorder);
        assert!(matches!(result, Err(OpenError::Bind { .. })));
    }
}
