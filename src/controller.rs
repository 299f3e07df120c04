//! Session lifecycle
//!
//! [`StreamController`] is the synchronous control surface handed to the UI:
//! `start`, `stop`, `set_volume`. Each successful `start` opens an
//! [`AudioReceiver`] and moves it onto a dedicated receive thread, which is
//! then its only owner. Resources are released by that thread after its loop
//! exits, and `stop` returns only once the thread has been joined, so the
//! socket is never closed underneath a blocked receive.
//!
//! Listeners are never called with the session lock held, so a status
//! callback may query the controller or call `stop` itself.

use parking_lot::Mutex;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::gain::{GainControl, SharedGain};
use crate::audio::playback::{CpalBackend, OutputBackend};
use crate::config::StreamConfig;
use crate::constants::DEFAULT_VOLUME_PERCENT;
use crate::error::StartError;
use crate::network::receiver::{AudioReceiver, PacketOutcome};
use crate::network::transport::ConnectionInfo;
use crate::status::{Status, StatusListener};

/// Lifecycle state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Stopped,
    Listening,
    /// Failure being cleaned up; becomes `Stopped` once resources are released
    Error,
}

/// Counters for the current (or last) session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub packets_played: u64,
    pub packets_dropped: u64,
    pub bytes_played: u64,
    pub ring_overflows: u64,
    pub ring_underruns: u64,
}

#[derive(Default)]
struct SessionCounters {
    packets_played: AtomicU64,
    packets_dropped: AtomicU64,
    bytes_played: AtomicU64,
    ring_overflows: AtomicU64,
    ring_underruns: AtomicU64,
}

impl SessionCounters {
    fn reset(&self) {
        for counter in [
            &self.packets_played,
            &self.packets_dropped,
            &self.bytes_played,
            &self.ring_overflows,
            &self.ring_underruns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn record_xruns(&self, (overflows, underruns): (u64, u64)) {
        self.ring_overflows.store(overflows, Ordering::Relaxed);
        self.ring_underruns.store(underruns, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            packets_played: self.packets_played.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            bytes_played: self.bytes_played.load(Ordering::Relaxed),
            ring_overflows: self.ring_overflows.load(Ordering::Relaxed),
            ring_underruns: self.ring_underruns.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the controller and the receive thread
struct Shared {
    state: Mutex<SessionState>,
    connection: Mutex<Option<ConnectionInfo>>,
    local_addr: Mutex<Option<SocketAddr>>,
    counters: SessionCounters,
    listener: Arc<dyn StatusListener>,
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    fn notify(&self, status: Status) {
        self.listener.on_status(&status);
    }

    /// Forget the session and report `Stopped`
    fn finish(&self) {
        *self.connection.lock() = None;
        *self.local_addr.lock() = None;
        self.set_state(SessionState::Stopped);
        self.notify(Status::Stopped);
    }
}

#[derive(Default)]
struct SessionSignal {
    cancel: AtomicBool,
    /// Set when `stop` ran on the receive thread, which then reports `Stopped` itself
    detached: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Cancelled,
    /// Already reported and cleaned up by the receive thread
    Failed,
}

struct Session {
    signal: Arc<SessionSignal>,
    handle: JoinHandle<SessionEnd>,
}

impl Session {
    fn is_current_thread(&self) -> bool {
        self.handle.thread().id() == thread::current().id()
    }
}

/// Start/stop/volume control surface around one receive session at a time
pub struct StreamController {
    base_config: StreamConfig,
    backend: Arc<dyn OutputBackend>,
    gain: SharedGain,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

impl StreamController {
    /// Controller with default stream parameters playing through cpal
    pub fn new(listener: impl StatusListener + 'static) -> Self {
        Self::with_config(StreamConfig::default(), listener)
    }

    pub fn with_config(config: StreamConfig, listener: impl StatusListener + 'static) -> Self {
        Self::with_backend(config, CpalBackend, listener)
    }

    /// `config` supplies everything but the port, which comes from `start`
    pub fn with_backend(
        config: StreamConfig,
        backend: impl OutputBackend + 'static,
        listener: impl StatusListener + 'static,
    ) -> Self {
        Self {
            base_config: config,
            backend: Arc::new(backend),
            gain: Arc::new(GainControl::from_percent(DEFAULT_VOLUME_PERCENT)),
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::Stopped),
                connection: Mutex::new(None),
                local_addr: Mutex::new(None),
                counters: SessionCounters::default(),
                listener: Arc::new(listener),
            }),
            session: Mutex::new(None),
        }
    }

    /// Bind `port`, open the output and start the receive thread
    pub fn start(&self, port: u16) -> Result<(), StartError> {
        if self.state() == SessionState::Listening {
            return Err(StartError::AlreadyRunning);
        }
        if port == 0 {
            return Err(StartError::InvalidPort(port.to_string()));
        }

        // A session that ended on its own is still waiting to be joined.
        // Its final callbacks may call back in, so join without the lock.
        let finished = {
            let mut session = self.session.lock();
            // `Listening` is only entered with the lock held
            if self.state() == SessionState::Listening {
                return Err(StartError::AlreadyRunning);
            }
            session.take()
        };
        if let Some(finished) = finished {
            if !finished.is_current_thread() {
                let _ = finished.handle.join();
            }
        }

        let mut session = self.session.lock();
        if session.is_some() || self.state() == SessionState::Listening {
            return Err(StartError::AlreadyRunning);
        }

        let config = self.base_config.clone().with_port(port);
        let receiver = AudioReceiver::open_with(config, self.gain.clone(), self.backend.as_ref())
            .map_err(|e| {
                tracing::warn!("Failed to open receiver on port {}: {}", port, e);
                e
            })?;
        let local_addr = receiver.local_addr();

        self.shared.counters.reset();
        *self.shared.connection.lock() = None;
        *self.shared.local_addr.lock() = local_addr;
        self.shared.set_state(SessionState::Listening);

        let signal = Arc::new(SessionSignal::default());
        let thread_signal = signal.clone();
        let thread_shared = self.shared.clone();

        // The receive thread announces `Listening` before its first packet
        let spawned = thread::Builder::new()
            .name(format!("udp-receive-{}", port))
            .spawn(move || run_session(receiver, thread_signal, thread_shared));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                // The receiver was dropped with the closure, which closed it
                *self.shared.local_addr.lock() = None;
                self.shared.set_state(SessionState::Stopped);
                return Err(StartError::Spawn(e));
            }
        };

        tracing::info!("Listening on {}", local_addr.map(|a| a.to_string()).unwrap_or_default());
        *session = Some(Session { signal, handle });
        Ok(())
    }

    /// Parse user-entered text as a port and start
    pub fn start_from_input(&self, input: &str) -> Result<(), StartError> {
        self.start(parse_port(input)?)
    }

    /// Cancel the receive loop, wait for it to release its resources, and
    /// report `Stopped`. Does nothing when no session is active.
    pub fn stop(&self) {
        let Some(active) = self.session.lock().take() else {
            return;
        };

        if active.is_current_thread() {
            // Called from a status callback; the loop winds down after it returns
            active.signal.detached.store(true, Ordering::SeqCst);
            active.signal.cancel.store(true, Ordering::SeqCst);
            return;
        }

        active.signal.cancel.store(true, Ordering::SeqCst);
        match active.handle.join() {
            Ok(SessionEnd::Cancelled) => {
                self.shared.finish();
                tracing::info!("Stopped listening");
            }
            Ok(SessionEnd::Failed) => {}
            Err(_) => {
                tracing::error!("Receive thread panicked");
                self.shared.notify(Status::Error {
                    message: "receive thread panicked".into(),
                });
                self.shared.finish();
            }
        }
    }

    /// Set the volume in percent (0-100, higher values saturate).
    /// Applies from the next packet; never blocks.
    pub fn set_volume(&self, percent: u8) {
        self.gain.set_percent(percent);
    }

    pub fn volume(&self) -> u8 {
        self.gain.percent()
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    pub fn is_listening(&self) -> bool {
        self.state() == SessionState::Listening
    }

    /// Last sender seen by the active session
    pub fn connection(&self) -> Option<ConnectionInfo> {
        *self.shared.connection.lock()
    }

    /// Socket address of the active session
    pub fn local_addr(&self) -> Option<SocketAddr> {
        if !self.is_listening() {
            return None;
        }
        *self.shared.local_addr.lock()
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.counters.snapshot()
    }

    /// Snapshot suitable for display
    pub fn status(&self) -> Status {
        match self.state() {
            SessionState::Listening => Status::Listening {
                connection: self.connection(),
            },
            _ => Status::Stopped,
        }
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Validate user-entered port text (1-65535)
pub fn parse_port(input: &str) -> Result<u16, StartError> {
    let trimmed = input.trim();
    match trimmed.parse::<u32>() {
        Ok(port) if (1..=u32::from(u16::MAX)).contains(&port) => Ok(port as u16),
        _ => Err(StartError::InvalidPort(trimmed.to_string())),
    }
}

/// Receive loop; owns `receiver` until it has been closed
fn run_session(mut receiver: AudioReceiver, signal: Arc<SessionSignal>, shared: Arc<Shared>) -> SessionEnd {
    let counters = &shared.counters;
    shared.notify(Status::Listening { connection: None });

    let end = loop {
        if signal.cancel.load(Ordering::SeqCst) {
            break SessionEnd::Cancelled;
        }

        match receiver.run_once() {
            Ok(PacketOutcome::Played {
                bytes_played,
                connection,
            }) => {
                counters.packets_played.fetch_add(1, Ordering::Relaxed);
                counters.bytes_played.fetch_add(bytes_played as u64, Ordering::Relaxed);
                counters.record_xruns(receiver.xruns());
                *shared.connection.lock() = Some(connection);
                shared.notify(Status::Listening {
                    connection: Some(connection),
                });
            }
            Ok(PacketOutcome::Dropped { reason, connection }) => {
                let dropped = counters.packets_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                *shared.connection.lock() = Some(connection);
                if dropped == 1 || dropped % 100 == 0 {
                    tracing::warn!(
                        "Dropped datagram from {}: {} ({} dropped this session)",
                        connection.peer_address,
                        reason,
                        dropped
                    );
                }
            }
            Ok(PacketOutcome::Idle) => {}
            Err(e) => {
                tracing::error!("Receive session failed: {}", e);
                shared.set_state(SessionState::Error);
                shared.notify(Status::Error {
                    message: e.to_string(),
                });
                break SessionEnd::Failed;
            }
        }
    };

    counters.record_xruns(receiver.xruns());
    receiver.close();

    if end == SessionEnd::Failed || signal.detached.load(Ordering::SeqCst) {
        shared.finish();
    }
    end
}
