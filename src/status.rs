//! Status values reported to the control surface
//!
//! The core emits structured values only; turning them into text (and
//! translating that text) is the collaborator's job.

use crossbeam_channel::Sender;
use serde::Serialize;

use crate::network::transport::ConnectionInfo;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Status {
    Stopped,
    /// `connection` is `None` until the first packet arrives
    Listening { connection: Option<ConnectionInfo> },
    Error { message: String },
}

/// Receives status notifications. Called from the control thread and the
/// receive thread, so implementations must not block for long.
pub trait StatusListener: Send + Sync {
    fn on_status(&self, status: &Status);
}

impl<F> StatusListener for F
where
    F: Fn(&Status) + Send + Sync,
{
    fn on_status(&self, status: &Status) {
        self(status)
    }
}

/// Forward notifications into a channel without blocking
pub fn channel_listener(tx: Sender<Status>) -> impl StatusListener {
    move |status: &Status| {
        // A dropped receiver just means nobody is watching
        let _ = tx.try_send(status.clone());
    }
}

/// Discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl StatusListener for NullListener {
    fn on_status(&self, _status: &Status) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_json_shape() {
        let status = Status::Listening {
            connection: Some(ConnectionInfo::from_peer("127.0.0.1:9000".parse().unwrap())),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "listening");
        assert_eq!(json["connection"]["transport_guess"], "local");
        assert_eq!(json["connection"]["peer_address"], "127.0.0.1:9000");

        let json = serde_json::to_value(Status::Error { message: "boom".into() }).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["message"], "boom");
    }

    #[test]
    fn test_channel_listener() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let listener = channel_listener(tx);
        listener.on_status(&Status::Stopped);
        assert_eq!(rx.try_recv().unwrap(), Status::Stopped);
        drop(rx);
        listener.on_status(&Status::Stopped);
    }
}
