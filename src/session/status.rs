//! Session status events
//!
//! Status is reported through a single-consumer channel rather than a
//! callback invoked from worker threads, so consumers never run arbitrary
//! code on a pipeline thread. One event per significant state change.

use std::fmt;

use tokio::sync::mpsc;

/// A session state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Sender: attempting to reach the peer
    Connecting,
    /// Receiver: waiting for a sender to connect
    Listening,
    /// Connected and moving video
    Streaming,
    /// Fatal session error (human-readable description)
    Error(String),
    /// Session ended (peer gone or locally stopped)
    Disconnected,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Connecting => write!(f, "Connecting..."),
            SessionEvent::Listening => write!(f, "Waiting for connection"),
            SessionEvent::Streaming => write!(f, "Streaming"),
            SessionEvent::Error(msg) => write!(f, "Error: {}", msg),
            SessionEvent::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Cloneable handle the pipeline stages use to publish status
#[derive(Debug, Clone)]
pub(crate) struct StatusReporter {
    tx: mpsc::Sender<SessionEvent>,
}

impl StatusReporter {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Publish an event. Never blocks a pipeline stage: if the consumer has
    /// fallen far behind, the event is dropped with a log line instead.
    pub fn emit(&self, event: SessionEvent) {
        tracing::info!(status = %event, "Session status");
        if self.tx.try_send(event).is_err() {
            tracing::debug!("Status receiver lagging, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (reporter, mut rx) = StatusReporter::channel(8);
        reporter.emit(SessionEvent::Connecting);
        reporter.emit(SessionEvent::Streaming);
        reporter.emit(SessionEvent::Disconnected);

        assert_eq!(rx.recv().await, Some(SessionEvent::Connecting));
        assert_eq!(rx.recv().await, Some(SessionEvent::Streaming));
        assert_eq!(rx.recv().await, Some(SessionEvent::Disconnected));
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let (reporter, rx) = StatusReporter::channel(1);
        reporter.emit(SessionEvent::Connecting);
        reporter.emit(SessionEvent::Streaming); // dropped, no deadlock
        drop(rx);
        reporter.emit(SessionEvent::Disconnected); // receiver gone, still fine
    }

    #[test]
    fn test_display_strings() {
        assert_eq!(SessionEvent::Streaming.to_string(), "Streaming");
        assert_eq!(
            SessionEvent::Error("socket closed".into()).to_string(),
            "Error: socket closed"
        );
    }
}
