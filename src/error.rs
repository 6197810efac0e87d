//! Error types
//!
//! Three error kinds cross the engine/collaborator boundary:
//! [`Error::EncoderConfig`], [`Error::Transport`] and [`Error::DecodeStalled`].
//! Everything else is either absorbed at the component boundary (a single
//! undecodable unit, a single failed control-byte match) or counted as a
//! health metric (demux sync losses).

use std::fmt;
use std::io;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// The codec rejected the requested capture parameters.
    ///
    /// Fatal to the session, no retry.
    EncoderConfig(String),

    /// Connection lost or a wire write/read failed.
    ///
    /// Fatal to the session; the caller may create a new session and
    /// reconnect.
    Transport(io::Error),

    /// Too many consecutive access units failed to decode.
    ///
    /// Fatal to the session; video is unrecoverable without a fresh
    /// keyframe from a new connection.
    DecodeStalled {
        /// Number of consecutive failed units when the stall was declared
        consecutive_failures: u32,
    },

    /// The endpoint already has an active session.
    ///
    /// Concurrent session creation is rejected, not queued.
    SessionActive,

    /// Operation on a session that has already stopped
    SessionClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EncoderConfig(msg) => write!(f, "Encoder configuration rejected: {}", msg),
            Error::Transport(e) => write!(f, "Transport failure: {}", e),
            Error::DecodeStalled {
                consecutive_failures,
            } => write!(
                f,
                "Decode stalled after {} consecutive failures",
                consecutive_failures
            ),
            Error::SessionActive => write!(f, "A session is already active on this endpoint"),
            Error::SessionClosed => write!(f, "Session is already stopped"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = Error::EncoderConfig("bitrate out of range".into());
        assert!(e.to_string().contains("bitrate out of range"));

        let e = Error::DecodeStalled {
            consecutive_failures: 30,
        };
        assert!(e.to_string().contains("30"));

        let e = Error::SessionActive;
        assert!(e.to_string().contains("already active"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "peer went away");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Transport(_)));
        assert!(std::error::Error::source(&e).is_some());
    }
}
