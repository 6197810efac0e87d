//! Session lifecycle: single-session endpoint, sender, receiver
//!
//! An endpoint runs at most one session at a time. Starting a second while
//! one is active fails with [`Error::SessionActive`]; stopping a session
//! frees the slot for the next one (which is also when a requested bitrate
//! change takes effect, since encoders apply it at configure time).

mod config;
mod receiver;
mod sender;
mod status;

pub use config::SessionConfig;
pub use receiver::ReceiverSession;
pub use sender::SenderSession;
pub use status::SessionEvent;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::decode::{FrameSink, VideoDecoder};
use crate::encode::VideoEncoder;
use crate::error::{Error, Result};

/// One-session-at-a-time entry point.
///
/// Clone-cheap; clones share the same session slot.
#[derive(Debug, Clone, Default)]
pub struct StreamEndpoint {
    active: Arc<AtomicBool>,
}

impl StreamEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a sender session towards a listening receiver.
    ///
    /// Returns the session handle and its status event stream.
    pub async fn start_sender(
        &self,
        addr: SocketAddr,
        config: SessionConfig,
        encoder: Box<dyn VideoEncoder>,
    ) -> Result<(SenderSession, mpsc::Receiver<SessionEvent>)> {
        let guard = self.claim()?;
        SenderSession::start(addr, config, encoder, guard).await
    }

    /// Start a receiver session listening for one sender.
    pub async fn start_receiver(
        &self,
        addr: SocketAddr,
        config: SessionConfig,
        decoder: Box<dyn VideoDecoder>,
        sink: Box<dyn FrameSink>,
    ) -> Result<(ReceiverSession, mpsc::Receiver<SessionEvent>)> {
        let guard = self.claim()?;
        ReceiverSession::start(addr, config, decoder, sink, guard).await
    }

    /// True while a session holds the slot
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn claim(&self) -> Result<SessionGuard> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::SessionActive);
        }
        Ok(SessionGuard {
            active: Arc::clone(&self.active),
        })
    }
}

/// Releases the endpoint's session slot when dropped
pub(crate) struct SessionGuard {
    active: Arc<AtomicBool>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
