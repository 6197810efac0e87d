//! Camlink: phone-to-desktop live video streaming engine
//!
//! Point-to-point H.264 streaming over TCP, built for using a phone camera
//! as a desktop webcam. The sender drains a hardware encoder and multiplexes
//! access units with in-band rotation records onto one socket; the receiver
//! re-synchronizes the byte stream, decodes, and hands rotation-tagged
//! frames to a sink.
//!
//! ## Wire format
//!
//! A single TCP stream of Annex B style delimited messages:
//!
//! - `00 00 00 01` + unit bytes: one access unit (length implied by the
//!   next delimiter)
//! - `FF 52 54 vv AA`: one rotation record (`vv` in `0..=3`, quarter turns)
//!
//! The framing is self-synchronizing: a receiver joining or corrupted
//! mid-stream scans forward to the next delimiter and resumes.
//!
//! ## Structure
//!
//! - [`encode`]: the [`encode::VideoEncoder`] seam and parameter-set
//!   handshake
//! - [`orientation`]: debounced rotation detection from raw sensor angles
//! - [`protocol`]: delimiters, rotation records, muxer, demuxer
//! - [`decode`]: the [`decode::VideoDecoder`] / [`decode::FrameSink`] seams
//!   and the receive pipeline
//! - [`session`]: single-session lifecycle for both ends
//!
//! ## Example
//!
//! ```no_run
//! use camlink::{SessionConfig, StreamEndpoint};
//! # use camlink::encode::VideoEncoder;
//! # async fn run(encoder: Box<dyn VideoEncoder>) -> camlink::Result<()> {
//! let endpoint = StreamEndpoint::new();
//! let config = SessionConfig::default().resolution(1280, 720).fps(30);
//! let (session, mut events) = endpoint
//!     .start_sender("192.168.1.20:5100".parse().unwrap(), config, encoder)
//!     .await?;
//! while let Some(event) = events.recv().await {
//!     println!("{}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod decode;
pub mod encode;
pub mod error;
pub mod media;
pub mod orientation;
pub mod protocol;
pub mod session;
pub mod stats;
pub mod transport;

pub use error::{Error, Result};
pub use media::{AccessUnit, ParameterSets};
pub use protocol::Rotation;
pub use session::{ReceiverSession, SenderSession, SessionConfig, SessionEvent, StreamEndpoint};
pub use stats::StatsSnapshot;
