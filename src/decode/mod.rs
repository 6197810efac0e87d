//! Decoder contract and receiver-side decode & sink pipeline
//!
//! The hardware decoder and the virtual-camera sink are external
//! collaborators behind the [`VideoDecoder`] and [`FrameSink`] traits. The
//! engine feeds reconstructed access units to the decoder in arrival order
//! and stamps every decoded frame with the latest rotation state before it
//! reaches the sink.

mod pipeline;

pub use pipeline::DecodePipeline;

use std::fmt;

use bytes::Bytes;

use crate::error::Result;
use crate::media::AccessUnit;
use crate::protocol::rotation::Rotation;

/// Per-unit decode failure.
///
/// Non-fatal on its own: the unit is dropped and decoding continues. A
/// burst of consecutive failures escalates to
/// [`crate::Error::DecodeStalled`].
#[derive(Debug, Clone)]
pub struct DecodeError(pub String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decode failed: {}", self.0)
    }
}

impl std::error::Error for DecodeError {}

/// One decoded raw frame
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Raw pixel data (layout is a decoder/sink contract)
    pub data: Bytes,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Rotation to apply before display; stamped by the pipeline
    pub rotation: Rotation,
}

/// Opaque hardware video decoder.
///
/// Must tolerate out-of-band parameter-set units (they typically decode to
/// zero frames) and may produce several frames per unit when flushing.
pub trait VideoDecoder: Send {
    /// Decode one access unit into zero or more raw frames
    fn decode(&mut self, unit: &AccessUnit) -> std::result::Result<Vec<DecodedFrame>, DecodeError>;
}

/// Output device for decoded frames (e.g. a virtual camera).
///
/// The sink either rotates the pixel buffer itself or forwards the frame's
/// rotation flag, depending on its capabilities.
pub trait FrameSink: Send {
    /// Deliver one frame. A sink failure is fatal to the session.
    fn write_frame(&mut self, frame: DecodedFrame) -> Result<()>;
}
