//! Access units and parameter sets

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::constants::UNIT_START_MARKER;

/// One encoded video frame's worth of bytes.
///
/// Transient: owned exclusively by the pipeline stage currently holding it,
/// never persisted. The payload may or may not begin with the 4-byte
/// start-of-unit marker; the wire multiplexer never duplicates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    /// Encoded bytes
    pub data: Bytes,
    /// Whether this unit is self-contained (decodable without prior frames)
    pub keyframe: bool,
}

/// Classification of a unit from its leading NAL header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// IDR slice (keyframe)
    Keyframe,
    /// Non-IDR slice
    Delta,
    /// Sequence parameter set
    Sps,
    /// Picture parameter set
    Pps,
    /// Anything else (SEI, AUD, ...)
    Other,
}

impl AccessUnit {
    /// Create a new access unit
    pub fn new(data: Bytes, keyframe: bool) -> Self {
        Self { data, keyframe }
    }

    /// Whether the payload already begins with the start-of-unit marker
    pub fn starts_with_marker(&self) -> bool {
        self.data.len() >= UNIT_START_MARKER.len() && self.data[..4] == UNIT_START_MARKER
    }

    /// Payload with any leading start code stripped
    pub fn payload(&self) -> &[u8] {
        if self.starts_with_marker() {
            &self.data[UNIT_START_MARKER.len()..]
        } else {
            &self.data[..]
        }
    }

    /// Classify from the leading NAL header byte
    pub fn kind(&self) -> UnitKind {
        match self.payload().first().map(|b| b & 0x1F) {
            Some(5) => UnitKind::Keyframe,
            Some(1) => UnitKind::Delta,
            Some(7) => UnitKind::Sps,
            Some(8) => UnitKind::Pps,
            _ => UnitKind::Other,
        }
    }

    /// Size of the payload in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the unit carries no bytes at all
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Codec configuration bytes extracted once per encoder session.
///
/// Two sets, primary (SPS) and secondary (PPS). Both must be present before
/// the first keyframe is transmitted, and both are re-sent immediately
/// preceding every subsequent keyframe so a decoder can resynchronize from
/// any keyframe. Cached for the lifetime of a connection and shared by
/// reference (`Arc`) between the multiplexer and every keyframe it emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSets {
    /// Primary set (SPS), without start code
    pub primary: Bytes,
    /// Secondary set (PPS), without start code
    pub secondary: Bytes,
}

impl ParameterSets {
    /// Create from already-separated sets
    pub fn new(primary: Bytes, secondary: Bytes) -> Self {
        Self { primary, secondary }
    }

    /// Extract both sets from a combined Annex B configuration buffer.
    ///
    /// Hardware encoders deliver their format-change payload as one buffer
    /// containing SPS and PPS back to back, each preceded by a start code.
    /// The first NAL becomes the primary set, the second the secondary.
    pub fn from_annex_b(config: &Bytes) -> Result<Self> {
        let mut nals: Vec<Bytes> = Vec::with_capacity(2);
        let mut start = match find_start_code(config, 0) {
            Some(pos) => pos + UNIT_START_MARKER.len(),
            None => {
                return Err(Error::EncoderConfig(
                    "codec config buffer contains no start code".into(),
                ))
            }
        };

        while nals.len() < 2 {
            match find_start_code(config, start) {
                Some(next) => {
                    nals.push(config.slice(start..next));
                    start = next + UNIT_START_MARKER.len();
                }
                None => {
                    nals.push(config.slice(start..));
                    break;
                }
            }
        }

        let mut iter = nals.into_iter();
        match (iter.next(), iter.next()) {
            (Some(primary), Some(secondary)) if !primary.is_empty() && !secondary.is_empty() => {
                Ok(Self { primary, secondary })
            }
            _ => Err(Error::EncoderConfig(
                "codec config buffer does not contain two parameter sets".into(),
            )),
        }
    }
}

/// Find the next 4-byte start code at or after `from`
fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if data.len() < UNIT_START_MARKER.len() {
        return None;
    }
    (from..=data.len() - UNIT_START_MARKER.len())
        .find(|&i| data[i..i + UNIT_START_MARKER.len()] == UNIT_START_MARKER)
}
