//! Rotation control records
//!
//! Rotation state travels on the same byte stream as video, as a fixed
//! 5-byte record: `FF 52 54 <v> AA`. All five bytes must match exactly for
//! a record to be accepted; partial matches are treated as ordinary video
//! payload by the demuxer.

use std::fmt;

use super::constants::{ROTATION_MARKER, ROTATION_RECORD_LEN, ROTATION_SUFFIX, ROTATION_TAG};

/// Discrete display rotation
///
/// Single authoritative value per active session, initialized to 0° at
/// session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parse from the wire value (0..=3)
    pub fn from_wire(v: u8) -> Option<Self> {
        match v {
            0 => Some(Rotation::Deg0),
            1 => Some(Rotation::Deg90),
            2 => Some(Rotation::Deg180),
            3 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// Wire value (0..=3)
    pub fn wire_value(&self) -> u8 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }

    /// Rotation in degrees
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Encode a rotation as its 5-byte wire record
pub fn encode_record(rotation: Rotation) -> [u8; ROTATION_RECORD_LEN] {
    [
        ROTATION_MARKER,
        ROTATION_TAG[0],
        ROTATION_TAG[1],
        rotation.wire_value(),
        ROTATION_SUFFIX,
    ]
}

/// Validate and parse a 5-byte rotation record.
///
/// All-or-nothing: every byte (marker, both tag bytes, value range, suffix)
/// must match, otherwise `None`. This full-pattern validation is the primary
/// defense against compressed video bytes that coincidentally begin with the
/// rotation marker byte.
pub fn parse_record(bytes: &[u8]) -> Option<Rotation> {
    if bytes.len() < ROTATION_RECORD_LEN {
        return None;
    }
    if bytes[0] != ROTATION_MARKER
        || bytes[1] != ROTATION_TAG[0]
        || bytes[2] != ROTATION_TAG[1]
        || bytes[4] != ROTATION_SUFFIX
    {
        return None;
    }
    Rotation::from_wire(bytes[3])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for rot in [
            Rotation::Deg0,
            Rotation::Deg90,
            Rotation::Deg180,
            Rotation::Deg270,
        ] {
            let record = encode_record(rot);
            assert_eq!(parse_record(&record), Some(rot));
        }
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(Rotation::Deg0.wire_value(), 0);
        assert_eq!(Rotation::Deg270.wire_value(), 3);
        assert_eq!(Rotation::from_wire(2), Some(Rotation::Deg180));
        assert_eq!(Rotation::from_wire(4), None);
        assert_eq!(Rotation::from_wire(255), None);
    }

    #[test]
    fn test_record_layout() {
        let record = encode_record(Rotation::Deg90);
        assert_eq!(record, [0xFF, 0x52, 0x54, 0x01, 0xAA]);
    }

    #[test]
    fn test_parse_rejects_any_wrong_byte() {
        let good = encode_record(Rotation::Deg180);

        for i in 0..good.len() {
            let mut bad = good;
            bad[i] ^= 0x10;
            assert_eq!(parse_record(&bad), None, "byte {} should invalidate", i);
        }
    }

    #[test]
    fn test_parse_rejects_out_of_range_value() {
        let record = [0xFF, 0x52, 0x54, 0x04, 0xAA];
        assert_eq!(parse_record(&record), None);
    }

    #[test]
    fn test_parse_rejects_short_input() {
        assert_eq!(parse_record(&[0xFF, 0x52, 0x54, 0x01]), None);
        assert_eq!(parse_record(&[]), None);
    }

    #[test]
    fn test_default_is_zero_degrees() {
        assert_eq!(Rotation::default(), Rotation::Deg0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Rotation::Deg90.to_string(), "90°");
    }
}
