//! Media types: access units and codec parameter sets
//!
//! The wire carries H.264 Annex B byte-stream units: each access unit is one
//! encoded frame's worth of bytes, delimited by `00 00 00 01` start codes.
//! A unit's leading NAL header byte is enough to classify it (keyframe,
//! delta frame, parameter set) without decoding.

mod unit;

pub use unit::{AccessUnit, ParameterSets, UnitKind};
