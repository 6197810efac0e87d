//! Wire protocol: constants, rotation records, multiplexer, demuxer

pub mod constants;
pub mod demux;
pub mod mux;
pub mod rotation;

pub use demux::{DemuxEvent, Demuxer};
pub use mux::StreamMuxer;
pub use rotation::Rotation;
