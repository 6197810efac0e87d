//! Receiver-side decode & sink pipeline

use std::sync::Arc;

use crate::decode::{FrameSink, VideoDecoder};
use crate::error::{Error, Result};
use crate::protocol::demux::DemuxEvent;
use crate::protocol::rotation::Rotation;
use crate::stats::SessionStats;

/// Feeds demuxed events through the decoder into the sink.
///
/// Per-unit decode errors are logged and absorbed; a run of
/// `stall_threshold` consecutive failures escalates to
/// [`Error::DecodeStalled`], which is fatal to the session.
pub struct DecodePipeline {
    decoder: Box<dyn VideoDecoder>,
    sink: Box<dyn FrameSink>,
    rotation: Rotation,
    consecutive_failures: u32,
    stall_threshold: u32,
    stats: Arc<SessionStats>,
}

impl DecodePipeline {
    /// Create a pipeline with the session-start rotation (0°)
    pub fn new(
        decoder: Box<dyn VideoDecoder>,
        sink: Box<dyn FrameSink>,
        stall_threshold: u32,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            decoder,
            sink,
            rotation: Rotation::default(),
            consecutive_failures: 0,
            stall_threshold,
            stats,
        }
    }

    /// The rotation currently applied to output frames
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Process one demuxed event in wire order
    pub fn handle_event(&mut self, event: DemuxEvent) -> Result<()> {
        match event {
            DemuxEvent::Rotation(rotation) => {
                if rotation != self.rotation {
                    tracing::info!(rotation = %rotation, "Applying rotation to output");
                    self.rotation = rotation;
                }
                Ok(())
            }
            DemuxEvent::Unit(unit) => match self.decoder.decode(&unit) {
                Ok(frames) => {
                    self.consecutive_failures = 0;
                    for mut frame in frames {
                        frame.rotation = self.rotation;
                        self.sink.write_frame(frame)?;
                        self.stats.record_frame_delivered();
                    }
                    Ok(())
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    self.stats.record_dropped_unit();
                    tracing::debug!(
                        error = %e,
                        consecutive = self.consecutive_failures,
                        "Dropping undecodable unit"
                    );
                    if self.consecutive_failures >= self.stall_threshold {
                        Err(Error::DecodeStalled {
                            consecutive_failures: self.consecutive_failures,
                        })
                    } else {
                        Ok(())
                    }
                }
            },
        }
    }
}
