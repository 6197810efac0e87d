//! Sender-side encode pipeline state
//!
//! Tracks the parameter-set handshake between the encoder and the wire:
//! units produced before the encoder's one-time format-ready signal are
//! buffered (not dropped) and flushed once both sets are cached. After that
//! every unit flows straight through, paired with a shared reference to the
//! cached sets so the multiplexer can re-emit them before each keyframe.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::encode::EncoderOutput;
use crate::media::{AccessUnit, ParameterSets};

/// A unit ready for the wire, paired with the session's parameter sets
#[derive(Debug, Clone)]
pub struct OutboundUnit {
    /// The access unit
    pub unit: AccessUnit,
    /// Cached parameter sets for keyframe re-emission
    pub params: Arc<ParameterSets>,
}

/// Parameter-set capture and startup buffering
#[derive(Debug)]
pub struct EncodePipeline {
    params: Option<Arc<ParameterSets>>,
    pending: VecDeque<AccessUnit>,
    max_pending: usize,
}

impl EncodePipeline {
    /// Create a pipeline buffering at most `max_pending` units before the
    /// format-ready signal arrives (a few hundred milliseconds of video at
    /// startup).
    pub fn new(max_pending: usize) -> Self {
        Self {
            params: None,
            pending: VecDeque::new(),
            max_pending,
        }
    }

    /// The cached parameter sets, once captured
    pub fn parameter_sets(&self) -> Option<&Arc<ParameterSets>> {
        self.params.as_ref()
    }

    /// Number of units buffered awaiting parameter sets
    pub fn pending_units(&self) -> usize {
        self.pending.len()
    }

    /// Process one encoder output, returning the units (if any) that are now
    /// ready for the wire, oldest first.
    pub fn on_output(&mut self, output: EncoderOutput) -> Vec<OutboundUnit> {
        match output {
            EncoderOutput::FormatReady { primary, secondary } => {
                if self.params.is_some() {
                    tracing::warn!("Encoder signalled format-ready more than once");
                }
                let params = Arc::new(ParameterSets::new(primary, secondary));
                tracing::info!(
                    sps = params.primary.len(),
                    pps = params.secondary.len(),
                    "Parameter sets captured"
                );
                self.params = Some(Arc::clone(&params));

                self.pending
                    .drain(..)
                    .map(|unit| OutboundUnit {
                        unit,
                        params: Arc::clone(&params),
                    })
                    .collect()
            }
            EncoderOutput::Unit(unit) => match &self.params {
                Some(params) => vec![OutboundUnit {
                    unit,
                    params: Arc::clone(params),
                }],
                None => {
                    if self.pending.len() >= self.max_pending {
                        // The format signal is hundreds of milliseconds
                        // late; shed the oldest frame rather than grow
                        // without bound.
                        self.pending.pop_front();
                        tracing::warn!("Startup buffer full, dropping oldest unit");
                    }
                    self.pending.push_back(unit);
                    Vec::new()
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::EncoderOutput;
    use bytes::Bytes;

    fn unit(byte: u8, keyframe: bool) -> AccessUnit {
        AccessUnit::new(Bytes::from(vec![byte, 0x01, 0x02]), keyframe)
    }

    fn format_ready() -> EncoderOutput {
        EncoderOutput::FormatReady {
            primary: Bytes::from_static(&[0x67, 0x64]),
            secondary: Bytes::from_static(&[0x68, 0xEF]),
        }
    }

    #[test]
    fn test_units_buffered_until_format_ready() {
        let mut pipeline = EncodePipeline::new(8);

        assert!(pipeline.on_output(EncoderOutput::Unit(unit(0x65, true))).is_empty());
        assert!(pipeline.on_output(EncoderOutput::Unit(unit(0x41, false))).is_empty());
        assert_eq!(pipeline.pending_units(), 2);
        assert!(pipeline.parameter_sets().is_none());

        let flushed = pipeline.on_output(format_ready());
        assert_eq!(flushed.len(), 2);
        assert!(flushed[0].unit.keyframe);
        assert!(!flushed[1].unit.keyframe);
        assert_eq!(pipeline.pending_units(), 0);
        assert!(pipeline.parameter_sets().is_some());
    }

    #[test]
    fn test_units_flow_through_after_format_ready() {
        let mut pipeline = EncodePipeline::new(8);
        pipeline.on_output(format_ready());

        let out = pipeline.on_output(EncoderOutput::Unit(unit(0x41, false)));
        assert_eq!(out.len(), 1);
        assert_eq!(&out[0].params.primary[..], &[0x67, 0x64]);
    }

    #[test]
    fn test_all_outbound_units_share_cached_sets() {
        let mut pipeline = EncodePipeline::new(8);
        pipeline.on_output(format_ready());

        let a = pipeline.on_output(EncoderOutput::Unit(unit(0x65, true)));
        let b = pipeline.on_output(EncoderOutput::Unit(unit(0x41, false)));
        assert!(Arc::ptr_eq(&a[0].params, &b[0].params));
    }

    #[test]
    fn test_startup_buffer_sheds_oldest() {
        let mut pipeline = EncodePipeline::new(2);

        pipeline.on_output(EncoderOutput::Unit(unit(0x01, false)));
        pipeline.on_output(EncoderOutput::Unit(unit(0x02, false)));
        pipeline.on_output(EncoderOutput::Unit(unit(0x03, false)));
        assert_eq!(pipeline.pending_units(), 2);

        let flushed = pipeline.on_output(format_ready());
        assert_eq!(flushed[0].unit.data[0], 0x02);
        assert_eq!(flushed[1].unit.data[0], 0x03);
    }

    #[test]
    fn test_repeated_format_ready_replaces_sets() {
        let mut pipeline = EncodePipeline::new(8);
        pipeline.on_output(format_ready());
        pipeline.on_output(EncoderOutput::FormatReady {
            primary: Bytes::from_static(&[0x67, 0x00]),
            secondary: Bytes::from_static(&[0x68, 0x00]),
        });

        let sets = pipeline.parameter_sets().unwrap();
        assert_eq!(&sets.primary[..], &[0x67, 0x00]);
    }
}
