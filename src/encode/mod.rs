//! Encoder contract and sender-side encode pipeline
//!
//! The hardware encoder itself is an external collaborator behind the
//! [`VideoEncoder`] trait: an opaque codec that, once configured and
//! started, produces compressed access units at roughly the capture frame
//! rate and signals its parameter sets once per session through a
//! format-ready output.
//!
//! The trait is blocking by design. A real hardware codec is drained from a
//! dedicated blocking task; `poll_output` takes a short timeout (tens of
//! milliseconds) so the drain loop can observe session teardown promptly
//! instead of parking on the codec indefinitely.

mod pipeline;

pub use pipeline::{EncodePipeline, OutboundUnit};

use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::media::AccessUnit;
use crate::protocol::constants::{
    KEYFRAME_INTERVAL, MAX_BITRATE_BPS, MAX_FPS, MAX_HEIGHT, MAX_WIDTH, MIN_BITRATE_BPS,
};

/// Capture/encode parameters, fixed for the lifetime of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Capture width in pixels
    pub width: u32,
    /// Capture height in pixels
    pub height: u32,
    /// Capture frame rate
    pub fps: u32,
    /// Target bitrate in bits per second
    pub bitrate_bps: u32,
    /// Forced keyframe interval, independent of scene content
    pub keyframe_interval: Duration,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 60,
            bitrate_bps: 10_000_000,
            keyframe_interval: KEYFRAME_INTERVAL,
        }
    }
}

impl EncoderConfig {
    /// Validate against the supported capture profile
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.width > MAX_WIDTH || self.height > MAX_HEIGHT
        {
            return Err(Error::EncoderConfig(format!(
                "unsupported resolution {}x{} (max {}x{})",
                self.width, self.height, MAX_WIDTH, MAX_HEIGHT
            )));
        }
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(Error::EncoderConfig(format!(
                "unsupported frame rate {} (max {})",
                self.fps, MAX_FPS
            )));
        }
        if self.bitrate_bps < MIN_BITRATE_BPS || self.bitrate_bps > MAX_BITRATE_BPS {
            return Err(Error::EncoderConfig(format!(
                "bitrate {} out of range {}..={}",
                self.bitrate_bps, MIN_BITRATE_BPS, MAX_BITRATE_BPS
            )));
        }
        Ok(())
    }
}

/// One output retrieved from the encoder
#[derive(Debug, Clone)]
pub enum EncoderOutput {
    /// One-time format-change signal carrying both parameter sets.
    ///
    /// Delivered before any unit can be forwarded downstream.
    FormatReady {
        /// Primary parameter set (SPS), without start code
        primary: Bytes,
        /// Secondary parameter set (PPS), without start code
        secondary: Bytes,
    },
    /// One compressed access unit
    Unit(AccessUnit),
}

/// Opaque hardware video encoder.
///
/// Implementations wrap a platform codec. All methods may block briefly;
/// the engine drives them from a dedicated blocking task.
pub trait VideoEncoder: Send {
    /// Apply capture parameters. Fails with [`Error::EncoderConfig`] if the
    /// codec rejects them; fatal to the session, no retry.
    fn configure(&mut self, config: &EncoderConfig) -> Result<()>;

    /// Begin producing access units at approximately the configured rate
    fn start(&mut self) -> Result<()>;

    /// Retrieve the next output, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nothing is ready within the timeout.
    fn poll_output(&mut self, timeout: Duration) -> Result<Option<EncoderOutput>>;

    /// Request a new bitrate. Best effort: takes effect on the next
    /// session, not mid-stream.
    fn set_bitrate(&mut self, bitrate_bps: u32);

    /// Drain and release encoder resources. Must be idempotent.
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EncoderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_resolution_limits() {
        let mut config = EncoderConfig::default();
        config.width = 3840;
        config.height = 2160;
        assert!(matches!(
            config.validate(),
            Err(Error::EncoderConfig(_))
        ));

        config.width = 0;
        config.height = 1080;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fps_limits() {
        let mut config = EncoderConfig::default();
        config.fps = 120;
        assert!(config.validate().is_err());
        config.fps = 0;
        assert!(config.validate().is_err());
        config.fps = 30;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bitrate_limits() {
        let mut config = EncoderConfig::default();
        config.bitrate_bps = 1_000_000;
        assert!(config.validate().is_err());
        config.bitrate_bps = 50_000_000;
        assert!(config.validate().is_err());
        config.bitrate_bps = 5_000_000;
        assert!(config.validate().is_ok());
        config.bitrate_bps = 30_000_000;
        assert!(config.validate().is_ok());
    }
}
