//! Session configuration

use std::time::Duration;

use crate::encode::EncoderConfig;
use crate::error::Result;
use crate::protocol::constants::{KEYFRAME_INTERVAL, MAX_BITRATE_BPS, MIN_BITRATE_BPS};

/// Configuration for one streaming session (sender or receiver side)
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capture width in pixels
    pub width: u32,

    /// Capture height in pixels
    pub height: u32,

    /// Capture frame rate
    pub fps: u32,

    /// Target bitrate in bits per second (clamped to 5–30 Mbps)
    pub bitrate_bps: u32,

    /// Forced keyframe interval
    pub keyframe_interval: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Socket send buffer size in bytes (0 = OS default).
    ///
    /// Deliberately small so backpressure is felt before seconds of stale
    /// video queue up.
    pub send_buffer_size: usize,

    /// Socket receive buffer size in bytes (0 = OS default)
    pub recv_buffer_size: usize,

    /// Application-level read buffer size (receiver)
    pub read_buffer_size: usize,

    /// Capacity of the sender's outbound message queue
    pub outbound_queue: usize,

    /// Capacity of the receiver's demux-to-decode queue
    pub decode_queue: usize,

    /// Units buffered at startup while awaiting parameter sets
    pub startup_buffer_units: usize,

    /// Consecutive decode failures before the session is declared stalled
    pub stall_threshold: u32,

    /// How long each encoder output poll may block
    pub encoder_poll_timeout: Duration,

    /// Capacity of the status event channel
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 60,
            bitrate_bps: 10_000_000,
            keyframe_interval: KEYFRAME_INTERVAL,
            tcp_nodelay: true, // Important for low latency
            send_buffer_size: 256 * 1024,
            recv_buffer_size: 256 * 1024,
            read_buffer_size: 64 * 1024,
            outbound_queue: 32,
            decode_queue: 64,
            startup_buffer_units: 32, // ~0.5 s at 60 fps
            stall_threshold: 30,
            encoder_poll_timeout: Duration::from_millis(50),
            event_capacity: 32,
        }
    }
}

impl SessionConfig {
    /// Set the capture resolution
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the capture frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the target bitrate, clamped to the supported range
    pub fn bitrate(mut self, bitrate_bps: u32) -> Self {
        self.bitrate_bps = bitrate_bps.clamp(MIN_BITRATE_BPS, MAX_BITRATE_BPS);
        self
    }

    /// Set the forced keyframe interval
    pub fn keyframe_interval(mut self, interval: Duration) -> Self {
        self.keyframe_interval = interval;
        self
    }

    /// Set the stall escalation threshold
    pub fn stall_threshold(mut self, threshold: u32) -> Self {
        self.stall_threshold = threshold.max(1);
        self
    }

    /// Set socket buffer sizes (0 = OS default)
    pub fn socket_buffers(mut self, send: usize, recv: usize) -> Self {
        self.send_buffer_size = send;
        self.recv_buffer_size = recv;
        self
    }

    /// The encoder-facing subset of this configuration
    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            width: self.width,
            height: self.height,
            fps: self.fps,
            bitrate_bps: self.bitrate_bps,
            keyframe_interval: self.keyframe_interval,
        }
    }

    /// Validate against the supported capture profile
    pub fn validate(&self) -> Result<()> {
        self.encoder_config().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.tcp_nodelay);
        assert_eq!(config.keyframe_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_bitrate_clamped() {
        assert_eq!(
            SessionConfig::default().bitrate(1_000_000).bitrate_bps,
            MIN_BITRATE_BPS
        );
        assert_eq!(
            SessionConfig::default().bitrate(100_000_000).bitrate_bps,
            MAX_BITRATE_BPS
        );
        assert_eq!(
            SessionConfig::default().bitrate(8_000_000).bitrate_bps,
            8_000_000
        );
    }

    #[test]
    fn test_builder_chaining() {
        let config = SessionConfig::default()
            .resolution(1280, 720)
            .fps(30)
            .bitrate(6_000_000)
            .stall_threshold(10);

        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
        assert_eq!(config.fps, 30);
        assert_eq!(config.bitrate_bps, 6_000_000);
        assert_eq!(config.stall_threshold, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oversize_resolution_rejected() {
        let config = SessionConfig::default().resolution(2560, 1440);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_encoder_config_mirrors_session() {
        let config = SessionConfig::default().resolution(1280, 720).fps(30);
        let enc = config.encoder_config();
        assert_eq!(enc.width, 1280);
        assert_eq!(enc.fps, 30);
        assert_eq!(enc.bitrate_bps, config.bitrate_bps);
    }
}
