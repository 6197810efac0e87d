//! Loopback streaming demo with synthetic media
//!
//! Run with: cargo run --example loopback
//!
//! Starts a receiver on 127.0.0.1, connects a sender to it, and streams a
//! few seconds of synthetic access units through the full engine: encoder
//! drain, parameter-set handshake, wire mux, demux, decode, sink. Partway
//! through, orientation samples rotate the phone to landscape and the
//! rotation record propagates to the received frames.
//!
//! No camera, codec, or second machine required; the encoder and decoder
//! are scripted stand-ins that move realistic byte patterns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use camlink::decode::{DecodeError, DecodedFrame, FrameSink, VideoDecoder};
use camlink::encode::{EncoderConfig, EncoderOutput, VideoEncoder};
use camlink::media::UnitKind;
use camlink::{AccessUnit, Result, SessionConfig, StreamEndpoint};

/// Synthetic encoder: one unit per frame interval, keyframe every second
struct SyntheticEncoder {
    config: EncoderConfig,
    frame: u64,
    format_sent: bool,
}

impl SyntheticEncoder {
    fn new() -> Self {
        Self {
            config: EncoderConfig::default(),
            frame: 0,
            format_sent: false,
        }
    }
}

impl VideoEncoder for SyntheticEncoder {
    fn configure(&mut self, config: &EncoderConfig) -> Result<()> {
        config.validate()?;
        self.config = config.clone();
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn poll_output(&mut self, timeout: Duration) -> Result<Option<EncoderOutput>> {
        if !self.format_sent {
            self.format_sent = true;
            return Ok(Some(EncoderOutput::FormatReady {
                primary: Bytes::from_static(&[0x67, 0x64, 0x00, 0x1F, 0xAC]),
                secondary: Bytes::from_static(&[0x68, 0xEF, 0x38, 0x80]),
            }));
        }

        // Pace output at the configured frame rate.
        std::thread::sleep(timeout.min(Duration::from_millis(
            1000 / u64::from(self.config.fps.max(1)),
        )));

        let keyframe = self.frame % u64::from(self.config.fps.max(1)) == 0;
        let mut data = BytesMut::with_capacity(64);
        data.put_u8(if keyframe { 0x65 } else { 0x41 });
        // Keep the payload free of zero bytes so it can never alias a
        // delimiter (real encoders do this with emulation prevention).
        for byte in self.frame.to_be_bytes() {
            data.put_u8(byte | 0x01);
        }
        data.extend_from_slice(&[0x80; 32]);
        self.frame += 1;
        Ok(Some(EncoderOutput::Unit(AccessUnit::new(
            data.freeze(),
            keyframe,
        ))))
    }

    fn set_bitrate(&mut self, _bitrate_bps: u32) {}

    fn stop(&mut self) {}
}

/// Synthetic decoder: one frame per picture unit
struct SyntheticDecoder;

impl VideoDecoder for SyntheticDecoder {
    fn decode(&mut self, unit: &AccessUnit) -> std::result::Result<Vec<DecodedFrame>, DecodeError> {
        if matches!(unit.kind(), UnitKind::Sps | UnitKind::Pps) {
            return Ok(Vec::new());
        }
        Ok(vec![DecodedFrame {
            data: Bytes::copy_from_slice(unit.payload()),
            width: 1280,
            height: 720,
            rotation: Default::default(),
        }])
    }
}

/// Sink that counts frames and logs rotation changes
struct CountingSink {
    frames: Arc<AtomicU64>,
    last_rotation: Option<camlink::Rotation>,
}

impl FrameSink for CountingSink {
    fn write_frame(&mut self, frame: DecodedFrame) -> Result<()> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        if self.last_rotation != Some(frame.rotation) {
            tracing::info!(rotation = %frame.rotation, "Sink rotation changed");
            self.last_rotation = Some(frame.rotation);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = SessionConfig::default().resolution(1280, 720).fps(30);
    let frames = Arc::new(AtomicU64::new(0));

    let receiver_end = StreamEndpoint::new();
    let (mut receiver, mut recv_events) = receiver_end
        .start_receiver(
            "127.0.0.1:0".parse().unwrap(),
            config.clone(),
            Box::new(SyntheticDecoder),
            Box::new(CountingSink {
                frames: Arc::clone(&frames),
                last_rotation: None,
            }),
        )
        .await?;
    tokio::spawn(async move {
        while let Some(event) = recv_events.recv().await {
            tracing::info!(side = "receiver", "{}", event);
        }
    });

    let sender_end = StreamEndpoint::new();
    let (mut sender, mut send_events) = sender_end
        .start_sender(
            receiver.local_addr(),
            config,
            Box::new(SyntheticEncoder::new()),
        )
        .await?;
    tokio::spawn(async move {
        while let Some(event) = send_events.recv().await {
            tracing::info!(side = "sender", "{}", event);
        }
    });

    // Stream flat for a second, then rotate the phone to landscape and hold
    // it there long enough for the debouncer to commit.
    tokio::time::sleep(Duration::from_secs(1)).await;
    tracing::info!("Rotating to 90 degrees");
    for _ in 0..30 {
        sender.submit_orientation(92.0)?;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    sender.stop().await;
    receiver.stop().await;

    let sent = sender.stats();
    let received = receiver.stats();
    tracing::info!(
        units_sent = sent.units_sent,
        keyframes = sent.keyframes,
        rotations = sent.rotation_events,
        bitrate_bps = sent.bitrate_bps,
        "Sender totals"
    );
    tracing::info!(
        units_received = received.units_received,
        frames = frames.load(Ordering::Relaxed),
        frames_delivered = received.frames_delivered,
        sync_losses = received.sync_losses,
        "Receiver totals"
    );
    Ok(())
}
