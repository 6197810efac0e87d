//! Wire multiplexer (sender side)
//!
//! Serializes access units and rotation control records from the two
//! upstream producers into one ordered byte stream. All writes go through a
//! single write lock, so a rotation record or parameter-set prefix can never
//! be interleaved inside another message's byte run.
//!
//! Each message is assembled into one buffer and written with a single
//! locked `write_all`, so a keyframe's parameter-set prefix and payload hit
//! the socket as one contiguous run. A failed write surfaces as
//! [`Error::Transport`] and the session is torn down; partial writes are
//! never retried, because the stream's self-synchronizing framing tolerates
//! a dropped connection but not a torn mid-message write.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::media::{AccessUnit, ParameterSets};
use crate::protocol::constants::UNIT_START_MARKER;
use crate::protocol::rotation::{encode_record, Rotation};

/// Sender-side stream multiplexer
#[derive(Debug)]
pub struct StreamMuxer<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin> StreamMuxer<W> {
    /// Create a muxer over a writable byte stream
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Write a keyframe, preceded by both cached parameter sets.
    ///
    /// Wire order: marker + primary set, marker + secondary set,
    /// marker + unit bytes. The marker is not duplicated if the unit (or a
    /// parameter set) already begins with it.
    pub async fn write_keyframe(&self, unit: &AccessUnit, params: &ParameterSets) -> Result<usize> {
        let mut buf = BytesMut::with_capacity(
            3 * UNIT_START_MARKER.len() + params.primary.len() + params.secondary.len() + unit.len(),
        );
        put_delimited(&mut buf, &params.primary);
        put_delimited(&mut buf, &params.secondary);
        put_delimited(&mut buf, &unit.data);
        self.write_all(&buf).await
    }

    /// Write a delta (non-keyframe) unit
    pub async fn write_delta(&self, unit: &AccessUnit) -> Result<usize> {
        let mut buf = BytesMut::with_capacity(UNIT_START_MARKER.len() + unit.len());
        put_delimited(&mut buf, &unit.data);
        self.write_all(&buf).await
    }

    /// Write a 5-byte rotation control record
    pub async fn write_rotation(&self, rotation: Rotation) -> Result<usize> {
        tracing::debug!(rotation = %rotation, "Writing rotation record");
        self.write_all(&encode_record(rotation)).await
    }

    /// Flush and shut down the underlying stream
    pub async fn shutdown(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }

    /// Consume the muxer, returning the underlying writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn write_all(&self, bytes: &[u8]) -> Result<usize> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(bytes.len())
    }
}

/// Append a start-of-unit marker (unless the bytes already begin with one)
/// followed by the bytes.
fn put_delimited(buf: &mut BytesMut, bytes: &[u8]) {
    if !bytes.starts_with(&UNIT_START_MARKER) {
        buf.put_slice(&UNIT_START_MARKER);
    }
    buf.put_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    fn keyframe(data: &'static [u8]) -> AccessUnit {
        AccessUnit::new(Bytes::from_static(data), true)
    }

    fn params() -> ParameterSets {
        ParameterSets::new(
            Bytes::from_static(&[0x67, 0x64, 0x00, 0x1F]),
            Bytes::from_static(&[0x68, 0xEF, 0x38]),
        )
    }

    #[tokio::test]
    async fn test_keyframe_is_prefixed_with_both_parameter_sets() {
        let mux = StreamMuxer::new(Vec::new());
        mux.write_keyframe(&keyframe(&[0x65, 0x88, 0x84]), &params())
            .await
            .unwrap();

        let written = mux.into_inner();
        assert_eq!(
            written,
            vec![
                0x00, 0x00, 0x00, 0x01, 0x67, 0x64, 0x00, 0x1F, // SPS
                0x00, 0x00, 0x00, 0x01, 0x68, 0xEF, 0x38, // PPS
                0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, // IDR
            ]
        );
    }

    #[tokio::test]
    async fn test_marker_not_duplicated() {
        let mux = StreamMuxer::new(Vec::new());
        mux.write_delta(&AccessUnit::new(
            Bytes::from_static(&[0x00, 0x00, 0x00, 0x01, 0x41, 0x9A]),
            false,
        ))
        .await
        .unwrap();

        let written = mux.into_inner();
        assert_eq!(written, vec![0x00, 0x00, 0x00, 0x01, 0x41, 0x9A]);
    }

    #[tokio::test]
    async fn test_rotation_record_bytes() {
        let mux = StreamMuxer::new(Vec::new());
        mux.write_rotation(Rotation::Deg180).await.unwrap();

        assert_eq!(mux.into_inner(), vec![0xFF, 0x52, 0x54, 0x02, 0xAA]);
    }

    #[tokio::test]
    async fn test_writes_are_not_interleaved() {
        // Concurrent writers against the same muxer must produce whole
        // messages, never bytes of one message inside another.
        let mux = std::sync::Arc::new(StreamMuxer::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..8u8 {
            let mux = std::sync::Arc::clone(&mux);
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    mux.write_rotation(Rotation::Deg90).await.unwrap();
                } else {
                    mux.write_delta(&AccessUnit::new(
                        Bytes::from(vec![0x41, i, i, i]),
                        false,
                    ))
                    .await
                    .unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let written = std::sync::Arc::try_unwrap(mux).unwrap().into_inner();
        // 4 rotation records (5 bytes) + 4 delta units (4 + 4 bytes)
        assert_eq!(written.len(), 4 * 5 + 4 * 8);

        // Walk the stream: every message must be complete and well-formed.
        let mut i = 0;
        let mut rotations = 0;
        let mut units = 0;
        while i < written.len() {
            if written[i] == 0xFF {
                assert_eq!(&written[i..i + 3], &[0xFF, 0x52, 0x54]);
                assert_eq!(written[i + 4], 0xAA);
                rotations += 1;
                i += 5;
            } else {
                assert_eq!(&written[i..i + 4], &[0x00, 0x00, 0x00, 0x01]);
                assert_eq!(written[i + 4], 0x41);
                units += 1;
                i += 8;
            }
        }
        assert_eq!(rotations, 4);
        assert_eq!(units, 4);
    }

    #[tokio::test]
    async fn test_backpressure_blocks_writes() {
        // A peer that stops reading backs the writer up: with a tiny
        // transport buffer the write call must block, not drop or buffer
        // without bound.
        let (tx, mut rx) = tokio::io::duplex(64);
        let mux = StreamMuxer::new(tx);

        let big = AccessUnit::new(Bytes::from(vec![0x41; 4096]), false);
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), mux.write_delta(&big)).await;
        assert!(blocked.is_err(), "write should stall with no reader");

        // Draining the read side unblocks the writer.
        let drain = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut sink = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                match rx.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.extend_from_slice(&buf[..n]),
                }
            }
            sink
        });

        mux.write_delta(&big).await.unwrap();
        mux.shutdown().await.unwrap();
        drop(mux);

        let sink = drain.await.unwrap();
        // First (cancelled) write may have left partial bytes; the second
        // write is complete, so at least one full unit is present.
        assert!(sink.len() >= 4 + 4096);
    }
}
