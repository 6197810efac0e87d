//! Sender session: encoder drain, orientation debounce, wire writer
//!
//! Three tasks cooperate per session. A blocking task drains the hardware
//! encoder; an async task debounces orientation samples; both feed one
//! bounded queue consumed by a single writer task, which is the only thing
//! that touches the socket. One writer means wire order is exactly queue
//! order, and the bounded queue plus small socket buffers turn a slow peer
//! into backpressure on the encoder drain loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::encode::{EncodePipeline, OutboundUnit, VideoEncoder};
use crate::error::{Error, Result};
use crate::orientation::OrientationDebouncer;
use crate::protocol::{Rotation, StreamMuxer};
use crate::stats::{SessionStats, StatsSnapshot};
use crate::transport;

use super::config::SessionConfig;
use super::status::{SessionEvent, StatusReporter};
use super::SessionGuard;

/// A message queued for the wire
enum Outbound {
    Unit(OutboundUnit),
    Rotation(Rotation),
}

/// An active sender session
pub struct SenderSession {
    shutdown: Arc<watch::Sender<bool>>,
    orientation_tx: mpsc::Sender<f32>,
    writer_task: Option<JoinHandle<()>>,
    encoder_task: Option<JoinHandle<()>>,
    orientation_task: Option<JoinHandle<()>>,
    stats: Arc<SessionStats>,
    status: StatusReporter,
    guard: Option<SessionGuard>,
}

impl SenderSession {
    pub(super) async fn start(
        addr: SocketAddr,
        config: SessionConfig,
        encoder: Box<dyn VideoEncoder>,
        guard: SessionGuard,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>)> {
        config.validate()?;

        let (status, events) = StatusReporter::channel(config.event_capacity);
        status.emit(SessionEvent::Connecting);

        let stream = transport::connect(addr, &config).await?;
        let muxer = StreamMuxer::new(stream);

        // The stream opens at 0 degrees so the receiver never has to guess.
        let stats = Arc::new(SessionStats::new());
        muxer.write_rotation(Rotation::default()).await?;
        stats.record_rotation_event();

        let encoder = start_encoder(encoder, &config).await?;
        status.emit(SessionEvent::Streaming);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown = Arc::new(shutdown_tx);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue);
        let (orientation_tx, orientation_rx) = mpsc::channel::<f32>(config.event_capacity);

        let writer_task = tokio::spawn(writer_loop(
            muxer,
            outbound_rx,
            Arc::clone(&stats),
            status.clone(),
            Arc::clone(&shutdown),
            shutdown_rx.clone(),
        ));

        let encoder_task = tokio::task::spawn_blocking({
            let outbound_tx = outbound_tx.clone();
            let shutdown_rx = shutdown_rx.clone();
            let status = status.clone();
            let config = config.clone();
            move || encoder_loop(encoder, config, outbound_tx, shutdown_rx, status)
        });

        let orientation_task = tokio::spawn(orientation_loop(
            orientation_rx,
            outbound_tx,
            shutdown_rx,
        ));

        Ok((
            Self {
                shutdown,
                orientation_tx,
                writer_task: Some(writer_task),
                encoder_task: Some(encoder_task),
                orientation_task: Some(orientation_task),
                stats,
                status,
                guard: Some(guard),
            },
            events,
        ))
    }

    /// Feed one raw orientation sensor sample, in degrees.
    ///
    /// Cheap and non-blocking; samples arriving faster than the session can
    /// absorb them are dropped, which a debounced filter tolerates by
    /// construction. Fails with [`Error::SessionClosed`] once the session
    /// has stopped.
    pub fn submit_orientation(&self, angle_degrees: f32) -> Result<()> {
        match self.orientation_tx.try_send(angle_degrees) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Orientation sample dropped");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(Error::SessionClosed),
        }
    }

    /// Point-in-time session counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the session and release the encoder. Idempotent.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.orientation_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.encoder_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.writer_task.take() {
            let _ = task.await;
        }
        if self.guard.take().is_some() {
            self.status.emit(SessionEvent::Disconnected);
            tracing::info!("Sender session stopped");
        }
    }
}

/// Configure and start the encoder on the blocking pool, failing the session
/// before any task is spawned if the codec rejects the parameters.
async fn start_encoder(
    mut encoder: Box<dyn VideoEncoder>,
    config: &SessionConfig,
) -> Result<Box<dyn VideoEncoder>> {
    let enc_config = config.encoder_config();
    tokio::task::spawn_blocking(move || {
        encoder.configure(&enc_config)?;
        encoder.start()?;
        Ok(encoder)
    })
    .await
    .map_err(|e| Error::EncoderConfig(format!("encoder startup task failed: {}", e)))?
}

/// Single consumer of the outbound queue; the only writer on the socket.
///
/// Every await point races the shutdown signal. When the peer has stalled
/// the socket, a write can block on TCP flow control indefinitely; the
/// signal abandons it so the loop always reaches the socket shutdown below,
/// which is what unblocks the rest of the teardown.
async fn writer_loop<W>(
    muxer: StreamMuxer<W>,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    stats: Arc<SessionStats>,
    status: StatusReporter,
    shutdown: Arc<watch::Sender<bool>>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    W: tokio::io::AsyncWrite + Unpin,
{
    loop {
        let message = tokio::select! {
            _ = shutdown_rx.changed() => break,
            message = outbound_rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let result = tokio::select! {
            _ = shutdown_rx.changed() => break,
            result = write_message(&muxer, &message, &stats) => result,
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Wire write failed, tearing down");
            status.emit(SessionEvent::Error(e.to_string()));
            let _ = shutdown.send(true);
            break;
        }
    }
    // Closing the write half is the cancellation point for the whole
    // session; dropping outbound_rx here unparks a blocked encoder send.
    if let Err(e) = muxer.shutdown().await {
        tracing::debug!(error = %e, "Socket shutdown failed");
    }
}

async fn write_message<W>(
    muxer: &StreamMuxer<W>,
    message: &Outbound,
    stats: &SessionStats,
) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    match message {
        Outbound::Unit(outbound) => {
            let bytes = if outbound.unit.keyframe {
                muxer.write_keyframe(&outbound.unit, &outbound.params).await?
            } else {
                muxer.write_delta(&outbound.unit).await?
            };
            stats.record_unit_sent(bytes, outbound.unit.keyframe);
        }
        Outbound::Rotation(rotation) => {
            muxer.write_rotation(*rotation).await?;
            stats.record_rotation_event();
        }
    }
    Ok(())
}

/// Blocking encoder drain loop. `blocking_send` is the backpressure point:
/// when the writer (and ultimately the peer) cannot keep up, the drain loop
/// stalls here and the encoder's own queue absorbs the burst.
fn encoder_loop(
    mut encoder: Box<dyn VideoEncoder>,
    config: SessionConfig,
    outbound_tx: mpsc::Sender<Outbound>,
    shutdown_rx: watch::Receiver<bool>,
    status: StatusReporter,
) {
    let mut pipeline = EncodePipeline::new(config.startup_buffer_units);

    while !*shutdown_rx.borrow() {
        match encoder.poll_output(config.encoder_poll_timeout) {
            Ok(Some(output)) => {
                for outbound in pipeline.on_output(output) {
                    if outbound_tx.blocking_send(Outbound::Unit(outbound)).is_err() {
                        encoder.stop();
                        return;
                    }
                }
            }
            Ok(None) => {} // Timeout, re-check shutdown
            Err(e) => {
                tracing::warn!(error = %e, "Encoder failed");
                status.emit(SessionEvent::Error(e.to_string()));
                break;
            }
        }
    }
    encoder.stop();
}

/// Debounce raw sensor samples into committed rotation records
async fn orientation_loop(
    mut orientation_rx: mpsc::Receiver<f32>,
    outbound_tx: mpsc::Sender<Outbound>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut debouncer = OrientationDebouncer::new();
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            sample = orientation_rx.recv() => {
                let Some(angle) = sample else { break };
                if let Some(rotation) = debouncer.on_sample(angle, Instant::now()) {
                    if outbound_tx.send(Outbound::Rotation(rotation)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
