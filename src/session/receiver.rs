//! Receiver session: accept, demux, decode, sink
//!
//! Two tasks per session. An async read task owns the socket and the
//! demuxer, pushing reconstructed events into a bounded queue; a blocking
//! task drives the decoder and sink. A full queue makes the read task wait,
//! which stops it reading, which lets TCP flow control push back on the
//! sender. Latency is bounded by queue depth instead of growing without
//! limit behind a slow decoder.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::decode::{DecodePipeline, FrameSink, VideoDecoder};
use crate::error::Result;
use crate::protocol::{DemuxEvent, Demuxer};
use crate::stats::{SessionStats, StatsSnapshot};
use crate::transport;

use super::config::SessionConfig;
use super::status::{SessionEvent, StatusReporter};
use super::SessionGuard;

/// An active receiver session
pub struct ReceiverSession {
    local_addr: SocketAddr,
    shutdown: Arc<watch::Sender<bool>>,
    read_task: Option<JoinHandle<()>>,
    decode_task: Option<JoinHandle<()>>,
    stats: Arc<SessionStats>,
    status: StatusReporter,
    guard: Option<SessionGuard>,
}

impl ReceiverSession {
    pub(super) async fn start(
        addr: SocketAddr,
        config: SessionConfig,
        decoder: Box<dyn VideoDecoder>,
        sink: Box<dyn FrameSink>,
        guard: SessionGuard,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>)> {
        let (status, events) = StatusReporter::channel(config.event_capacity);

        // Bind before returning so callers can read the bound port.
        let listener = transport::listen(addr, &config).await?;
        let local_addr = listener.local_addr()?;
        status.emit(SessionEvent::Listening);

        let stats = Arc::new(SessionStats::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown = Arc::new(shutdown_tx);
        let (decode_tx, decode_rx) = mpsc::channel(config.decode_queue);

        let decode_task = tokio::task::spawn_blocking({
            let stats = Arc::clone(&stats);
            let status = status.clone();
            let threshold = config.stall_threshold;
            move || decode_loop(decode_rx, decoder, sink, threshold, stats, status)
        });

        let read_task = tokio::spawn(read_loop(
            listener,
            config,
            decode_tx,
            Arc::clone(&stats),
            status.clone(),
            shutdown_rx,
        ));

        Ok((
            Self {
                local_addr,
                shutdown,
                read_task: Some(read_task),
                decode_task: Some(decode_task),
                stats,
                status,
                guard: Some(guard),
            },
            events,
        ))
    }

    /// The bound listening address (useful when binding port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Point-in-time session counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the session and release the decoder and sink. Idempotent.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.read_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.decode_task.take() {
            let _ = task.await;
        }
        if self.guard.take().is_some() {
            self.status.emit(SessionEvent::Disconnected);
            tracing::info!("Receiver session stopped");
        }
    }
}

/// Accept one sender and feed the demuxer until the stream ends
async fn read_loop(
    listener: TcpListener,
    config: SessionConfig,
    decode_tx: mpsc::Sender<DemuxEvent>,
    stats: Arc<SessionStats>,
    status: StatusReporter,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let stream = tokio::select! {
        _ = shutdown_rx.changed() => return,
        accepted = listener.accept() => match accepted {
            Ok((stream, peer)) => {
                tracing::info!(peer = %peer, "Sender connected");
                stream
            }
            Err(e) => {
                status.emit(SessionEvent::Error(e.to_string()));
                return;
            }
        },
    };

    if let Err(e) = stream.set_nodelay(config.tcp_nodelay) {
        tracing::debug!(error = %e, "set_nodelay failed");
    }
    status.emit(SessionEvent::Streaming);

    pump_stream(stream, listener, &config, decode_tx, stats, status, shutdown_rx).await;
}

async fn pump_stream(
    mut stream: TcpStream,
    listener: TcpListener,
    config: &SessionConfig,
    decode_tx: mpsc::Sender<DemuxEvent>,
    stats: Arc<SessionStats>,
    status: StatusReporter,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut demux = Demuxer::new();
    let mut buf = vec![0u8; config.read_buffer_size];

    loop {
        let read = tokio::select! {
            _ = shutdown_rx.changed() => return,
            // One peer per session: late connects are accepted and
            // immediately dropped so they fail fast instead of queueing.
            extra = listener.accept() => {
                if let Ok((_conn, peer)) = extra {
                    tracing::warn!(peer = %peer, "Rejecting connection, session already active");
                }
                continue;
            }
            read = stream.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                // Peer closed cleanly; a unit in flight at the tail is
                // complete by definition and still worth decoding.
                if let Some(unit) = demux.finish() {
                    stats.record_unit_received(unit.len(), unit.keyframe);
                    let _ = decode_tx.send(DemuxEvent::Unit(unit)).await;
                }
                status.emit(SessionEvent::Disconnected);
                return;
            }
            Ok(n) => {
                stats.record_bytes_received(n);
                for event in demux.push(&buf[..n]) {
                    match &event {
                        DemuxEvent::Unit(unit) => {
                            stats.record_unit_received(unit.len(), unit.keyframe)
                        }
                        DemuxEvent::Rotation(_) => stats.record_rotation_event(),
                    }
                    // Blocks when the decoder is behind; not reading is how
                    // backpressure reaches the sender.
                    if decode_tx.send(event).await.is_err() {
                        return;
                    }
                }
                stats.set_sync_losses(demux.sync_losses());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Read failed");
                status.emit(SessionEvent::Error(e.to_string()));
                return;
            }
        }
    }
}

/// Blocking decoder drive loop. Ends when the queue closes or the pipeline
/// declares a stall.
fn decode_loop(
    mut decode_rx: mpsc::Receiver<DemuxEvent>,
    decoder: Box<dyn VideoDecoder>,
    sink: Box<dyn FrameSink>,
    stall_threshold: u32,
    stats: Arc<SessionStats>,
    status: StatusReporter,
) {
    let mut pipeline = DecodePipeline::new(decoder, sink, stall_threshold, stats);
    while let Some(event) = decode_rx.blocking_recv() {
        if let Err(e) = pipeline.handle_event(event) {
            tracing::warn!(error = %e, "Decode pipeline failed, tearing down");
            status.emit(SessionEvent::Error(e.to_string()));
            // Closing the queue makes the read task's send fail and exit.
            decode_rx.close();
            break;
        }
    }
}
