//! Session-level metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for one session.
///
/// Shared as `Arc<SessionStats>` between the pipeline stages; all counters
/// are monotonic within a session.
#[derive(Debug)]
pub struct SessionStats {
    started_at: Instant,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    units_sent: AtomicU64,
    units_received: AtomicU64,
    keyframes: AtomicU64,
    rotation_events: AtomicU64,
    frames_delivered: AtomicU64,
    dropped_units: AtomicU64,
    sync_losses: AtomicU64,
}

impl SessionStats {
    /// Create a stats tracker anchored at now
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            units_sent: AtomicU64::new(0),
            units_received: AtomicU64::new(0),
            keyframes: AtomicU64::new(0),
            rotation_events: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            dropped_units: AtomicU64::new(0),
            sync_losses: AtomicU64::new(0),
        }
    }

    pub fn record_unit_sent(&self, bytes: usize, keyframe: bool) {
        self.units_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        if keyframe {
            self.keyframes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_unit_received(&self, bytes: usize, keyframe: bool) {
        self.units_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
        if keyframe {
            self.keyframes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_bytes_received(&self, bytes: usize) {
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_rotation_event(&self) {
        self.rotation_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_delivered(&self) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_unit(&self) {
        self.dropped_units.fetch_add(1, Ordering::Relaxed);
    }

    /// Overwrite the demux sync-loss counter (the parser owns the count)
    pub fn set_sync_losses(&self, losses: u64) {
        self.sync_losses.store(losses, Ordering::Relaxed);
    }

    /// Session duration so far
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Point-in-time snapshot of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let duration = self.duration();
        let bytes_sent = self.bytes_sent.load(Ordering::Relaxed);
        let bytes_received = self.bytes_received.load(Ordering::Relaxed);
        let secs = duration.as_secs();
        let moved = bytes_sent.max(bytes_received);

        StatsSnapshot {
            duration,
            bytes_sent,
            bytes_received,
            units_sent: self.units_sent.load(Ordering::Relaxed),
            units_received: self.units_received.load(Ordering::Relaxed),
            keyframes: self.keyframes.load(Ordering::Relaxed),
            rotation_events: self.rotation_events.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            dropped_units: self.dropped_units.load(Ordering::Relaxed),
            sync_losses: self.sync_losses.load(Ordering::Relaxed),
            bitrate_bps: if secs > 0 { (moved * 8) / secs } else { 0 },
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a session's counters
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    /// Session duration at snapshot time
    pub duration: Duration,
    /// Total bytes written to the wire
    pub bytes_sent: u64,
    /// Total bytes read from the wire
    pub bytes_received: u64,
    /// Units written
    pub units_sent: u64,
    /// Units reconstructed
    pub units_received: u64,
    /// Keyframes seen (either direction)
    pub keyframes: u64,
    /// Rotation records written or received
    pub rotation_events: u64,
    /// Decoded frames handed to the sink
    pub frames_delivered: u64,
    /// Units dropped as undecodable
    pub dropped_units: u64,
    /// Demux sync losses (health metric)
    pub sync_losses: u64,
    /// Estimated bitrate in bits per second
    pub bitrate_bps: u64,
}
