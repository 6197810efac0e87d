//! Demuxing parser (receiver side)
//!
//! Reconstructs the two logical channels (video units, rotation records)
//! from the raw byte stream. The dominant channel has no length prefix, so
//! boundaries are recovered from the byte patterns alone:
//!
//! - `00 00 00 01` starts a video unit, which extends to the next marker of
//!   either kind.
//! - `FF 52 54 <v> AA` is a rotation record. All five bytes must validate,
//!   and while a unit is being accumulated the record is only accepted when
//!   it sits at a unit boundary, i.e. its five bytes are themselves followed
//!   by a start marker. A valid-looking pattern followed by more payload is
//!   payload. (The sender's debounce interval guarantees records are never
//!   written back to back mid-stream, so a record is always followed by a
//!   unit marker.)
//!
//! The boundary check makes misreading embedded video bytes as a control
//! record improbable, not impossible; on a false positive the parser simply
//! keeps scanning from the next byte and resynchronizes at the next marker.
//!
//! The parser is incremental: feed it byte chunks as they arrive off the
//! socket, collect events in wire order. Unconsumed bytes (partial units,
//! undecidable candidates at the buffer tail) are held until more data
//! arrives or [`Demuxer::finish`] is called at end of stream. Memory is
//! bounded: a unit that grows past `MAX_UNIT_LEN` is discarded as corrupt,
//! counted as a sync loss, and scanning resumes.

use bytes::{Buf, BytesMut};

use crate::media::{AccessUnit, UnitKind};
use crate::protocol::constants::{
    MAX_UNIT_LEN, ROTATION_MARKER, ROTATION_RECORD_LEN, SYNC_LOSS_SCAN_LIMIT, UNIT_START_MARKER,
};
use crate::protocol::rotation::{parse_record, Rotation};

/// One demultiplexed message, in wire order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemuxEvent {
    /// A reconstructed video access unit (payload includes its start marker)
    Unit(AccessUnit),
    /// A rotation control record
    Rotation(Rotation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemuxState {
    /// Scanning for the first marker of either kind
    SeekingSync,
    /// A unit is being accumulated; buffer starts with its marker
    AccumulatingUnit,
}

/// Incremental stream demultiplexer
#[derive(Debug)]
pub struct Demuxer {
    buf: BytesMut,
    state: DemuxState,
    /// Next unexamined offset while accumulating (avoids rescanning payload)
    scan_pos: usize,
    /// Bytes discarded while seeking since the last successful sync
    skipped: usize,
    sync_losses: u64,
}

impl Demuxer {
    /// Create a demuxer in the seeking state
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(64 * 1024),
            state: DemuxState::SeekingSync,
            scan_pos: 0,
            skipped: 0,
            sync_losses: 0,
        }
    }

    /// Feed a chunk of stream bytes, returning all events completed by it,
    /// in the order they appeared on the wire.
    pub fn push(&mut self, data: &[u8]) -> Vec<DemuxEvent> {
        self.buf.extend_from_slice(data);
        let mut out = Vec::new();
        loop {
            let progressed = match self.state {
                DemuxState::SeekingSync => self.seek_sync(&mut out),
                DemuxState::AccumulatingUnit => self.scan_unit(&mut out),
            };
            if !progressed {
                break;
            }
        }
        out
    }

    /// End of stream: flush the unit being accumulated, if any.
    ///
    /// An undecidable record candidate at the tail is treated as payload; a
    /// genuine rotation cut off by disconnect is lost, which is harmless
    /// because the sender re-sends its current rotation on every connect.
    pub fn finish(&mut self) -> Option<AccessUnit> {
        let result = if self.state == DemuxState::AccumulatingUnit
            && self.buf.len() > UNIT_START_MARKER.len()
        {
            let data = self.buf.split_to(self.buf.len()).freeze();
            Some(make_unit(data))
        } else {
            self.buf.clear();
            None
        };
        self.state = DemuxState::SeekingSync;
        self.scan_pos = 0;
        result
    }

    /// How many times the parser scanned a long byte run without finding any
    /// valid marker. Health metric; the parser keeps scanning regardless.
    pub fn sync_losses(&self) -> u64 {
        self.sync_losses
    }

    /// Bytes currently buffered awaiting a boundary
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Scan for either marker. The 5-byte control pattern is checked first;
    /// its leading byte differs from the unit marker's, so the two patterns
    /// cannot alias at the same offset.
    fn seek_sync(&mut self, out: &mut Vec<DemuxEvent>) -> bool {
        let mut i = 0;
        while i < self.buf.len() {
            let b = self.buf[i];
            if b == ROTATION_MARKER {
                if self.buf.len() - i < ROTATION_RECORD_LEN {
                    break; // possible partial record, wait for more bytes
                }
                if let Some(rot) = parse_record(&self.buf[i..i + ROTATION_RECORD_LEN]) {
                    self.note_skipped(i);
                    self.buf.advance(i + ROTATION_RECORD_LEN);
                    self.skipped = 0;
                    out.push(DemuxEvent::Rotation(rot));
                    i = 0;
                    continue;
                }
                // Leading byte matched but the full pattern did not: treat
                // as ordinary payload and resume one byte forward.
            } else if b == 0x00 {
                if self.buf.len() - i < UNIT_START_MARKER.len() {
                    break; // possible partial marker
                }
                if self.buf[i..i + UNIT_START_MARKER.len()] == UNIT_START_MARKER {
                    self.note_skipped(i);
                    self.buf.advance(i);
                    self.skipped = 0;
                    self.state = DemuxState::AccumulatingUnit;
                    self.scan_pos = UNIT_START_MARKER.len();
                    return true;
                }
            }
            i += 1;
        }
        // Everything before i is garbage; keep the undecidable tail.
        self.note_skipped(i);
        self.buf.advance(i);
        false
    }

    /// Accumulate payload until the next marker of either kind.
    fn scan_unit(&mut self, out: &mut Vec<DemuxEvent>) -> bool {
        let mut i = self.scan_pos;
        loop {
            if i >= MAX_UNIT_LEN {
                // Nothing the capture profile produces gets near this size;
                // discard the accumulation and hunt for the next marker
                // rather than buffering a corrupt stream without bound.
                tracing::warn!(bytes = i, "Oversized unit, resynchronizing");
                self.sync_losses += 1;
                self.buf.advance(i);
                self.state = DemuxState::SeekingSync;
                self.scan_pos = 0;
                self.skipped = 0;
                return true;
            }
            if self.buf.len() < i + UNIT_START_MARKER.len() {
                self.scan_pos = i;
                return false;
            }
            if self.buf[i..i + UNIT_START_MARKER.len()] == UNIT_START_MARKER {
                self.emit_unit(i, out);
                return true;
            }
            if self.buf[i] == ROTATION_MARKER {
                let needed = i + ROTATION_RECORD_LEN + UNIT_START_MARKER.len();
                if self.buf.len() < needed {
                    // Cannot yet tell record from payload; wait.
                    self.scan_pos = i;
                    return false;
                }
                if let Some(rot) = parse_record(&self.buf[i..i + ROTATION_RECORD_LEN]) {
                    let after = &self.buf[i + ROTATION_RECORD_LEN..needed];
                    if after == UNIT_START_MARKER {
                        // Record at a unit boundary: close the unit, accept
                        // the record.
                        self.emit_unit(i, out);
                        self.buf.advance(ROTATION_RECORD_LEN);
                        out.push(DemuxEvent::Rotation(rot));
                        return true;
                    }
                }
                // Valid-looking bytes mid-payload stay payload.
            }
            i += 1;
        }
    }

    /// Close the unit ending at `end` and leave the buffer at the byte run
    /// that terminated it.
    fn emit_unit(&mut self, end: usize, out: &mut Vec<DemuxEvent>) {
        let data = self.buf.split_to(end).freeze();
        self.scan_pos = UNIT_START_MARKER.len();
        // A bare marker with no payload carries nothing; skip it.
        if data.len() > UNIT_START_MARKER.len() {
            out.push(DemuxEvent::Unit(make_unit(data)));
        }
    }

    fn note_skipped(&mut self, n: usize) {
        self.skipped += n;
        while self.skipped >= SYNC_LOSS_SCAN_LIMIT {
            self.skipped -= SYNC_LOSS_SCAN_LIMIT;
            self.sync_losses += 1;
            tracing::warn!(
                total = self.sync_losses,
                "No valid marker in an extended byte run"
            );
        }
    }
}

impl Default for Demuxer {
    fn default() -> Self {
        Self::new()
    }
}

fn make_unit(data: bytes::Bytes) -> AccessUnit {
    let mut unit = AccessUnit::new(data, false);
    unit.keyframe = unit.kind() == UnitKind::Keyframe;
    unit
}
