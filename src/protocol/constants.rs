//! Wire format constants
//!
//! The wire is a single ordered TCP byte stream carrying two message kinds:
//!
//! ```text
//! Video unit:       00 00 00 01 <payload ... until next marker of either kind>
//! Rotation record:  FF 52 54 <v> AA        (v in 0..=3)
//! ```
//!
//! Video units carry no length prefix; boundaries are recovered from the
//! byte patterns alone. The rotation record's leading byte (0xFF) differs
//! from the unit marker's first byte (0x00), so the two patterns cannot
//! alias at the same offset.

use std::time::Duration;

/// Start-of-unit marker (Annex B start code)
pub const UNIT_START_MARKER: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Leading byte of a rotation control record
pub const ROTATION_MARKER: u8 = 0xFF;

/// Fixed tag bytes of a rotation control record (ASCII "RT")
pub const ROTATION_TAG: [u8; 2] = [0x52, 0x54];

/// Trailing suffix byte of a rotation control record
pub const ROTATION_SUFFIX: u8 = 0xAA;

/// Total size of a rotation control record
pub const ROTATION_RECORD_LEN: usize = 5;

/// Maximum capture width
pub const MAX_WIDTH: u32 = 1920;

/// Maximum capture height
pub const MAX_HEIGHT: u32 = 1080;

/// Maximum capture frame rate
pub const MAX_FPS: u32 = 60;

/// Minimum configurable bitrate (5 Mbps)
pub const MIN_BITRATE_BPS: u32 = 5_000_000;

/// Maximum configurable bitrate (30 Mbps)
pub const MAX_BITRATE_BPS: u32 = 30_000_000;

/// Fixed keyframe interval, independent of scene content.
///
/// Trades compression efficiency for fast recovery after a reconnect.
pub const KEYFRAME_INTERVAL: Duration = Duration::from_secs(1);

/// Bytes scanned without finding any marker before a sync loss is counted
pub const SYNC_LOSS_SCAN_LIMIT: usize = 64 * 1024;

/// Upper bound on one accumulated video unit.
///
/// Far above any single frame the 30 Mbps capture profile can produce; an
/// accumulation this large means the stream is corrupt (or hostile) and the
/// parser discards it and resynchronizes instead of buffering forever.
pub const MAX_UNIT_LEN: usize = 8 * 1024 * 1024;
