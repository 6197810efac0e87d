//! Debounced two-threshold hysteresis filter for orientation samples
//!
//! Invoked on every raw sensor sample with a continuous angle. A candidate
//! rotation must hold steady for [`STABILITY_HOLD`] before it commits, and
//! no commit can follow another within [`MIN_CHANGE_INTERVAL`]. Together the
//! two thresholds suppress sensor flicker while still reacting within about
//! 0.5–2.5 s of a genuine physical rotation.
//!
//! Pure state machine: `(sample, now) -> event?`. No sensor or clock
//! dependency, so tests drive it with synthetic instants.

use std::time::{Duration, Instant};

use crate::protocol::rotation::Rotation;

/// Minimum interval between two committed rotation changes.
///
/// Blocks re-triggering immediately after a change, so a user oscillating
/// near a window boundary never commits twice in quick succession.
pub const MIN_CHANGE_INTERVAL: Duration = Duration::from_millis(2000);

/// How long a candidate must hold steady before it commits
pub const STABILITY_HOLD: Duration = Duration::from_millis(500);

/// Half-width of each landscape angular window, in degrees
const WINDOW_HALF_DEG: f32 = 30.0;

/// Debounced orientation filter
#[derive(Debug)]
pub struct OrientationDebouncer {
    current: Rotation,
    pending: Option<Rotation>,
    pending_since: Option<Instant>,
    last_change: Option<Instant>,
}

impl OrientationDebouncer {
    /// Create a debouncer with the session-start rotation (0°)
    pub fn new() -> Self {
        Self {
            current: Rotation::default(),
            pending: None,
            pending_since: None,
            last_change: None,
        }
    }

    /// The current committed rotation
    pub fn current(&self) -> Rotation {
        self.current
    }

    /// Process one raw sensor sample.
    ///
    /// Returns the new rotation when a stable transition commits, `None`
    /// otherwise.
    pub fn on_sample(&mut self, angle_degrees: f32, now: Instant) -> Option<Rotation> {
        // Only the two landscape orientations map to candidates; portrait
        // and in-between samples are dropped.
        let candidate = candidate_for(angle_degrees)?;

        if candidate == self.current {
            self.pending = None;
            self.pending_since = None;
            return None;
        }

        if let Some(last) = self.last_change {
            if now.duration_since(last) < MIN_CHANGE_INTERVAL {
                return None;
            }
        }

        if self.pending != Some(candidate) {
            self.pending = Some(candidate);
            self.pending_since = Some(now);
            return None;
        }

        let since = self.pending_since?;
        if now.duration_since(since) >= STABILITY_HOLD {
            self.current = candidate;
            self.last_change = Some(now);
            self.pending = None;
            self.pending_since = None;
            tracing::info!(rotation = %candidate, "Orientation committed");
            return Some(candidate);
        }

        None
    }
}

impl Default for OrientationDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a continuous angle to a discrete candidate, if it falls inside one of
/// the two landscape windows.
fn candidate_for(angle_degrees: f32) -> Option<Rotation> {
    let angle = angle_degrees.rem_euclid(360.0);
    if (angle - 90.0).abs() <= WINDOW_HALF_DEG {
        Some(Rotation::Deg90)
    } else if (angle - 270.0).abs() <= WINDOW_HALF_DEG {
        Some(Rotation::Deg270)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> Instant {
        Instant::now()
    }

    #[test]
    fn test_candidate_windows() {
        assert_eq!(candidate_for(90.0), Some(Rotation::Deg90));
        assert_eq!(candidate_for(65.0), Some(Rotation::Deg90));
        assert_eq!(candidate_for(115.0), Some(Rotation::Deg90));
        assert_eq!(candidate_for(270.0), Some(Rotation::Deg270));
        // Portrait windows produce no candidate.
        assert_eq!(candidate_for(0.0), None);
        assert_eq!(candidate_for(180.0), None);
        // Outside every window.
        assert_eq!(candidate_for(45.0), None);
        assert_eq!(candidate_for(135.0), None);
        // Angles normalize into [0, 360).
        assert_eq!(candidate_for(-90.0), Some(Rotation::Deg270));
        assert_eq!(candidate_for(450.0), Some(Rotation::Deg90));
    }

    #[test]
    fn test_commit_after_stability_hold() {
        let mut d = OrientationDebouncer::new();
        let start = t0();

        assert_eq!(d.on_sample(90.0, start), None); // arms pending
        assert_eq!(
            d.on_sample(90.0, start + Duration::from_millis(100)),
            None
        );
        assert_eq!(
            d.on_sample(90.0, start + Duration::from_millis(500)),
            Some(Rotation::Deg90)
        );
        assert_eq!(d.current(), Rotation::Deg90);
    }

    #[test]
    fn test_exactly_one_event_per_transition() {
        let mut d = OrientationDebouncer::new();
        let start = t0();

        d.on_sample(90.0, start);
        assert_eq!(
            d.on_sample(90.0, start + STABILITY_HOLD),
            Some(Rotation::Deg90)
        );

        // Continued samples in the same window are no-ops.
        for ms in [600u64, 700, 5000] {
            assert_eq!(d.on_sample(90.0, start + Duration::from_millis(ms)), None);
        }
    }

    #[test]
    fn test_fast_oscillation_never_commits() {
        // Oscillating between the two windows faster than the hold duration:
        // zero events.
        let mut d = OrientationDebouncer::new();
        let start = t0();

        for i in 0..40 {
            let angle = if i % 2 == 0 { 90.0 } else { 270.0 };
            let now = start + Duration::from_millis(i * 200); // < 500 ms per side
            assert_eq!(d.on_sample(angle, now), None);
        }
        assert_eq!(d.current(), Rotation::Deg0);
    }

    #[test]
    fn test_quiet_period_blocks_rapid_rechange() {
        let mut d = OrientationDebouncer::new();
        let start = t0();

        d.on_sample(90.0, start);
        assert_eq!(
            d.on_sample(90.0, start + STABILITY_HOLD),
            Some(Rotation::Deg90)
        );
        let committed_at = start + STABILITY_HOLD;

        // An immediate flip is dropped entirely while inside the quiet
        // period, even if held.
        for ms in [100u64, 400, 900, 1900] {
            assert_eq!(
                d.on_sample(270.0, committed_at + Duration::from_millis(ms)),
                None
            );
        }
        assert_eq!(d.current(), Rotation::Deg90);

        // After the quiet period the flip arms and commits normally.
        let late = committed_at + MIN_CHANGE_INTERVAL;
        assert_eq!(d.on_sample(270.0, late), None);
        assert_eq!(
            d.on_sample(270.0, late + STABILITY_HOLD),
            Some(Rotation::Deg270)
        );
    }

    #[test]
    fn test_candidate_change_restarts_hold_timer() {
        let mut d = OrientationDebouncer::new();
        let start = t0();

        d.on_sample(90.0, start);
        // Flips to the other window 400 ms in: timer restarts.
        d.on_sample(270.0, start + Duration::from_millis(400));
        // 400 ms later the original 90° hold would have expired, but the
        // pending candidate is now 270° with only 400 ms of hold.
        assert_eq!(d.on_sample(270.0, start + Duration::from_millis(800)), None);
        assert_eq!(
            d.on_sample(270.0, start + Duration::from_millis(900)),
            Some(Rotation::Deg270)
        );
    }

    #[test]
    fn test_sample_matching_current_clears_pending() {
        let mut d = OrientationDebouncer::new();
        let start = t0();

        d.on_sample(90.0, start);
        assert_eq!(
            d.on_sample(90.0, start + STABILITY_HOLD),
            Some(Rotation::Deg90)
        );
        let after = start + MIN_CHANGE_INTERVAL + STABILITY_HOLD;

        // Arm a transition back to 270°...
        d.on_sample(270.0, after);
        // ...but a sample matching the committed value cancels it.
        d.on_sample(90.0, after + Duration::from_millis(100));
        // Holding 270° again must start from scratch.
        assert_eq!(
            d.on_sample(270.0, after + Duration::from_millis(200)),
            None
        );
        assert_eq!(
            d.on_sample(270.0, after + Duration::from_millis(600)),
            None
        );
        assert_eq!(
            d.on_sample(270.0, after + Duration::from_millis(700)),
            Some(Rotation::Deg270)
        );
    }

    #[test]
    fn test_out_of_window_samples_dropped() {
        let mut d = OrientationDebouncer::new();
        let start = t0();

        d.on_sample(90.0, start);
        // Out-of-window samples neither commit nor clear the pending state.
        assert_eq!(d.on_sample(45.0, start + Duration::from_millis(200)), None);
        assert_eq!(
            d.on_sample(90.0, start + Duration::from_millis(500)),
            Some(Rotation::Deg90)
        );
    }
}
