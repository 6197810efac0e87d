//! Orientation filtering
//!
//! Raw sensor orientation samples are noisy; the debouncer turns them into
//! stable rotation-changed events with two-threshold hysteresis.

mod debounce;

pub use debounce::{OrientationDebouncer, MIN_CHANGE_INTERVAL, STABILITY_HOLD};
