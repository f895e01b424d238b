//! Pulse-width measurement
//!
//! Converts pairs of edges on one echo line into a pulse width and a
//! distance. The tracker is a two-state machine: idle until a rising edge
//! arms it, then the next falling edge emits a pulse. A second rising edge
//! while armed simply re-arms with the newer timestamp (last rise wins); a
//! falling edge with no rise on record is an orphan and emits nothing.

use std::time::Duration;

use crate::gpio::{Edge, EdgeStamp};

/// Default speed of sound in air, m/s.
pub const SPEED_OF_SOUND: f64 = 343.0;

/// One measured echo pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    /// Time between the rising and falling edge.
    pub width: Duration,
    /// Distance in meters derived from the width.
    pub distance_m: f64,
}

/// Per-channel edge-pair state machine.
pub struct PulseTracker {
    sound_speed: f64,
    rise_ns: Option<u64>,
}

impl PulseTracker {
    /// Create a tracker using `sound_speed` (m/s) for the conversion.
    pub fn new(sound_speed: f64) -> Self {
        Self {
            sound_speed,
            rise_ns: None,
        }
    }

    /// Feed one edge; returns a [`Pulse`] when a rising/falling pair closes.
    ///
    /// The sensor holds the echo line high for the round-trip time of the
    /// ultrasonic burst, so distance is `c * width / 2`. A falling edge whose
    /// timestamp is not strictly after the recorded rise (clock oddity,
    /// duplicated event) clears the state and emits nothing.
    pub fn on_edge(&mut self, stamp: &EdgeStamp) -> Option<Pulse> {
        match stamp.edge {
            Edge::Rising => {
                self.rise_ns = Some(stamp.timestamp_ns);
                None
            }
            Edge::Falling => {
                let rise_ns = self.rise_ns.take()?;
                let width_ns = stamp.timestamp_ns.checked_sub(rise_ns)?;
                if width_ns == 0 {
                    return None;
                }
                let width_s = width_ns as f64 * 1e-9;
                Some(Pulse {
                    width: Duration::from_nanos(width_ns),
                    distance_m: self.sound_speed * width_s / 2.0,
                })
            }
        }
    }
}

impl Default for PulseTracker {
    fn default() -> Self {
        Self::new(SPEED_OF_SOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(ts: u64) -> EdgeStamp {
        EdgeStamp {
            edge: Edge::Rising,
            timestamp_ns: ts,
        }
    }

    fn falling(ts: u64) -> EdgeStamp {
        EdgeStamp {
            edge: Edge::Falling,
            timestamp_ns: ts,
        }
    }

    #[test]
    fn rising_falling_pair_emits_one_pulse() {
        let mut tracker = PulseTracker::default();
        assert!(tracker.on_edge(&rising(1_000)).is_none());
        let pulse = tracker.on_edge(&falling(1_001_000)).unwrap();

        assert_eq!(pulse.width, Duration::from_nanos(1_000_000));
        // 343 m/s * 1 ms / 2 = 0.1715 m
        assert!((pulse.distance_m - 0.1715).abs() < 1e-9);
    }

    #[test]
    fn orphan_falling_emits_nothing() {
        let mut tracker = PulseTracker::default();
        assert!(tracker.on_edge(&falling(5_000)).is_none());
        // State stays idle: a later full pair still works.
        assert!(tracker.on_edge(&rising(6_000)).is_none());
        assert!(tracker.on_edge(&falling(7_000)).is_some());
    }

    #[test]
    fn second_rising_discards_the_first() {
        let mut tracker = PulseTracker::default();
        assert!(tracker.on_edge(&rising(1_000)).is_none());
        assert!(tracker.on_edge(&rising(2_000)).is_none());
        let pulse = tracker.on_edge(&falling(3_000)).unwrap();
        assert_eq!(pulse.width, Duration::from_nanos(1_000));
    }

    #[test]
    fn pair_consumes_the_rise() {
        let mut tracker = PulseTracker::default();
        tracker.on_edge(&rising(1_000));
        assert!(tracker.on_edge(&falling(2_000)).is_some());
        // Second falling with no new rise is an orphan.
        assert!(tracker.on_edge(&falling(3_000)).is_none());
    }

    #[test]
    fn non_monotonic_falling_is_an_orphan() {
        let mut tracker = PulseTracker::default();
        tracker.on_edge(&rising(10_000));
        assert!(tracker.on_edge(&falling(9_000)).is_none());
        // Zero width is rejected too.
        tracker.on_edge(&rising(10_000));
        assert!(tracker.on_edge(&falling(10_000)).is_none());
    }

    #[test]
    fn custom_sound_speed() {
        let mut tracker = PulseTracker::new(300.0);
        tracker.on_edge(&rising(0));
        let pulse = tracker.on_edge(&falling(2_000_000)).unwrap();
        // 300 m/s * 2 ms / 2 = 0.3 m
        assert!((pulse.distance_m - 0.3).abs() < 1e-9);
    }
}
