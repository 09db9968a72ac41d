//! Shared animation tempo.
//!
//! A single beat length, usable as a logical clock: locally nudged by
//! tap-tempo input, or overwritten wholesale when a peer's `Beat`
//! broadcast is accepted (most recent value wins - rhythm sync across
//! badges is approximate by design).
//!
//! The clock source is injected at construction.  When every badge is
//! handed the mesh-synchronized clock, accepting a broadcast pins the
//! beat epoch to the shared time origin, so all badges compute the same
//! [`beat_progress`](TempoSync::beat_progress) and animate in phase.

use log::debug;

use crate::clock::Clock;
use crate::config::{BEAT_MAX_MS, BEAT_MIN_MS, DEFAULT_BEAT_MS, TAP_RESET_MS};

/// Recent tap intervals averaged into the beat estimate.
const TAP_HISTORY: usize = 4;

/// Tempo state shared with the animation scheduler.
pub struct TempoSync<C> {
    clock: C,
    beat_ms: u32,
    /// Timestamp of a beat boundary; progress is measured from here.
    epoch_ms: u32,

    last_tap_ms: Option<u32>,
    intervals: [u32; TAP_HISTORY],
    interval_count: usize,
    interval_next: usize,
}

impl<C: Clock> TempoSync<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            beat_ms: DEFAULT_BEAT_MS,
            epoch_ms: 0,
            last_tap_ms: None,
            intervals: [0; TAP_HISTORY],
            interval_count: 0,
            interval_next: 0,
        }
    }

    /// Current beat length in milliseconds.  Always within
    /// `[BEAT_MIN_MS, BEAT_MAX_MS]`.
    pub fn beat_length_ms(&self) -> u32 {
        self.beat_ms
    }

    /// Beats per minute, for the wave generators.
    pub fn bpm(&self) -> u32 {
        60_000 / self.beat_ms
    }

    /// Overwrite the beat length (broadcast receipt).  The value is
    /// clamped to the valid musical range and the epoch is pinned to
    /// the clock origin, so badges sharing a synchronized clock agree
    /// on phase as well as length.
    pub fn set_beat_length(&mut self, beat_ms: u32) {
        self.beat_ms = beat_ms.clamp(BEAT_MIN_MS, BEAT_MAX_MS);
        self.epoch_ms = 0;
    }

    /// Feed the tap-tempo estimator.  `tapped` is the tap edge; calls
    /// with `false` are no-ops so callers can forward raw input state.
    pub fn update_beat(&mut self, tapped: bool) {
        if !tapped {
            return;
        }
        let now = self.clock.now_ms();

        let Some(last) = self.last_tap_ms else {
            // First tap only anchors the beat boundary.
            self.last_tap_ms = Some(now);
            self.epoch_ms = now;
            return;
        };

        let interval = now.wrapping_sub(last);
        if interval < BEAT_MIN_MS {
            // Contact bounce - too fast to be musical intent.  Keep the
            // previous tap as the interval reference.
            return;
        }

        self.last_tap_ms = Some(now);
        self.epoch_ms = now;

        if interval > TAP_RESET_MS {
            // New tap sequence; start the estimate over.
            self.interval_count = 0;
            self.interval_next = 0;
            return;
        }
        if interval > BEAT_MAX_MS {
            // Outlier - anchors the phase but does not feed the estimate.
            return;
        }

        self.intervals[self.interval_next] = interval;
        self.interval_next = (self.interval_next + 1) % TAP_HISTORY;
        if self.interval_count < TAP_HISTORY {
            self.interval_count += 1;
        }

        let sum: u32 = self.intervals[..self.interval_count].iter().sum();
        self.beat_ms = (sum / self.interval_count as u32).clamp(BEAT_MIN_MS, BEAT_MAX_MS);
        debug!("tempo: tap -> beat {} ms", self.beat_ms);
    }

    /// Milliseconds since the beat epoch - the animation clock.  Wave
    /// generators key off this so patterns stay anchored to the tapped
    /// (or broadcast) beat boundary.
    pub fn elapsed_ms(&self) -> u32 {
        self.clock.now_ms().wrapping_sub(self.epoch_ms)
    }

    /// Fractional position within the current beat, in `[0, 1)`.
    pub fn beat_progress(&self) -> f32 {
        (self.elapsed_ms() % self.beat_ms) as f32 / self.beat_ms as f32
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn tempo(clock: &ManualClock) -> TempoSync<&ManualClock> {
        TempoSync::new(clock)
    }

    #[test]
    fn defaults() {
        let clock = ManualClock::new(0);
        let t = tempo(&clock);
        assert_eq!(t.beat_length_ms(), 1000);
        assert_eq!(t.bpm(), 60);
    }

    #[test]
    fn set_beat_length_clamps_to_valid_range() {
        let clock = ManualClock::new(0);
        let mut t = tempo(&clock);
        t.set_beat_length(50);
        assert_eq!(t.beat_length_ms(), 200);
        t.set_beat_length(10_000);
        assert_eq!(t.beat_length_ms(), 2_000);
        t.set_beat_length(500);
        assert_eq!(t.beat_length_ms(), 500);
    }

    #[test]
    fn beat_progress_increases_and_wraps() {
        let clock = ManualClock::new(0);
        let mut t = tempo(&clock);
        t.set_beat_length(500);

        clock.set(0);
        assert_eq!(t.beat_progress(), 0.0);

        let mut previous = -1.0f32;
        for now in [50, 150, 250, 350, 450, 499] {
            clock.set(now);
            let p = t.beat_progress();
            assert!(p > previous, "progress must increase within a beat");
            assert!((0.0..1.0).contains(&p));
            previous = p;
        }

        clock.set(500);
        assert_eq!(t.beat_progress(), 0.0);
        clock.set(750);
        assert_eq!(t.beat_progress(), 0.5);
    }

    #[test]
    fn steady_taps_converge_on_interval() {
        let clock = ManualClock::new(0);
        let mut t = tempo(&clock);
        for now in [0, 600, 1200, 1800] {
            clock.set(now);
            t.update_beat(true);
        }
        assert_eq!(t.beat_length_ms(), 600);
    }

    #[test]
    fn untapped_updates_are_noops() {
        let clock = ManualClock::new(0);
        let mut t = tempo(&clock);
        for now in [0, 600, 1200] {
            clock.set(now);
            t.update_beat(false);
        }
        assert_eq!(t.beat_length_ms(), 1000);
    }

    #[test]
    fn bounce_taps_are_rejected() {
        let clock = ManualClock::new(0);
        let mut t = tempo(&clock);
        clock.set(0);
        t.update_beat(true);
        clock.set(600);
        t.update_beat(true);
        // 50 ms after the previous tap: contact bounce, ignored and not
        // used as the next interval reference.
        clock.set(650);
        t.update_beat(true);
        clock.set(1200);
        t.update_beat(true);
        assert_eq!(t.beat_length_ms(), 600);
    }

    #[test]
    fn overlong_interval_does_not_feed_estimate() {
        let clock = ManualClock::new(0);
        let mut t = tempo(&clock);
        clock.set(0);
        t.update_beat(true);
        clock.set(600);
        t.update_beat(true);
        assert_eq!(t.beat_length_ms(), 600);
        // 3 s gap: plausible pause, anchors phase only.
        clock.set(3_600);
        t.update_beat(true);
        assert_eq!(t.beat_length_ms(), 600);
    }

    #[test]
    fn rolling_mean_over_recent_intervals() {
        let clock = ManualClock::new(0);
        let mut t = tempo(&clock);
        for now in [0, 500, 1000, 1400] {
            clock.set(now);
            t.update_beat(true);
        }
        // Intervals 500, 500, 400 -> mean 466.
        assert_eq!(t.beat_length_ms(), 466);
    }

    #[test]
    fn broadcast_accept_pins_phase_to_clock_origin() {
        let clock = ManualClock::new(0);
        let mut t = tempo(&clock);
        clock.set(12_345);
        t.update_beat(true); // epoch now at 12,345
        t.set_beat_length(500);
        // Epoch pinned back to origin: progress is purely now % beat.
        clock.set(13_000);
        assert_eq!(t.beat_progress(), 0.0);
        clock.set(13_250);
        assert_eq!(t.beat_progress(), 0.5);
    }
}
