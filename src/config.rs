//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, protocol constants, and hardware sizing live
//! here so they can be tuned in one place.  Values that differ between
//! hardware revisions (debounce, sensitivity, timeouts) are additionally
//! exposed as runtime config structs so the decoder and coordinator can
//! be constructed with per-revision tuning.

// Touch input

/// Per-channel debounce time (ms) - a threshold crossing must persist
/// this long before the committed press/release state flips.
pub const TOUCH_DEBOUNCE_MS: u32 = 40;

/// Continuous-press duration (ms) after which a hold event fires.
pub const TOUCH_HOLD_DELAY_MS: u32 = 700;

/// Total calibration window (ms).
pub const CALIBRATION_TIME_MS: u32 = 700;

/// Number of baseline samples taken across the calibration window.
pub const CALIBRATION_SAMPLES: u16 = 5;

/// Sensitivity margin subtracted from the calibrated baseline.  Touching
/// a pad lowers the raw reading, so the press threshold sits this far
/// below the untouched mean.
pub const TOUCH_SENSITIVITY_MARGIN: i32 = 12;

// Encounter / exchange protocol

/// Maximum number of peer records tracked at once.
pub const PEER_CAPACITY: usize = 16;

/// Time budget (ms) for a successful handshake: bounds how long a peer
/// may sit in `Invited`, and doubles as the visible exchange window.
pub const HANDSHAKE_TIMEOUT_MS: u32 = 3_000;

/// Maximum gap (ms) in protocol traffic while `Exchanging` before the
/// encounter is aborted.
pub const BONDING_TIMEOUT_MS: u32 = 20_000;

/// Keepalive cadence (ms) while `Exchanging` - the current progress is
/// retransmitted at this interval.
pub const BONDING_PING_MS: u32 = 300;

/// How long (ms) a finished (`Completed`/`Aborted`) record lingers so
/// duplicate in-flight messages dedupe instead of reopening the exchange.
pub const REMOVAL_GRACE_MS: u32 = 2_000;

/// Number of picture tokens a badge can offer.
pub const PICTURE_COUNT: u16 = 5;

// Tempo

/// Default beat length (ms) - 60 BPM.
pub const DEFAULT_BEAT_MS: u32 = 1_000;

/// Shortest accepted beat length (ms).
pub const BEAT_MIN_MS: u32 = 200;

/// Longest accepted beat length (ms).
pub const BEAT_MAX_MS: u32 = 2_000;

/// A gap between taps longer than this (ms) starts a new tap-tempo
/// sequence instead of feeding the estimator.
pub const TAP_RESET_MS: u32 = 4_000;

// LEDs

/// Number of addressable LEDs on the strip.
pub const LED_COUNT: usize = 7;

/// Default LED brightness ceiling (0-255).
pub const MAX_BRIGHTNESS: u8 = 64;

// Scheduling (embedded loop intervals)

/// Gesture/coordinator tick interval (ms).
pub const TICK_INTERVAL_MS: u64 = 10;

/// LED frame interval (ms).
pub const SHOW_INTERVAL_MS: u64 = 5;

/// Runtime tuning for the gesture decoder (per hardware revision).
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchConfig {
    pub debounce_ms: u32,
    pub hold_delay_ms: u32,
    pub calibration_time_ms: u32,
    pub calibration_samples: u16,
    pub sensitivity_margin: i32,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: TOUCH_DEBOUNCE_MS,
            hold_delay_ms: TOUCH_HOLD_DELAY_MS,
            calibration_time_ms: CALIBRATION_TIME_MS,
            calibration_samples: CALIBRATION_SAMPLES,
            sensitivity_margin: TOUCH_SENSITIVITY_MARGIN,
        }
    }
}

/// Runtime tuning for the encounter coordinator.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncounterConfig {
    pub handshake_timeout_ms: u32,
    pub bonding_timeout_ms: u32,
    pub ping_interval_ms: u32,
    pub removal_grace_ms: u32,
    /// Accept at most this many simultaneous exchanges; further
    /// invitations stay `Invited` until they time out.
    pub max_parallel_exchanges: usize,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: HANDSHAKE_TIMEOUT_MS,
            bonding_timeout_ms: BONDING_TIMEOUT_MS,
            ping_interval_ms: BONDING_PING_MS,
            removal_grace_ms: REMOVAL_GRACE_MS,
            max_parallel_exchanges: 1,
        }
    }
}
