//! Per-channel debounce state machine.

/// One calibrated capacitive channel.
///
/// The raw signal flips `raw_active` immediately on a threshold
/// crossing; the committed `pressed` state follows only once the
/// crossing has persisted for the debounce interval, symmetrically for
/// press and release.  Edge flags are valid for the tick they occurred
/// on and are cleared by the next [`sample`](TouchChannel::sample).
#[derive(Debug)]
pub struct TouchChannel {
    /// Press threshold in sensor units; 0 means "not yet calibrated"
    /// and suppresses all presses.
    threshold: i32,
    /// Calibrated untouched baseline (mean minus margin already applied
    /// to `threshold`; kept for diagnostics).
    baseline: i32,
    pressed: bool,
    press_start_ms: u32,

    raw_active: bool,
    last_crossing_ms: u32,

    was_pressed: bool,
    was_released: bool,
}

impl TouchChannel {
    pub const fn new() -> Self {
        Self {
            threshold: 0,
            baseline: 0,
            pressed: false,
            press_start_ms: 0,
            raw_active: false,
            last_crossing_ms: 0,
            was_pressed: false,
            was_released: false,
        }
    }

    /// Install a calibrated threshold: `baseline - margin`.
    pub fn set_threshold(&mut self, baseline: i32, margin: i32) {
        self.baseline = baseline;
        self.threshold = baseline - margin;
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn baseline(&self) -> i32 {
        self.baseline
    }

    pub fn is_calibrated(&self) -> bool {
        self.threshold != 0
    }

    /// Forget press state (used when calibration restarts).
    pub fn reset(&mut self) {
        self.pressed = false;
        self.raw_active = false;
        self.was_pressed = false;
        self.was_released = false;
    }

    /// Feed one raw sample.  Commits a press/release once the raw
    /// crossing has been stable for `debounce_ms`.
    pub fn sample(&mut self, raw: u16, now_ms: u32, debounce_ms: u32) {
        self.was_pressed = false;
        self.was_released = false;

        let active = self.is_calibrated() && (raw as i32) < self.threshold;
        if active != self.raw_active {
            self.raw_active = active;
            self.last_crossing_ms = now_ms;
        }

        let stable_ms = now_ms.wrapping_sub(self.last_crossing_ms);
        if stable_ms < debounce_ms || self.raw_active == self.pressed {
            return;
        }

        self.pressed = self.raw_active;
        if self.pressed {
            self.press_start_ms = now_ms;
            self.was_pressed = true;
        } else {
            self.was_released = true;
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn is_released(&self) -> bool {
        !self.pressed
    }

    /// Press edge committed on the current tick.
    pub fn was_pressed(&self) -> bool {
        self.was_pressed
    }

    /// Release edge committed on the current tick.
    pub fn was_released(&self) -> bool {
        self.was_released
    }

    /// Continuous press duration (ms), 0 while released.
    pub fn pressed_for(&self, now_ms: u32) -> u32 {
        if self.pressed {
            now_ms.wrapping_sub(self.press_start_ms)
        } else {
            0
        }
    }
}

impl Default for TouchChannel {
    fn default() -> Self {
        Self::new()
    }
}
