//! Composite gesture decoder over two touch channels.

use heapless::Deque;
use log::{debug, info};

use crate::config::TouchConfig;
use crate::gesture::{Channel, GestureEvent, TouchChannel, TouchSensor, LEFT_BIT, RIGHT_BIT};

/// Calibration progress.  Sampling is incremental - one baseline sample
/// per tick at most - so calibration never stalls the scheduler.
#[derive(Debug)]
enum Calibration {
    Idle,
    Sampling {
        taken: u16,
        sum_left: u32,
        sum_right: u32,
        last_sample_ms: Option<u32>,
    },
}

/// Decodes raw capacitive readings into [`GestureEvent`]s.
///
/// Drive with [`tick`](GestureDecoder::tick) at a fixed rate and drain
/// decoded events with [`take_event`](GestureDecoder::take_event).
pub struct GestureDecoder<S> {
    sensor: S,
    cfg: TouchConfig,
    left: TouchChannel,
    right: TouchChannel,

    /// Release edges of ordinary (non-hold) presses, flushed as one
    /// composite tap once both channels rest.
    tap_bits: u8,
    /// Release edges of presses that produced a hold event, flushed as
    /// one composite release.  Kept apart from `tap_bits` so a long
    /// press never doubles as a tap.
    release_bits: u8,

    hold_fired_left: bool,
    hold_fired_right: bool,

    calibration: Calibration,
    events: Deque<GestureEvent, 4>,
}

impl<S: TouchSensor> GestureDecoder<S> {
    pub fn new(sensor: S, cfg: TouchConfig) -> Self {
        Self {
            sensor,
            cfg,
            left: TouchChannel::new(),
            right: TouchChannel::new(),
            tap_bits: 0,
            release_bits: 0,
            hold_fired_left: false,
            hold_fired_right: false,
            calibration: Calibration::Idle,
            events: Deque::new(),
        }
    }

    /// Arm baseline calibration.  Gesture decoding is suppressed until
    /// all samples are in and thresholds are installed.
    pub fn calibrate(&mut self) {
        info!("touch: calibration started");
        self.left.reset();
        self.right.reset();
        self.tap_bits = 0;
        self.release_bits = 0;
        self.hold_fired_left = false;
        self.hold_fired_right = false;
        while self.events.pop_front().is_some() {}
        self.calibration = Calibration::Sampling {
            taken: 0,
            sum_left: 0,
            sum_right: 0,
            last_sample_ms: None,
        };
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self.calibration, Calibration::Sampling { .. })
    }

    /// Both channels have a usable threshold installed.
    pub fn is_calibrated(&self) -> bool {
        self.left.is_calibrated() && self.right.is_calibrated()
    }

    pub fn channel(&self, which: Channel) -> &TouchChannel {
        match which {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }

    /// Advance the decoder by one scheduler tick.
    pub fn tick(&mut self, now_ms: u32) {
        if self.is_calibrating() {
            self.advance_calibration(now_ms);
            return;
        }
        if !self.is_calibrated() {
            // Sentinel thresholds - stay silent until someone calibrates.
            return;
        }

        let raw_left = self.sensor.read_raw(Channel::Left);
        let raw_right = self.sensor.read_raw(Channel::Right);
        self.left.sample(raw_left, now_ms, self.cfg.debounce_ms);
        self.right.sample(raw_right, now_ms, self.cfg.debounce_ms);

        self.route_releases();
        self.detect_holds(now_ms);
        self.flush_when_idle();
    }

    /// Pop the oldest decoded event, if any.
    pub fn take_event(&mut self) -> Option<GestureEvent> {
        self.events.pop_front()
    }

    fn advance_calibration(&mut self, now_ms: u32) {
        let Calibration::Sampling {
            taken,
            sum_left,
            sum_right,
            last_sample_ms,
        } = &mut self.calibration
        else {
            return;
        };

        let samples = self.cfg.calibration_samples.max(1);
        let interval = self.cfg.calibration_time_ms / samples as u32;
        let due = match last_sample_ms {
            None => true,
            Some(t) => now_ms.wrapping_sub(*t) >= interval,
        };
        if !due {
            return;
        }

        *sum_left += self.sensor.read_raw(Channel::Left) as u32;
        *sum_right += self.sensor.read_raw(Channel::Right) as u32;
        *taken += 1;
        *last_sample_ms = Some(now_ms);

        if *taken < samples {
            return;
        }

        let n = samples as u32;
        let mean_left = ((*sum_left + n / 2) / n) as i32;
        let mean_right = ((*sum_right + n / 2) / n) as i32;
        self.left.set_threshold(mean_left, self.cfg.sensitivity_margin);
        self.right
            .set_threshold(mean_right, self.cfg.sensitivity_margin);
        self.calibration = Calibration::Idle;
        info!(
            "touch: calibrated (left {} right {})",
            self.left.threshold(),
            self.right.threshold()
        );
    }

    /// Route this tick's release edges: a press that crossed the hold
    /// delay terminates as a release event, anything shorter is a tap.
    fn route_releases(&mut self) {
        if self.left.was_released() {
            if self.hold_fired_left {
                self.release_bits |= LEFT_BIT;
                self.hold_fired_left = false;
            } else {
                self.tap_bits |= LEFT_BIT;
            }
        }
        if self.right.was_released() {
            if self.hold_fired_right {
                self.release_bits |= RIGHT_BIT;
                self.hold_fired_right = false;
            } else {
                self.tap_bits |= RIGHT_BIT;
            }
        }
    }

    /// Fire a composite hold once a channel stays pressed past the hold
    /// delay.  The event reflects both channels' current state, and all
    /// channels it covers are marked so one overlapping hold gesture
    /// produces exactly one event.
    fn detect_holds(&mut self, now_ms: u32) {
        let left_due = self.left.is_pressed()
            && !self.hold_fired_left
            && self.left.pressed_for(now_ms) >= self.cfg.hold_delay_ms;
        let right_due = self.right.is_pressed()
            && !self.hold_fired_right
            && self.right.pressed_for(now_ms) >= self.cfg.hold_delay_ms;
        if !left_due && !right_due {
            return;
        }

        let event = if self.left.is_pressed() && self.right.is_pressed() {
            self.hold_fired_left = true;
            self.hold_fired_right = true;
            GestureEvent::HoldBoth
        } else if self.left.is_pressed() {
            self.hold_fired_left = true;
            GestureEvent::HoldLeft
        } else {
            self.hold_fired_right = true;
            GestureEvent::HoldRight
        };
        self.push(event);
    }

    /// Flush the accumulators once both channels rest.
    fn flush_when_idle(&mut self) {
        if !(self.left.is_released() && self.right.is_released()) {
            return;
        }
        if self.tap_bits != 0 {
            let event = GestureEvent::tap_from_bits(self.tap_bits);
            self.tap_bits = 0;
            self.push(event);
        }
        if self.release_bits != 0 {
            let event = GestureEvent::release_from_bits(self.release_bits);
            self.release_bits = 0;
            self.push(event);
        }
    }

    fn push(&mut self, event: GestureEvent) {
        debug!("touch: {:?}", event);
        if self.events.push_back(event).is_err() {
            // Queue full - the oldest unconsumed gesture gives way.
            self.events.pop_front();
            let _ = self.events.push_back(event);
        }
    }
}
