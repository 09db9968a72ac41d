use core::cell::{Cell, RefCell};

use super::{Channel, GestureDecoder, GestureEvent, TouchSensor};
use crate::config::TouchConfig;

/// Fake capacitive pad pair.  Raw levels are set directly by the test;
/// an optional script overrides the left channel one reading at a time
/// (used for calibration sequences).
struct FakePad {
    left: Cell<u16>,
    right: Cell<u16>,
    left_script: RefCell<Vec<u16>>,
}

impl FakePad {
    fn idle() -> Self {
        Self {
            left: Cell::new(100),
            right: Cell::new(100),
            left_script: RefCell::new(Vec::new()),
        }
    }

    fn script_left(&self, samples: &[u16]) {
        *self.left_script.borrow_mut() = samples.to_vec();
    }
}

impl TouchSensor for &FakePad {
    fn read_raw(&mut self, channel: Channel) -> u16 {
        match channel {
            Channel::Left => {
                let mut script = self.left_script.borrow_mut();
                if script.is_empty() {
                    self.left.get()
                } else {
                    script.remove(0)
                }
            }
            Channel::Right => self.right.get(),
        }
    }
}

const CFG: TouchConfig = TouchConfig {
    debounce_ms: 20,
    hold_delay_ms: 300,
    calibration_time_ms: 100,
    calibration_samples: 5,
    sensitivity_margin: 12,
};

/// Decoder calibrated against a flat 100-unit baseline (threshold 88).
fn calibrated(pad: &FakePad) -> GestureDecoder<&FakePad> {
    let mut dec = GestureDecoder::new(pad, CFG);
    dec.calibrate();
    for t in (0..=80).step_by(10) {
        dec.tick(t);
    }
    assert!(dec.is_calibrated());
    dec
}

/// Run ticks every 10 ms over `from..=to`, collecting decoded events.
fn run(
    dec: &mut GestureDecoder<&FakePad>,
    from: u32,
    to: u32,
    events: &mut Vec<GestureEvent>,
) {
    let mut t = from;
    while t <= to {
        dec.tick(t);
        while let Some(e) = dec.take_event() {
            events.push(e);
        }
        t += 10;
    }
}

// Calibration

#[test]
fn calibration_installs_mean_minus_margin() {
    let pad = FakePad::idle();
    pad.script_left(&[100, 102, 98, 104, 96]);
    let dec = calibrated(&pad);
    // round(mean of samples) - margin = 100 - 12
    assert_eq!(dec.channel(Channel::Left).threshold(), 88);
    assert_eq!(dec.channel(Channel::Left).baseline(), 100);
    assert_eq!(dec.channel(Channel::Right).threshold(), 88);
}

#[test]
fn calibration_is_incremental() {
    let pad = FakePad::idle();
    let mut dec = GestureDecoder::new(&pad, CFG);
    dec.calibrate();
    // One tick takes at most one sample; after a single tick the
    // decoder is still calibrating.
    dec.tick(0);
    assert!(dec.is_calibrating());
    assert!(!dec.is_calibrated());
}

#[test]
fn uncalibrated_decoder_never_registers_presses() {
    let pad = FakePad::idle();
    let mut dec = GestureDecoder::new(&pad, CFG);
    pad.left.set(10); // far below any plausible threshold
    let mut events = Vec::new();
    run(&mut dec, 0, 500, &mut events);
    assert!(events.is_empty());
    assert!(!dec.channel(Channel::Left).is_pressed());
}

#[test]
fn gestures_suppressed_while_calibrating() {
    let pad = FakePad::idle();
    let mut dec = GestureDecoder::new(&pad, CFG);
    dec.calibrate();
    pad.left.set(10);
    let mut events = Vec::new();
    run(&mut dec, 0, 40, &mut events);
    assert!(events.is_empty());
}

// Taps

#[test]
fn single_left_tap() {
    let pad = FakePad::idle();
    let mut dec = calibrated(&pad);
    let mut events = Vec::new();

    pad.left.set(50);
    run(&mut dec, 100, 150, &mut events);
    pad.left.set(100);
    run(&mut dec, 160, 220, &mut events);

    assert_eq!(events, vec![GestureEvent::TapLeft]);
}

#[test]
fn staggered_release_yields_single_tap_both() {
    let pad = FakePad::idle();
    let mut dec = calibrated(&pad);
    let mut events = Vec::new();

    // Both pads down.
    pad.left.set(50);
    pad.right.set(50);
    run(&mut dec, 100, 160, &mut events);

    // Left lifts first; right is still down so nothing may flush yet.
    pad.left.set(100);
    run(&mut dec, 170, 220, &mut events);
    assert!(events.is_empty());

    // Right lifts 60 ms later - exactly one composite event.
    pad.right.set(100);
    run(&mut dec, 230, 300, &mut events);
    assert_eq!(events, vec![GestureEvent::TapBoth]);
}

#[test]
fn two_sequential_taps_stay_separate() {
    let pad = FakePad::idle();
    let mut dec = calibrated(&pad);
    let mut events = Vec::new();

    pad.left.set(50);
    run(&mut dec, 100, 150, &mut events);
    pad.left.set(100);
    run(&mut dec, 160, 220, &mut events);

    pad.right.set(50);
    run(&mut dec, 300, 350, &mut events);
    pad.right.set(100);
    run(&mut dec, 360, 420, &mut events);

    assert_eq!(events, vec![GestureEvent::TapLeft, GestureEvent::TapRight]);
}

#[test]
fn debounce_rejects_transient_noise() {
    let pad = FakePad::idle();
    let mut dec = calibrated(&pad);
    let mut events = Vec::new();

    // A single 10 ms dip is shorter than the 20 ms debounce window.
    pad.left.set(50);
    dec.tick(100);
    pad.left.set(100);
    run(&mut dec, 110, 200, &mut events);

    assert!(events.is_empty());
    assert!(!dec.channel(Channel::Left).is_pressed());
}

// Holds

#[test]
fn hold_left_fires_exactly_once() {
    let pad = FakePad::idle();
    let mut dec = calibrated(&pad);
    let mut events = Vec::new();

    pad.left.set(50);
    run(&mut dec, 100, 500, &mut events);
    assert_eq!(events, vec![GestureEvent::HoldLeft]);
}

#[test]
fn hold_release_is_not_a_tap() {
    let pad = FakePad::idle();
    let mut dec = calibrated(&pad);
    let mut events = Vec::new();

    pad.left.set(50);
    run(&mut dec, 100, 500, &mut events);
    pad.left.set(100);
    run(&mut dec, 510, 580, &mut events);

    assert_eq!(
        events,
        vec![GestureEvent::HoldLeft, GestureEvent::ReleaseLeft]
    );
}

#[test]
fn hold_both_fires_once_and_releases_once() {
    let pad = FakePad::idle();
    let mut dec = calibrated(&pad);
    let mut events = Vec::new();

    pad.left.set(50);
    pad.right.set(50);
    run(&mut dec, 100, 500, &mut events);
    assert_eq!(events, vec![GestureEvent::HoldBoth]);

    events.clear();
    pad.left.set(100);
    pad.right.set(100);
    run(&mut dec, 510, 600, &mut events);
    assert_eq!(events, vec![GestureEvent::ReleaseBoth]);
}

#[test]
fn hold_does_not_consume_pending_tap_bits() {
    let pad = FakePad::idle();
    let mut dec = calibrated(&pad);
    let mut events = Vec::new();

    // Right taps (down, up) while left is held down the whole time:
    // the right release may not flush while left is pressed, and the
    // left hold must fire independently of the pending tap bit.
    pad.left.set(50);
    run(&mut dec, 100, 160, &mut events);
    pad.right.set(50);
    run(&mut dec, 170, 200, &mut events);
    pad.right.set(100);
    run(&mut dec, 210, 500, &mut events);
    assert_eq!(events, vec![GestureEvent::HoldLeft]);

    // Left lifts: the hold resolves to a release, and the pending
    // right tap flushes as its own event.
    events.clear();
    pad.left.set(100);
    run(&mut dec, 510, 600, &mut events);
    assert_eq!(
        events,
        vec![GestureEvent::TapRight, GestureEvent::ReleaseLeft]
    );
}

#[test]
fn tap_then_hold_same_channel() {
    let pad = FakePad::idle();
    let mut dec = calibrated(&pad);
    let mut events = Vec::new();

    pad.left.set(50);
    run(&mut dec, 100, 150, &mut events);
    pad.left.set(100);
    run(&mut dec, 160, 220, &mut events);

    pad.left.set(50);
    run(&mut dec, 300, 700, &mut events);

    assert_eq!(events, vec![GestureEvent::TapLeft, GestureEvent::HoldLeft]);
}
