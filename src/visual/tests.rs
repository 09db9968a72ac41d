use super::{
    AnimationScheduler, Mode, Pattern, Proximity, Transition, BLACK, GREEN, HOT_PINK, RED, WHITE,
};
use crate::clock::ManualClock;
use crate::config::LED_COUNT;
use crate::visual::waves::dim;

fn scheduler(clock: &ManualClock) -> AnimationScheduler<&ManualClock> {
    AnimationScheduler::new(clock)
}

#[test]
fn starts_in_the_alone_ambient_pattern() {
    let clock = ManualClock::new(0);
    let s = scheduler(&clock);
    assert_eq!(s.mode(), Mode::Animation);
    assert_eq!(s.pattern(), Pattern::Spread);
    assert_eq!(s.proximity(), Proximity::Alone);
}

#[test]
fn next_pattern_wraps_to_off_past_the_ceiling() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(&clock);
    // Alone caps at Spread, which is where we start.
    s.next_pattern();
    assert_eq!(s.pattern(), Pattern::Off);
    s.next_pattern();
    assert_eq!(s.pattern(), Pattern::Cylon);
    s.next_pattern();
    assert_eq!(s.pattern(), Pattern::Spread);
    s.next_pattern();
    assert_eq!(s.pattern(), Pattern::Off);
}

#[test]
fn proximity_unlocks_faster_patterns() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(&clock);
    s.set_proximity(Proximity::Group);
    assert_eq!(s.pattern(), Pattern::MovingRainbow);

    // Even in a group the rainbow-beat pattern sits past the ceiling.
    s.next_pattern();
    assert_eq!(s.pattern(), Pattern::Off);

    s.set_proximity(Proximity::Nearby);
    assert_eq!(s.pattern(), Pattern::Strobe);
    // Unchanged proximity must not restart the pattern cycle.
    s.next_pattern();
    assert_eq!(s.pattern(), Pattern::Off);
    s.set_proximity(Proximity::Nearby);
    assert_eq!(s.pattern(), Pattern::Off);
}

#[test]
fn static_fill_holds_the_frame() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(&clock);
    s.fill_all_with(GREEN);
    assert_eq!(s.mode(), Mode::Static);
    assert_eq!(*s.show(), [GREEN; LED_COUNT]);
    clock.advance(5_000);
    assert_eq!(*s.show(), [GREEN; LED_COUNT]);
}

#[test]
fn turn_off_blacks_out() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(&clock);
    s.fill_all();
    s.turn_off();
    assert_eq!(s.mode(), Mode::Static);
    assert_eq!(*s.show(), [BLACK; LED_COUNT]);
}

#[test]
fn blink_alternates_and_lands_on_target() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(&clock);
    // Two blinks of 200 ms each: off/on half-phases of 100 ms.
    s.blink(200, 2, RED, Transition::Static);

    clock.set(50);
    assert_eq!(*s.show(), [BLACK; LED_COUNT]);
    clock.set(150);
    assert_eq!(*s.show(), [RED; LED_COUNT]);
    clock.set(250);
    assert_eq!(*s.show(), [BLACK; LED_COUNT]);
    clock.set(350);
    assert_eq!(*s.show(), [RED; LED_COUNT]);

    clock.set(401);
    assert_eq!(*s.show(), [BLACK; LED_COUNT]);
    assert_eq!(s.mode(), Mode::Static);
}

#[test]
fn blink_can_return_to_animation() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(&clock);
    s.blink(100, 1, GREEN, Transition::Animation);
    clock.set(101);
    s.show();
    assert_eq!(s.mode(), Mode::Animation);
}

#[test]
fn meter_fills_with_elapsed_time() {
    let clock = ManualClock::new(1_000);
    let mut s = scheduler(&clock);
    // 700 ms meter over 7 LEDs: one more pixel every 100 ms.
    s.meter(1_000, 700);

    let frame = *s.show();
    assert_eq!(frame[0], HOT_PINK);
    assert_eq!(frame[1], BLACK);

    clock.set(1_350);
    let frame = *s.show();
    assert_eq!(frame[3], HOT_PINK);
    assert_eq!(frame[4], BLACK);

    clock.set(1_750);
    assert_eq!(*s.show(), [HOT_PINK; LED_COUNT]);
}

#[test]
fn meter_uses_the_shared_start_time() {
    // A badge joining late renders the same meter position because the
    // start time came over the wire.
    let clock = ManualClock::new(1_350);
    let mut s = scheduler(&clock);
    s.meter(1_000, 700);
    let frame = *s.show();
    assert_eq!(frame[3], HOT_PINK);
    assert_eq!(frame[4], BLACK);
}

#[test]
fn seconds_pattern_counts_wall_seconds() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(&clock);
    s.start_pattern(Pattern::Seconds);

    let lit = |frame: &[smart_leds::RGB8; LED_COUNT]| {
        frame.iter().filter(|l| **l != BLACK).count()
    };

    assert_eq!(lit(s.show()), 1);
    clock.set(3_500);
    assert_eq!(lit(s.show()), 4);
    clock.set(7_000);
    assert_eq!(lit(s.show()), 1); // wrapped around the strip
}

#[test]
fn strobe_flashes_at_the_top_of_the_beat() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(&clock);
    s.start_pattern(Pattern::Strobe);

    // Default beat is 1000 ms; the flash occupies the last ~2%.
    clock.set(985);
    assert_eq!(*s.show(), [WHITE; LED_COUNT]);

    // Away from the flash the frame decays instead.
    clock.set(1_100);
    let frame = *s.show();
    assert_ne!(frame, [WHITE; LED_COUNT]);
    assert_ne!(frame, [BLACK; LED_COUNT]); // still fading
}

#[test]
fn spread_breathes_from_the_center() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(&clock);
    s.start_pattern(Pattern::Spread);

    // Quarter beat = sine peak: the whole strip is filled.
    clock.set(250);
    assert_eq!(*s.show(), [WHITE; LED_COUNT]);

    // At the zero crossing only the middle three pixels are lit.
    clock.set(1_000);
    let frame = *s.show();
    assert_eq!(frame[1], BLACK);
    assert_eq!(frame[3], WHITE);
    assert_eq!(frame[5], BLACK);
}

#[test]
fn cylon_sweeps_two_dots() {
    let clock = ManualClock::new(250);
    let mut s = scheduler(&clock);
    s.start_pattern(Pattern::Cylon);

    let frame = *s.show();
    assert_eq!(frame[5], WHITE); // trailing dot, full color
    assert_eq!(frame[6], dim(WHITE, 64)); // leading dot, dimmed
    assert_eq!(frame[0], BLACK);
}

#[test]
fn glitter_sparkles_at_most_one_pixel() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(&clock);
    s.start_pattern(Pattern::Glitter);
    for t in 0..200u32 {
        clock.set(t * 5);
        let lit = s.show().iter().filter(|l| **l != BLACK).count();
        assert!(lit <= 1);
    }
}

#[test]
fn rainbow_spreads_hues_across_the_strip() {
    let clock = ManualClock::new(123);
    let mut s = scheduler(&clock);
    s.start_pattern(Pattern::MovingRainbow);
    let frame = *s.show();
    assert_ne!(frame[0], BLACK);
    assert_ne!(frame[0], frame[3]);
}

#[test]
fn beat_length_changes_animation_speed() {
    let clock = ManualClock::new(0);
    let mut s = scheduler(&clock);
    s.tempo_mut().set_beat_length(500);
    s.start_pattern(Pattern::Strobe);

    // With a 500 ms beat the flash lands near 495 ms instead of 985.
    clock.set(495);
    assert_eq!(*s.show(), [WHITE; LED_COUNT]);
}
