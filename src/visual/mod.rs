//! Tempo-synchronized LED status visualisation.
//!
//! Renders one of a fixed set of patterns into a frame buffer as a pure
//! function of elapsed time and the shared beat phase.  Aside from the
//! fade-decay buffers, no frame depends on the previous one, so the
//! renderer can be ticked at any rate.  The clock is injected at
//! construction; with the mesh-synchronized clock all badges animate in
//! phase.

pub mod waves;

#[cfg(test)]
mod tests;

use smart_leds::hsv::{hsv2rgb, Hsv};
use smart_leds::RGB8;

use crate::clock::Clock;
use crate::config::{LED_COUNT, MAX_BRIGHTNESS};
use crate::tempo::TempoSync;
use self::waves::{beat8, beatsin8, dim, fade_to_black_by, Prng};

pub const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };
pub const WHITE: RGB8 = RGB8 { r: 255, g: 255, b: 255 };
pub const HOT_PINK: RGB8 = RGB8 { r: 255, g: 105, b: 180 };
pub const GREEN: RGB8 = RGB8 { r: 0, g: 255, b: 0 };
pub const RED: RGB8 = RGB8 { r: 255, g: 0, b: 0 };

/// Time-driven patterns, ordered from low-energy to full rainbow.  The
/// order matters: proximity sets the highest reachable pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pattern {
    Off,
    Cylon,
    Spread,
    Glitter,
    Strobe,
    Seconds,
    MovingRainbow,
    RainbowBeat,
}

impl Pattern {
    fn next(self) -> Self {
        match self {
            Pattern::Off => Pattern::Cylon,
            Pattern::Cylon => Pattern::Spread,
            Pattern::Spread => Pattern::Glitter,
            Pattern::Glitter => Pattern::Strobe,
            Pattern::Strobe => Pattern::Seconds,
            Pattern::Seconds => Pattern::MovingRainbow,
            Pattern::MovingRainbow => Pattern::RainbowBeat,
            Pattern::RainbowBeat => Pattern::Off,
        }
    }
}

/// How many badges are estimated to be around.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Proximity {
    Alone,
    Nearby,
    Group,
}

impl Proximity {
    /// Highest pattern unlocked at this proximity.
    fn max_pattern(self) -> Pattern {
        match self {
            Proximity::Alone => Pattern::Spread,
            Proximity::Nearby => Pattern::Strobe,
            Proximity::Group => Pattern::MovingRainbow,
        }
    }
}

/// Where a finished blink lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    Static,
    Animation,
}

/// Top-level renderer mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Buffer holds whatever was last filled in.
    Static,
    /// The current [`Pattern`] renders each frame.
    Animation,
    /// Progress bar from an externally supplied start and duration.
    Meter {
        start_ms: u32,
        duration_ms: u32,
        color: RGB8,
    },
    /// Timed on/off cycling, then a transition to `target`.
    Blinking {
        start_ms: u32,
        half_phase_ms: u32,
        half_cycles: u8,
        color: RGB8,
        target: Transition,
    },
}

/// The badge's LED state machine.
pub struct AnimationScheduler<C> {
    tempo: TempoSync<C>,
    leds: [RGB8; LED_COUNT],
    mode: Mode,
    pattern: Pattern,
    max_pattern: Pattern,
    proximity: Proximity,
    default_color: RGB8,
    animation_color: RGB8,
    max_brightness: u8,
    prng: Prng,
}

impl<C: Clock> AnimationScheduler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            tempo: TempoSync::new(clock),
            leds: [BLACK; LED_COUNT],
            mode: Mode::Animation,
            pattern: Pattern::Spread,
            max_pattern: Proximity::Alone.max_pattern(),
            proximity: Proximity::Alone,
            default_color: WHITE,
            animation_color: WHITE,
            max_brightness: MAX_BRIGHTNESS,
            prng: Prng::new(0x4d42),
        }
    }

    pub fn tempo(&self) -> &TempoSync<C> {
        &self.tempo
    }

    pub fn tempo_mut(&mut self) -> &mut TempoSync<C> {
        &mut self.tempo
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    pub fn proximity(&self) -> Proximity {
        self.proximity
    }

    /// Brightness ceiling for the strip driver.
    pub fn max_brightness(&self) -> u8 {
        self.max_brightness
    }

    pub fn set_default_color(&mut self, color: RGB8) {
        self.default_color = color;
    }

    /// Black out and park in `Static`.
    pub fn turn_off(&mut self) {
        self.mode = Mode::Static;
        self.leds = [BLACK; LED_COUNT];
    }

    /// Solid frame of the default color.
    pub fn fill_all(&mut self) {
        self.fill_all_with(self.default_color);
    }

    /// Solid frame of an explicit color.
    pub fn fill_all_with(&mut self, color: RGB8) {
        self.mode = Mode::Static;
        self.leds = [color; LED_COUNT];
    }

    /// Timed on/off cycling for `iterations` blinks of `phase_ms` each,
    /// then a transition to `target`.
    pub fn blink(&mut self, phase_ms: u32, iterations: u8, color: RGB8, target: Transition) {
        self.mode = Mode::Blinking {
            start_ms: self.tempo.clock().now_ms(),
            half_phase_ms: (phase_ms / 2).max(1),
            half_cycles: iterations.saturating_mul(2),
            color,
            target,
        };
    }

    /// Progress bar from `start_ms` (shared exchange start time) over
    /// `duration_ms`, in the default meter color.
    pub fn meter(&mut self, start_ms: u32, duration_ms: u32) {
        self.meter_with(start_ms, duration_ms, HOT_PINK);
    }

    pub fn meter_with(&mut self, start_ms: u32, duration_ms: u32, color: RGB8) {
        self.mode = Mode::Meter {
            start_ms,
            duration_ms,
            color,
        };
    }

    /// Start an explicit pattern.
    pub fn start_pattern(&mut self, pattern: Pattern) {
        self.pattern = pattern;
        self.mode = Mode::Animation;
        self.animation_color = self.default_color;
        if pattern == Pattern::Off {
            self.leds = [BLACK; LED_COUNT];
        }
    }

    /// Cycle within the proximity-allowed range, wrapping to `Off` past
    /// the ceiling.
    pub fn next_pattern(&mut self) {
        let next = self.pattern.next();
        let next = if next > self.max_pattern {
            Pattern::Off
        } else {
            next
        };
        self.start_pattern(next);
    }

    /// More badges around unlock faster patterns; the ceiling pattern
    /// starts immediately on a change.
    pub fn set_proximity(&mut self, proximity: Proximity) {
        if proximity == self.proximity {
            return;
        }
        self.proximity = proximity;
        self.max_pattern = proximity.max_pattern();
        self.start_pattern(self.max_pattern);
    }

    /// Render the current frame.  Pure in elapsed time and beat phase,
    /// aside from fade decay carried in the buffer.
    pub fn show(&mut self) -> &[RGB8; LED_COUNT] {
        let now = self.tempo.clock().now_ms();
        match self.mode {
            Mode::Static => {}
            Mode::Animation => self.render_pattern(now),
            Mode::Meter {
                start_ms,
                duration_ms,
                color,
            } => self.render_meter(now, start_ms, duration_ms, color),
            Mode::Blinking {
                start_ms,
                half_phase_ms,
                half_cycles,
                color,
                target,
            } => {
                let elapsed = now.wrapping_sub(start_ms);
                if elapsed > half_phase_ms * half_cycles as u32 {
                    self.leds = [BLACK; LED_COUNT];
                    self.mode = match target {
                        Transition::Static => Mode::Static,
                        Transition::Animation => Mode::Animation,
                    };
                } else if (elapsed / half_phase_ms) % 2 == 1 {
                    self.leds = [color; LED_COUNT];
                } else {
                    self.leds = [BLACK; LED_COUNT];
                }
            }
        }
        &self.leds
    }

    fn render_meter(&mut self, now: u32, start_ms: u32, duration_ms: u32, color: RGB8) {
        let elapsed = now.wrapping_sub(start_ms);
        let lit = if duration_ms == 0 {
            LED_COUNT
        } else {
            let step = (duration_ms as usize / LED_COUNT).max(1);
            (elapsed as usize / step + 1).min(LED_COUNT)
        };
        for (i, led) in self.leds.iter_mut().enumerate() {
            *led = if i < lit { color } else { BLACK };
        }
    }

    fn render_pattern(&mut self, now: u32) {
        let beat = self.tempo.beat_length_ms();
        // Patterns run off the tempo's epoch-anchored clock so they
        // stay phase-locked to the tapped (or broadcast) beat.
        let t = self.tempo.elapsed_ms();
        let color = self.animation_color;
        let n = LED_COUNT as u8;
        match self.pattern {
            Pattern::Off => {
                self.leds = [BLACK; LED_COUNT];
            }
            Pattern::Cylon => {
                // Two sweeping dots, one dimmed and slightly behind.
                fade_to_black_by(&mut self.leds, 255);
                let lead = beatsin8(t, beat, 0, n - 1, 0) as usize;
                self.leds[lead] = dim(color, 64);
                let trail = beatsin8(t, beat, 0, n - 1, 20) as usize;
                self.leds[trail] = color;
            }
            Pattern::Spread => {
                // Fill outward from the center and back, once per beat.
                fade_to_black_by(&mut self.leds, 255);
                let center = LED_COUNT / 2;
                let spread = beatsin8(t, beat, 0, (center + 1) as u8, 0) as usize;
                if spread > 0 {
                    let first = center - (spread - 1);
                    let count = spread * 2 - 1;
                    for led in self.leds.iter_mut().skip(first).take(count) {
                        *led = color;
                    }
                }
            }
            Pattern::Glitter => {
                self.leds = [BLACK; LED_COUNT];
                if self.prng.next8() < 10 {
                    let sparkle = self.prng.below(LED_COUNT as u16) as usize;
                    self.leds[sparkle] = color;
                }
            }
            Pattern::Strobe => {
                if self.tempo.beat_progress() >= 0.98 {
                    self.leds = [color; LED_COUNT];
                } else {
                    fade_to_black_by(&mut self.leds, 16);
                }
            }
            Pattern::Seconds => {
                let lit = (now / 1000) as usize % LED_COUNT + 1;
                for (i, led) in self.leds.iter_mut().enumerate() {
                    *led = if i < lit { color } else { BLACK };
                }
            }
            Pattern::MovingRainbow => {
                let start_hue = beat8(t, beat);
                self.fill_rainbow(start_hue, (85 / LED_COUNT) as u8);
            }
            Pattern::RainbowBeat => {
                // Hue drifts over two beats for a slower sweep.
                let start_hue = beatsin8(t, beat.saturating_mul(2), 0, 255, 0);
                self.fill_rainbow(start_hue, 12);
            }
        }
    }

    fn fill_rainbow(&mut self, start_hue: u8, hue_delta: u8) {
        for (i, led) in self.leds.iter_mut().enumerate() {
            let hue = start_hue.wrapping_add(hue_delta.wrapping_mul(i as u8));
            *led = hsv2rgb(Hsv {
                hue,
                sat: 255,
                val: 255,
            });
        }
    }
}
