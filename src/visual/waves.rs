//! Beat-phased wave generators.
//!
//! Small integer helpers in the spirit of FastLED's lib8tion, driven by
//! an explicit timestamp and beat length instead of a global millis
//! timer - every badge fed the mesh-synchronized clock computes
//! identical wave positions.

use smart_leds::RGB8;

/// Sawtooth phase within the current beat, 0..=255.
pub fn beat8(now_ms: u32, beat_ms: u32) -> u8 {
    let beat = beat_ms.max(1);
    ((now_ms % beat) * 256 / beat) as u8
}

/// Triangle approximation of a sine wave: 128 at phase 0, peak 254
/// around phase 64, trough 0 at phase 192.
pub fn sin8(theta: u8) -> u8 {
    let t = theta.wrapping_add(64);
    if t < 128 {
        (t as u16 * 2) as u8
    } else {
        ((255 - t as u16) * 2) as u8
    }
}

/// Scale `i` by `scale`/256.
pub fn scale8(i: u8, scale: u8) -> u8 {
    ((i as u16 * (scale as u16 + 1)) >> 8) as u8
}

/// Sine oscillation between `lo` and `hi` once per beat, with an
/// optional phase offset in 1/256ths of a beat.
pub fn beatsin8(now_ms: u32, beat_ms: u32, lo: u8, hi: u8, phase8: u8) -> u8 {
    let wave = sin8(beat8(now_ms, beat_ms).wrapping_add(phase8));
    lo + scale8(wave, hi - lo)
}

/// Dim every pixel toward black by `amount`/256.
pub fn fade_to_black_by(leds: &mut [RGB8], amount: u8) {
    let keep = 255 - amount;
    for led in leds {
        led.r = scale8(led.r, keep);
        led.g = scale8(led.g, keep);
        led.b = scale8(led.b, keep);
    }
}

/// Scale a color by `scale`/256.
pub fn dim(color: RGB8, scale: u8) -> RGB8 {
    RGB8 {
        r: scale8(color.r, scale),
        g: scale8(color.g, scale),
        b: scale8(color.b, scale),
    }
}

/// Minimal 16-bit LCG for glitter sparkles.
pub struct Prng(u16);

impl Prng {
    pub const fn new(seed: u16) -> Self {
        Self(seed)
    }

    pub fn next16(&mut self) -> u16 {
        self.0 = self.0.wrapping_mul(2053).wrapping_add(13849);
        self.0
    }

    pub fn next8(&mut self) -> u8 {
        (self.next16() >> 8) as u8
    }

    /// Uniform-ish value in `0..n`.
    pub fn below(&mut self, n: u16) -> u16 {
        self.next16() % n.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beat8_sweeps_the_beat() {
        assert_eq!(beat8(0, 1000), 0);
        assert_eq!(beat8(500, 1000), 128);
        assert_eq!(beat8(999, 1000), 255);
        assert_eq!(beat8(1000, 1000), 0); // wraps at the boundary
    }

    #[test]
    fn sin8_landmarks() {
        assert_eq!(sin8(0), 128);
        assert_eq!(sin8(64), 254);
        assert_eq!(sin8(192), 0);
        // Symmetric halves around the midline.
        assert!(sin8(32) > 128);
        assert!(sin8(160) < 128);
    }

    #[test]
    fn scale8_bounds() {
        assert_eq!(scale8(255, 255), 255);
        assert_eq!(scale8(255, 0), 0);
        assert_eq!(scale8(0, 255), 0);
        assert_eq!(scale8(128, 128), 64);
    }

    #[test]
    fn beatsin8_stays_in_range() {
        for now in (0..2000).step_by(37) {
            let v = beatsin8(now, 600, 10, 20, 0);
            assert!((10..=20).contains(&v));
        }
    }

    #[test]
    fn fade_reaches_black() {
        let mut leds = [RGB8 { r: 200, g: 100, b: 50 }; 3];
        fade_to_black_by(&mut leds, 255);
        assert!(leds.iter().all(|l| (l.r, l.g, l.b) == (0, 0, 0)));
    }

    #[test]
    fn fade_partial_dims() {
        let mut leds = [RGB8 { r: 128, g: 128, b: 128 }];
        fade_to_black_by(&mut leds, 128);
        assert_eq!(leds[0].r, 64);
    }

    #[test]
    fn prng_below_is_bounded() {
        let mut rng = Prng::new(1);
        for _ in 0..100 {
            assert!(rng.below(7) < 7);
        }
    }
}
