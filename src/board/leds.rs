//! WS2812 strip driven over SPIM.
//!
//! Classic 3x oversampling trick: the SPIM runs at 4 MHz and every
//! WS2812 bit becomes three SPI bits (`110` for 1, `100` for 0), which
//! lands inside the timing tolerances of the strip.

use embassy_nrf::spim::{Instance, Spim};
use meshbadge::config::LED_COUNT;
use meshbadge::visual::waves::dim;
use smart_leds::RGB8;

/// 24 color bits per LED, 3 SPI bits each, packed into bytes.
const FRAME_BYTES: usize = LED_COUNT * 9;

/// Trailing zero bytes holding the line low for the latch interval.
const LATCH_BYTES: usize = 60;

pub struct LedStrip<'d, T: Instance> {
    spim: Spim<'d, T>,
    buf: [u8; FRAME_BYTES + LATCH_BYTES],
}

impl<'d, T: Instance> LedStrip<'d, T> {
    pub fn new(spim: Spim<'d, T>) -> Self {
        Self {
            spim,
            buf: [0; FRAME_BYTES + LATCH_BYTES],
        }
    }

    /// Push one frame, scaled by the scheduler's brightness ceiling.
    pub async fn write(&mut self, frame: &[RGB8; LED_COUNT], brightness: u8) {
        let mut at = 0;
        for led in frame {
            let led = dim(*led, brightness);
            // WS2812 wants GRB order.
            for byte in [led.g, led.r, led.b] {
                at = encode_byte(&mut self.buf, at, byte);
            }
        }
        self.buf[at..].fill(0);
        let _ = self.spim.write(&self.buf).await;
    }
}

/// Expand one color byte into nine SPI bytes starting at `at`; returns
/// the next write position.
fn encode_byte(buf: &mut [u8], mut at: usize, byte: u8) -> usize {
    let mut acc: u32 = 0;
    let mut bits = 0;
    for bit in (0..8).rev() {
        let pattern = if byte & (1 << bit) != 0 { 0b110 } else { 0b100 };
        acc = (acc << 3) | pattern;
        bits += 3;
        while bits >= 8 {
            bits -= 8;
            buf[at] = (acc >> bits) as u8;
            at += 1;
        }
    }
    at
}
