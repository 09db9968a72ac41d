//! I²C capacitive-touch controller (CAP1203 class).
//!
//! The badge's two pads hang off a three-channel capacitance-to-digital
//! controller; we read the per-channel delta counts directly and let
//! the core's own calibration and debouncing do the rest.

use defmt::warn;
use embassy_nrf::twim::{Instance, Twim};
use meshbadge::gesture::{Channel, TouchSensor};

/// 7-bit I²C address of the controller.
const ADDR: u8 = 0x28;

/// Delta-count registers for sensor inputs 1 and 2.
const REG_DELTA_CH1: u8 = 0x10;
const REG_DELTA_CH2: u8 = 0x11;

/// Raw level reported while the bus is unreadable; sits far above any
/// calibrated threshold so a broken sensor never registers presses.
const FAILSAFE_RAW: u16 = 0x7FFF;

/// Untouched midpoint of the folded reading.
const REST_LEVEL: u16 = 0x80;

pub struct TouchController<'d, T: Instance> {
    i2c: Twim<'d, T>,
}

impl<'d, T: Instance> TouchController<'d, T> {
    pub fn new(i2c: Twim<'d, T>) -> Self {
        Self { i2c }
    }

    fn read_delta(&mut self, reg: u8) -> Option<i8> {
        let mut value = [0u8; 1];
        match self.i2c.blocking_write_read(ADDR, &[reg], &mut value) {
            Ok(()) => Some(value[0] as i8),
            Err(e) => {
                warn!("touch controller read failed: {:?}", e);
                None
            }
        }
    }
}

impl<'d, T: Instance> TouchSensor for TouchController<'d, T> {
    fn read_raw(&mut self, channel: Channel) -> u16 {
        let reg = match channel {
            Channel::Left => REG_DELTA_CH1,
            Channel::Right => REG_DELTA_CH2,
        };
        match self.read_delta(reg) {
            // The controller reports a rising delta on touch; the core
            // calibrates against a falling raw level, so fold the delta
            // down from the rest midpoint.
            Some(delta) => REST_LEVEL.saturating_sub(delta.max(0) as u16),
            None => FAILSAFE_RAW,
        }
    }
}
