//! Hardware adapters for the nRF52840 badge board.
//!
//! Nothing in here is design-bearing: each module adapts one peripheral
//! to the traits the core library consumes.
//!
//! ## Components
//!
//! - **clock**: uptime and mesh-adjusted [`meshbadge::clock::Clock`] sources
//! - **touch**: I²C capacitive-touch controller -> `TouchSensor`
//! - **leds**: WS2812 strip over SPIM
//! - **radio**: BLE-advertising transport for protocol frames

pub mod clock;
pub mod leds;
pub mod radio;
pub mod touch;
