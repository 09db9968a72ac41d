//! Host-testable core of the meshbadge firmware.
//!
//! Everything behavioral lives here as pure `no_std` logic: capacitive
//! gesture decoding, per-peer encounter coordination, tempo sync, the
//! LED animation scheduler, and the wire codec.  The embedded binary
//! (`main.rs`, behind the `embedded` feature) only adapts hardware -
//! touch controller, WS2812 strip, radio - to these modules.
//!
//! Usage: `cargo test` runs the whole suite on the host; no embedded
//! toolchain required.

#![cfg_attr(not(test), no_std)]

pub mod badge;
pub mod clock;
pub mod config;
pub mod encounter;
pub mod error;
pub mod gesture;
pub mod protocol;
pub mod tempo;
pub mod visual;

pub use badge::Badge;
pub use clock::{Clock, ManualClock};
pub use encounter::{EncounterCoordinator, EncounterState, EncounterStatus};
pub use error::{DecodeError, Error};
pub use gesture::{GestureDecoder, GestureEvent, TouchSensor};
pub use protocol::Message;
pub use tempo::TempoSync;
pub use visual::AnimationScheduler;
