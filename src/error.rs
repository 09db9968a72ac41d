//! Unified error type for meshbadge.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` behind the `defmt` feature for efficient
//! on-target logging.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Protocol
    /// A wire frame could not be decoded.
    Decode(DecodeError),

    /// The outgoing message queue is full; the message was dropped.
    OutboxFull,

    // Encounters
    /// The peer table is at capacity and no record could be evicted.
    PeerTableFull,

    /// No encounter record exists for the addressed peer.
    UnknownPeer,

    // Touch
    /// Gesture decoding was requested before calibration finished.
    NotCalibrated,

    // Radio / LEDs (embedded glue)
    /// The radio rejected or lost a frame.
    Radio,

    /// The LED strip write failed.
    LedStrip,
}

/// Reasons a received wire frame is dropped by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Frame shorter than the fixed layout of its kind.
    Truncated,
    /// First byte is not a known package kind.
    UnknownKind(u8),
    /// Exchange progress byte outside {Start, Complete}.
    BadProgress(u8),
}

// Convenience conversions

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}
