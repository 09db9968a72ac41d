//! Wire protocol between badges.
//!
//! Four package kinds travel over the mesh, identified by their first
//! byte.  All multi-byte fields are little-endian.
//!
//! ```text
//! Invitation (broadcast):      [31][from:4]
//! Exchange   (point-to-point): [32][from:4][dest:4][picture:2][progress:1][starttime:4]
//! Abort      (point-to-point): [33][from:4][dest:4]
//! Beat       (broadcast):      [40][from:4][beat_length:4]
//! ```
//!
//! The codec is stateless: decoding returns a typed [`Message`] or a
//! [`DecodeError`] the caller drops and logs - a malformed frame must
//! never take down a peer's state machine.

use crate::error::DecodeError;

/// Stable network identifier of a badge.
pub type NodeId = u32;

/// Identifier of a picture token.
pub type PictureId = u16;

/// Package kind byte for [`Invitation`].
pub const INVITATION_KIND: u8 = 31;
/// Package kind byte for [`Exchange`].
pub const EXCHANGE_KIND: u8 = 32;
/// Package kind byte for [`Abort`].
pub const ABORT_KIND: u8 = 33;
/// Package kind byte for [`Beat`].
pub const BEAT_KIND: u8 = 40;

/// Largest encoded frame (an [`Exchange`]).
pub const MAX_FRAME_LEN: usize = 16;

const INVITATION_LEN: usize = 5;
const EXCHANGE_LEN: usize = 16;
const ABORT_LEN: usize = 9;
const BEAT_LEN: usize = 9;

/// Exchange progress marker carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    Start = 0,
    Complete = 1,
}

impl Progress {
    fn from_byte(b: u8) -> Result<Self, DecodeError> {
        match b {
            0 => Ok(Progress::Start),
            1 => Ok(Progress::Complete),
            other => Err(DecodeError::BadProgress(other)),
        }
    }
}

/// Broadcast inviting nearby badges to start an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Invitation {
    pub from: NodeId,
}

/// One step of a picture exchange with a specific peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Exchange {
    pub from: NodeId,
    pub dest: NodeId,
    pub picture: PictureId,
    pub progress: Progress,
    /// Exchange start time on the initiator's clock; shared so both
    /// badges render the same progress meter.
    pub starttime: u32,
}

/// Best-effort notice that an exchange was cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Abort {
    pub from: NodeId,
    pub dest: NodeId,
}

/// Broadcast of the sender's current animation beat length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Beat {
    pub from: NodeId,
    pub beat_length_ms: u32,
}

/// Any decoded wire package.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    Invitation(Invitation),
    Exchange(Exchange),
    Abort(Abort),
    Beat(Beat),
}

impl Message {
    /// Decode one frame.  The first byte selects the package kind.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let (&kind, payload) = data.split_first().ok_or(DecodeError::Truncated)?;
        match kind {
            INVITATION_KIND => {
                let from = read_u32(payload, 0)?;
                Ok(Message::Invitation(Invitation { from }))
            }
            EXCHANGE_KIND => {
                let from = read_u32(payload, 0)?;
                let dest = read_u32(payload, 4)?;
                let picture = read_u16(payload, 8)?;
                let progress = Progress::from_byte(read_u8(payload, 10)?)?;
                let starttime = read_u32(payload, 11)?;
                Ok(Message::Exchange(Exchange {
                    from,
                    dest,
                    picture,
                    progress,
                    starttime,
                }))
            }
            ABORT_KIND => {
                let from = read_u32(payload, 0)?;
                let dest = read_u32(payload, 4)?;
                Ok(Message::Abort(Abort { from, dest }))
            }
            BEAT_KIND => {
                let from = read_u32(payload, 0)?;
                let beat_length_ms = read_u32(payload, 4)?;
                Ok(Message::Beat(Beat {
                    from,
                    beat_length_ms,
                }))
            }
            other => Err(DecodeError::UnknownKind(other)),
        }
    }

    /// Serialise into `buf` for transmission.  Returns the number of
    /// bytes written, or 0 if `buf` is too small for this kind.
    pub fn encode(&self, buf: &mut [u8]) -> usize {
        if buf.len() < self.encoded_len() {
            return 0;
        }
        match self {
            Message::Invitation(p) => {
                buf[0] = INVITATION_KIND;
                buf[1..5].copy_from_slice(&p.from.to_le_bytes());
                INVITATION_LEN
            }
            Message::Exchange(p) => {
                buf[0] = EXCHANGE_KIND;
                buf[1..5].copy_from_slice(&p.from.to_le_bytes());
                buf[5..9].copy_from_slice(&p.dest.to_le_bytes());
                buf[9..11].copy_from_slice(&p.picture.to_le_bytes());
                buf[11] = p.progress as u8;
                buf[12..16].copy_from_slice(&p.starttime.to_le_bytes());
                EXCHANGE_LEN
            }
            Message::Abort(p) => {
                buf[0] = ABORT_KIND;
                buf[1..5].copy_from_slice(&p.from.to_le_bytes());
                buf[5..9].copy_from_slice(&p.dest.to_le_bytes());
                ABORT_LEN
            }
            Message::Beat(p) => {
                buf[0] = BEAT_KIND;
                buf[1..5].copy_from_slice(&p.from.to_le_bytes());
                buf[5..9].copy_from_slice(&p.beat_length_ms.to_le_bytes());
                BEAT_LEN
            }
        }
    }

    /// Encoded size of this kind in bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            Message::Invitation(_) => INVITATION_LEN,
            Message::Exchange(_) => EXCHANGE_LEN,
            Message::Abort(_) => ABORT_LEN,
            Message::Beat(_) => BEAT_LEN,
        }
    }

    /// Sender id carried by every kind.
    pub fn sender(&self) -> NodeId {
        match self {
            Message::Invitation(p) => p.from,
            Message::Exchange(p) => p.from,
            Message::Abort(p) => p.from,
            Message::Beat(p) => p.from,
        }
    }

    /// Destination id for point-to-point kinds, `None` for broadcasts.
    pub fn dest(&self) -> Option<NodeId> {
        match self {
            Message::Exchange(p) => Some(p.dest),
            Message::Abort(p) => Some(p.dest),
            Message::Invitation(_) | Message::Beat(_) => None,
        }
    }

    /// True for kinds addressed to every nearby badge.
    pub fn is_broadcast(&self) -> bool {
        self.dest().is_none()
    }
}

fn read_u8(data: &[u8], at: usize) -> Result<u8, DecodeError> {
    data.get(at).copied().ok_or(DecodeError::Truncated)
}

fn read_u16(data: &[u8], at: usize) -> Result<u16, DecodeError> {
    let bytes = data
        .get(at..at + 2)
        .ok_or(DecodeError::Truncated)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, DecodeError> {
    let bytes = data
        .get(at..at + 4)
        .ok_or(DecodeError::Truncated)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
