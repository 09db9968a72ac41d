//! Injectable time sources.
//!
//! The core never reads a global timer; it is constructed with one of
//! these.  `MeshClock` adds the offset learned from the mesh so that
//! animation phase matches across badges.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_time::Instant;
use meshbadge::clock::Clock;

fn uptime_ms() -> u32 {
    Instant::now().as_millis() as u32
}

/// Plain device uptime.
pub struct Uptime;

impl Clock for Uptime {
    fn now_ms(&self) -> u32 {
        uptime_ms()
    }
}

/// Uptime shifted by a mesh-learned offset.  The offset is written by
/// the radio task when a time-sync observation arrives and read by the
/// render loop; a relaxed atomic is plenty for a millisecond clock.
pub struct MeshClock {
    offset_ms: AtomicU32,
}

impl MeshClock {
    pub const fn new() -> Self {
        Self {
            offset_ms: AtomicU32::new(0),
        }
    }

    pub fn set_offset(&self, offset_ms: u32) {
        self.offset_ms.store(offset_ms, Ordering::Relaxed);
    }
}

impl Clock for &MeshClock {
    fn now_ms(&self) -> u32 {
        uptime_ms().wrapping_add(self.offset_ms.load(Ordering::Relaxed))
    }
}
