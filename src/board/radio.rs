//! BLE-advertising transport for protocol frames.
//!
//! Badges are not paired: every protocol frame rides in the
//! manufacturer-specific data of a non-connectable advertisement, and
//! reception is plain observation.  Point-to-point kinds carry their
//! destination in the frame itself; receivers filter.  Delivery is
//! best-effort, which the coordinator's keepalive/timeout design
//! already assumes.

use core::sync::atomic::{AtomicUsize, Ordering};

use defmt::{debug, info};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_time::{Duration, Instant};
use heapless::Vec;
use meshbadge::protocol::MAX_FRAME_LEN;
use nrf_softdevice::ble::central;
use nrf_softdevice::ble::peripheral;
use nrf_softdevice::Softdevice;

/// One encoded protocol frame.
pub type Frame = Vec<u8, MAX_FRAME_LEN>;

/// Queue depths between the radio and the badge loop.
pub const FRAME_QUEUE: usize = 8;

/// Company identifier used in the manufacturer-specific AD structure
/// (0xFFFF = test/prototype space).
const COMPANY_ID: u16 = 0xFFFF;

/// How long one outgoing frame is advertised.
const ADVERTISE_MS: u64 = 60;

/// Observation window between transmissions.
const SCAN_MS: u64 = 120;

/// A peer unseen for this long no longer counts as nearby.
const PEER_TTL_MS: u64 = 10_000;

/// Number of distinct badges heard recently; the badge loop maps this
/// to the proximity estimate.
pub static NEARBY: AtomicUsize = AtomicUsize::new(0);

struct SeenPeers {
    peers: Vec<(u32, Instant), 16>,
}

impl SeenPeers {
    const fn new() -> Self {
        Self { peers: Vec::new() }
    }

    fn note(&mut self, id: u32) {
        let now = Instant::now();
        match self.peers.iter_mut().find(|(peer, _)| *peer == id) {
            Some(entry) => entry.1 = now,
            None => {
                if self.peers.is_full() {
                    // Drop the stalest entry.
                    if let Some(oldest) = self
                        .peers
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, (_, at))| *at)
                        .map(|(i, _)| i)
                    {
                        self.peers.swap_remove(oldest);
                    }
                }
                let _ = self.peers.push((id, now));
            }
        }
        self.prune(now);
    }

    fn prune(&mut self, now: Instant) {
        let ttl = Duration::from_millis(PEER_TTL_MS);
        self.peers.retain(|(_, at)| now - *at < ttl);
        NEARBY.store(self.peers.len(), Ordering::Relaxed);
    }
}

/// Build the advertisement payload: flags + manufacturer data with the
/// frame appended after the company id.
fn adv_payload(frame: &Frame) -> Vec<u8, 31> {
    let mut data: Vec<u8, 31> = Vec::new();
    // Flags: LE General Discoverable, BR/EDR not supported.
    let _ = data.extend_from_slice(&[0x02, 0x01, 0x06]);
    let _ = data.push((3 + frame.len()) as u8);
    let _ = data.push(0xFF);
    let _ = data.extend_from_slice(&COMPANY_ID.to_le_bytes());
    let _ = data.extend_from_slice(frame);
    data
}

/// Pull a protocol frame back out of observed advertisement data.
fn frame_from_adv(data: &[u8]) -> Option<Frame> {
    let mut at = 0;
    while at < data.len() {
        let len = data[at] as usize;
        if len == 0 || at + 1 + len > data.len() {
            return None;
        }
        let ad_type = data[at + 1];
        let body = &data[at + 2..at + 1 + len];
        if ad_type == 0xFF && body.len() > 2 {
            let company = u16::from_le_bytes([body[0], body[1]]);
            if company == COMPANY_ID {
                return Frame::from_slice(&body[2..]).ok();
            }
        }
        at += 1 + len;
    }
    None
}

/// Alternate between advertising queued frames and observing peers.
#[embassy_executor::task]
pub async fn radio_task(
    sd: &'static Softdevice,
    outgoing: Receiver<'static, CriticalSectionRawMutex, Frame, FRAME_QUEUE>,
    incoming: Sender<'static, CriticalSectionRawMutex, Frame, FRAME_QUEUE>,
) {
    info!("radio: transport up");
    let mut seen = SeenPeers::new();

    loop {
        // Transmit burst: everything currently queued.
        while let Ok(frame) = outgoing.try_receive() {
            let payload = adv_payload(&frame);
            let config = peripheral::Config {
                interval: 32, // 20 ms
                timeout: Some((ADVERTISE_MS / 10) as u16),
                ..Default::default()
            };
            let adv = peripheral::NonconnectableAdvertisement::NonscannableUndirected {
                adv_data: &payload,
            };
            if peripheral::advertise(sd, adv, &config).await.is_err() {
                // Timeout is the normal exit for a burst.
            }
            debug!("radio: frame out ({} bytes)", frame.len());
        }

        // Observation window.
        let deadline = Instant::now() + Duration::from_millis(SCAN_MS);
        let config = central::ScanConfig {
            timeout: (SCAN_MS / 10) as u16,
            ..Default::default()
        };
        let _ = central::scan(sd, &config, |params| {
            let data = unsafe {
                core::slice::from_raw_parts(params.data.p_data, params.data.len as usize)
            };
            if let Some(frame) = frame_from_adv(data) {
                if frame.len() > 4 {
                    let from =
                        u32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
                    seen.note(from);
                }
                let _ = incoming.try_send(frame);
            }
            if Instant::now() > deadline {
                return Some(());
            }
            None::<()>
        })
        .await;
    }
}
