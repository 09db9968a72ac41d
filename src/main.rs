//! Embedded entry point - nRF52840 badge firmware.
//!
//! Boot sequence:
//!   1. Bring up the SoftDevice and the BLE-advertising transport.
//!   2. Construct the core [`Badge`] around the touch controller and
//!      the mesh-adjusted clock.
//!   3. Calibrate the touch baseline (incrementally, inside the loop).
//!   4. Run the cooperative loop: gesture/coordinator tick every 10 ms,
//!      LED frame every 5 ms, radio frames shuttled in between.

#![no_std]
#![no_main]

mod board;

use defmt::{info, unwrap};
use defmt_rtt as _;
use panic_probe as _;

use embassy_executor::Spawner;
use embassy_nrf::interrupt::Priority;
use embassy_nrf::{bind_interrupts, peripherals, spim, twim};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Ticker};
use nrf_softdevice::Softdevice;

use board::clock::MeshClock;
use board::leds::LedStrip;
use board::radio::{self, Frame, FRAME_QUEUE};
use board::touch::TouchController;
use meshbadge::badge::Badge;
use meshbadge::config::{
    EncounterConfig, TouchConfig, SHOW_INTERVAL_MS, TICK_INTERVAL_MS,
};
use meshbadge::protocol::MAX_FRAME_LEN;

bind_interrupts!(struct Irqs {
    SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0 => twim::InterruptHandler<peripherals::TWISPI0>;
    SPIM2_SPIS2_SPI2 => spim::InterruptHandler<peripherals::SPI2>;
});

static MESH_CLOCK: MeshClock = MeshClock::new();
static OUTGOING: Channel<CriticalSectionRawMutex, Frame, FRAME_QUEUE> = Channel::new();
static INCOMING: Channel<CriticalSectionRawMutex, Frame, FRAME_QUEUE> = Channel::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Stable node id from the factory-programmed device id.
fn node_id() -> u32 {
    let ficr = embassy_nrf::pac::FICR;
    ficr.deviceid(0).read() ^ ficr.deviceid(1).read()
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // The SoftDevice owns the highest interrupt priorities.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);

    info!("meshbadge starting");

    let sd = Softdevice::enable(&Default::default());
    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(radio::radio_task(
        sd,
        OUTGOING.receiver(),
        INCOMING.sender(),
    )));

    // Touch controller on TWISPI0 (P0.26 SDA / P0.27 SCL).
    let i2c = twim::Twim::new(
        p.TWISPI0,
        Irqs,
        p.P0_26,
        p.P0_27,
        twim::Config::default(),
    );
    let touch = TouchController::new(i2c);

    // WS2812 data line on P0.06 via SPIM (MISO/CSN unused).
    let mut spim_config = spim::Config::default();
    spim_config.frequency = spim::Frequency::M4;
    let spim = spim::Spim::new_txonly(p.SPI2, Irqs, p.P0_08, p.P0_06, spim_config);
    let mut strip = LedStrip::new(spim);

    let mut badge: Badge<_, &MeshClock> = Badge::new(
        node_id(),
        touch,
        &MESH_CLOCK,
        TouchConfig::default(),
        EncounterConfig::default(),
    );
    badge.calibrate();

    let ticks_per_frame = (TICK_INTERVAL_MS / SHOW_INTERVAL_MS).max(1);
    let mut ticker = Ticker::every(Duration::from_millis(SHOW_INTERVAL_MS));
    let mut frame_count: u64 = 0;

    loop {
        ticker.next().await;
        frame_count += 1;

        // Inbound frames first so their effects land in this tick.
        while let Ok(frame) = INCOMING.try_receive() {
            let _ = badge.handle_frame(&frame);
        }

        if frame_count % ticks_per_frame == 0 {
            badge.tick();
            badge.set_mesh_size(radio::NEARBY.load(core::sync::atomic::Ordering::Relaxed));

            while let Some(msg) = badge.take_outgoing() {
                let mut buf = [0u8; MAX_FRAME_LEN];
                let written = msg.encode(&mut buf);
                let frame = Frame::from_slice(&buf[..written]).unwrap_or_default();
                if OUTGOING.try_send(frame).is_err() {
                    defmt::warn!("radio outbox full, dropping frame");
                }
            }
        }

        let brightness = badge.visual().max_brightness();
        let frame = *badge.show();
        strip.write(&frame, brightness).await;
    }
}
