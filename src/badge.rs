//! Top-level badge behavior.
//!
//! Wires the gesture decoder, encounter coordinator, and animation
//! scheduler into one cooperative pass.  Within a tick, gestures are
//! decoded first so their consequences (a cancelled exchange, a pattern
//! change) land in the same tick; the coordinator and the visual layer
//! follow.
//!
//! Gesture policy:
//!
//! | Gesture      | Action                                          |
//! |--------------|-------------------------------------------------|
//! | tap left     | cycle to the next allowed LED pattern           |
//! | tap right    | tap tempo; broadcast the beat once it changes   |
//! | tap both     | cancel any in-flight exchange                   |
//! | hold both    | broadcast an invitation (bonding gesture)       |
//! | release both | withdraw invitations that never became exchanges|
//! | hold left    | lights off                                      |
//! | hold right   | solid fill (torch)                              |

use heapless::Deque;
use log::{debug, warn};

use crate::clock::Clock;
use crate::config::{EncounterConfig, LED_COUNT, TouchConfig};
use crate::encounter::{EncounterCoordinator, EncounterStatus};
use crate::error::Error;
use crate::gesture::{GestureDecoder, GestureEvent, TouchSensor};
use crate::protocol::{Beat, Message, NodeId};
use crate::visual::{AnimationScheduler, Proximity, Transition, GREEN, RED, WHITE};
use smart_leds::RGB8;

/// One badge: sensor in, LED frames and protocol messages out.
pub struct Badge<S, C> {
    node: NodeId,
    decoder: GestureDecoder<S>,
    coordinator: EncounterCoordinator,
    visual: AnimationScheduler<C>,
    last_status: EncounterStatus,
    last_beat_ms: u32,
    outbox: Deque<Message, 4>,
}

impl<S: TouchSensor, C: Clock> Badge<S, C> {
    pub fn new(
        node: NodeId,
        sensor: S,
        clock: C,
        touch_cfg: TouchConfig,
        encounter_cfg: EncounterConfig,
    ) -> Self {
        let visual = AnimationScheduler::new(clock);
        let last_beat_ms = visual.tempo().beat_length_ms();
        Self {
            node,
            decoder: GestureDecoder::new(sensor, touch_cfg),
            coordinator: EncounterCoordinator::new(node, encounter_cfg),
            visual,
            last_status: EncounterStatus::Idle,
            last_beat_ms,
            outbox: Deque::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn decoder(&self) -> &GestureDecoder<S> {
        &self.decoder
    }

    pub fn coordinator(&self) -> &EncounterCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut EncounterCoordinator {
        &mut self.coordinator
    }

    pub fn visual(&self) -> &AnimationScheduler<C> {
        &self.visual
    }

    pub fn visual_mut(&mut self) -> &mut AnimationScheduler<C> {
        &mut self.visual
    }

    /// Arm touch calibration; gestures stay silent until it finishes.
    pub fn calibrate(&mut self) {
        self.decoder.calibrate();
    }

    /// One cooperative pass: gestures, then coordinator bookkeeping,
    /// then the visual reflection of the result.
    pub fn tick(&mut self) {
        let now = self.now();
        self.decoder.tick(now);
        while let Some(event) = self.decoder.take_event() {
            self.on_gesture(event, now);
        }
        self.coordinator.tick(now);
        self.sync_visuals(now);
    }

    /// Render the current LED frame.
    pub fn show(&mut self) -> &[RGB8; LED_COUNT] {
        self.visual.show()
    }

    /// Feed one raw frame from the mesh transport.  Malformed frames
    /// are dropped with a diagnostic and reported back; they never
    /// disturb any peer's state machine.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Result<(), Error> {
        match Message::decode(frame) {
            Ok(msg) => {
                self.handle_message(&msg);
                Ok(())
            }
            Err(e) => {
                warn!("badge: dropping malformed frame ({:?})", e);
                Err(e.into())
            }
        }
    }

    /// Feed one decoded protocol message.
    pub fn handle_message(&mut self, msg: &Message) {
        let now = self.now();
        if let Message::Beat(beat) = msg {
            if beat.from != self.node {
                debug!("badge: beat {} ms from {}", beat.beat_length_ms, beat.from);
                self.visual.tempo_mut().set_beat_length(beat.beat_length_ms);
                self.last_beat_ms = self.visual.tempo().beat_length_ms();
            }
            return;
        }
        self.coordinator.handle_message(msg, now);
        self.sync_visuals(now);
    }

    /// Pop the next outgoing protocol message for the transport.
    pub fn take_outgoing(&mut self) -> Option<Message> {
        if let Some(msg) = self.coordinator.take_outgoing() {
            return Some(msg);
        }
        self.outbox.pop_front()
    }

    /// Update the proximity estimate from the mesh's node count.
    pub fn set_mesh_size(&mut self, nearby_badges: usize) {
        let proximity = match nearby_badges {
            0 => Proximity::Alone,
            1 => Proximity::Nearby,
            _ => Proximity::Group,
        };
        self.visual.set_proximity(proximity);
    }

    fn now(&self) -> u32 {
        self.visual.tempo().clock().now_ms()
    }

    fn on_gesture(&mut self, event: GestureEvent, now: u32) {
        debug!("badge: gesture {:?}", event);
        match event {
            GestureEvent::TapLeft => self.visual.next_pattern(),
            GestureEvent::TapRight => self.tap_tempo(),
            GestureEvent::TapBoth => self.coordinator.cancel_all(now),
            GestureEvent::HoldBoth => {
                self.coordinator.invite();
                self.visual.blink(300, 1, WHITE, Transition::Animation);
            }
            GestureEvent::ReleaseBoth => self.coordinator.cancel_pending(now),
            GestureEvent::HoldLeft => self.visual.turn_off(),
            GestureEvent::HoldRight => self.visual.fill_all(),
            GestureEvent::NoTap
            | GestureEvent::ReleaseLeft
            | GestureEvent::ReleaseRight => {}
        }
    }

    /// Feed the tap-tempo estimator; broadcast the beat length whenever
    /// the estimate moves so nearby badges stay in step.
    fn tap_tempo(&mut self) {
        self.visual.tempo_mut().update_beat(true);
        let beat_ms = self.visual.tempo().beat_length_ms();
        if beat_ms != self.last_beat_ms {
            self.last_beat_ms = beat_ms;
            let msg = Message::Beat(Beat {
                from: self.node,
                beat_length_ms: beat_ms,
            });
            if self.outbox.push_back(msg).is_err() {
                warn!("badge: beat outbox full");
            }
        }
    }

    /// Reflect coordinator status into the LED layer on every change.
    fn sync_visuals(&mut self, _now: u32) {
        let status = self.coordinator.status();
        if status == self.last_status {
            return;
        }
        self.last_status = status;
        match status {
            EncounterStatus::Exchanging => {
                let window = self.coordinator.config().handshake_timeout_ms;
                if let Some(rec) = self.coordinator.active_exchange() {
                    self.visual.meter(rec.started_ms, window);
                }
            }
            EncounterStatus::Completed => {
                self.visual.blink(400, 3, GREEN, Transition::Animation);
            }
            EncounterStatus::Aborted => {
                self.visual.blink(400, 3, RED, Transition::Animation);
            }
            EncounterStatus::Idle => {}
        }
    }
}
