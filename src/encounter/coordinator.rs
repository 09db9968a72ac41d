//! The per-peer encounter state machine driver.

use heapless::{Deque, Vec};
use log::{debug, info, warn};

use crate::config::{EncounterConfig, PEER_CAPACITY};
use crate::encounter::{EncounterState, EncounterStatus, PeerEncounter};
use crate::protocol::{Abort, Exchange, Invitation, Message, NodeId, PictureId, Progress};

/// Outgoing queue depth; drained by the transport every tick.
const OUTBOX_CAPACITY: usize = 16;

/// Drives one [`PeerEncounter`] record per known peer.
///
/// Feed inbound protocol traffic through
/// [`handle_message`](EncounterCoordinator::handle_message), local
/// gestures through [`invite`](EncounterCoordinator::invite) /
/// [`cancel_all`](EncounterCoordinator::cancel_all), and call
/// [`tick`](EncounterCoordinator::tick) at a fixed rate for timeout and
/// keepalive bookkeeping.  Outgoing messages accumulate in an outbox
/// the transport drains with
/// [`take_outgoing`](EncounterCoordinator::take_outgoing).
pub struct EncounterCoordinator {
    node: NodeId,
    cfg: EncounterConfig,
    peers: Vec<PeerEncounter, PEER_CAPACITY>,
    outbox: Deque<Message, OUTBOX_CAPACITY>,
    selected_picture: PictureId,
}

impl EncounterCoordinator {
    pub fn new(node: NodeId, cfg: EncounterConfig) -> Self {
        Self {
            node,
            cfg,
            peers: Vec::new(),
            outbox: Deque::new(),
            selected_picture: 0,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn config(&self) -> &EncounterConfig {
        &self.cfg
    }

    /// Picture token offered in the next exchange.
    pub fn select_picture(&mut self, picture: PictureId) {
        self.selected_picture = picture;
    }

    pub fn selected_picture(&self) -> PictureId {
        self.selected_picture
    }

    pub fn encounter(&self, peer: NodeId) -> Option<&PeerEncounter> {
        self.peers.iter().find(|p| p.peer == peer)
    }

    /// First record currently exchanging, if any (drives the meter).
    pub fn active_exchange(&self) -> Option<&PeerEncounter> {
        self.peers
            .iter()
            .find(|p| p.state == EncounterState::Exchanging)
    }

    /// Roll-up for the animation layer.  Exchanges outrank fresh
    /// completions, which outrank fresh aborts.
    pub fn status(&self) -> EncounterStatus {
        let mut completed = false;
        let mut aborted = false;
        for p in &self.peers {
            match p.state {
                EncounterState::Exchanging => return EncounterStatus::Exchanging,
                EncounterState::Completed => completed = true,
                EncounterState::Aborted => aborted = true,
                EncounterState::Invited => {}
            }
        }
        if completed {
            EncounterStatus::Completed
        } else if aborted {
            EncounterStatus::Aborted
        } else {
            EncounterStatus::Idle
        }
    }

    /// Pop the oldest queued outgoing message.
    pub fn take_outgoing(&mut self) -> Option<Message> {
        self.outbox.pop_front()
    }

    /// Broadcast an invitation to every badge in range.
    pub fn invite(&mut self) {
        info!("encounter: broadcasting invitation");
        self.send(Message::Invitation(Invitation { from: self.node }));
    }

    /// Abort every live encounter (explicit local cancellation).
    pub fn cancel_all(&mut self, now_ms: u32) {
        for i in 0..self.peers.len() {
            if self.peers[i].is_live() {
                self.abort_peer(i, now_ms);
            }
        }
    }

    /// Abort encounters that never reached `Exchanging` (the bonding
    /// gesture was withdrawn before a handshake).
    pub fn cancel_pending(&mut self, now_ms: u32) {
        for i in 0..self.peers.len() {
            if self.peers[i].state == EncounterState::Invited {
                self.abort_peer(i, now_ms);
            }
        }
    }

    /// Process one inbound protocol message.
    pub fn handle_message(&mut self, msg: &Message, now_ms: u32) {
        if msg.sender() == self.node {
            // Our own broadcast echoed back by the mesh.
            return;
        }
        if let Some(dest) = msg.dest() {
            if dest != self.node {
                debug!("encounter: dropping frame addressed to {}", dest);
                return;
            }
        }

        match msg {
            Message::Invitation(inv) => self.on_invitation(inv.from, now_ms),
            Message::Exchange(x) => self.on_exchange(x, now_ms),
            Message::Abort(a) => self.on_abort(a, now_ms),
            // Tempo traffic is not the coordinator's concern.
            Message::Beat(_) => {}
        }
    }

    /// Timeout, keepalive, and garbage-collection pass.  Call at a
    /// fixed rate; timestamps are compared against recorded start
    /// times, no timers are armed.
    pub fn tick(&mut self, now_ms: u32) {
        let mut i = 0;
        while i < self.peers.len() {
            let state = self.peers[i].state;
            match state {
                EncounterState::Invited => {
                    let waited = now_ms.wrapping_sub(self.peers[i].state_since_ms);
                    if waited >= self.cfg.handshake_timeout_ms {
                        info!("encounter: peer {} handshake timed out", self.peers[i].peer);
                        self.abort_peer(i, now_ms);
                    }
                }
                EncounterState::Exchanging => {
                    let idle = now_ms.wrapping_sub(self.peers[i].last_activity_ms);
                    if idle >= self.cfg.bonding_timeout_ms {
                        info!("encounter: peer {} bonding timed out", self.peers[i].peer);
                        self.abort_peer(i, now_ms);
                    } else {
                        self.run_exchange(i, now_ms);
                    }
                }
                EncounterState::Completed | EncounterState::Aborted => {
                    let lingered = now_ms.wrapping_sub(self.peers[i].state_since_ms);
                    if lingered >= self.cfg.removal_grace_ms {
                        let gone = self.peers.swap_remove(i);
                        debug!("encounter: peer {} record removed", gone.peer);
                        continue; // swapped element now sits at i
                    }
                }
            }
            i += 1;
        }
    }

    fn on_invitation(&mut self, from: NodeId, now_ms: u32) {
        match self.index_of(from) {
            Some(i) => {
                self.peers[i].last_activity_ms = now_ms;
                if self.peers[i].state == EncounterState::Invited {
                    self.try_promote(i, now_ms);
                }
            }
            None => {
                debug!("encounter: invited by {}", from);
                if let Some(i) = self.create(from, now_ms) {
                    self.try_promote(i, now_ms);
                }
            }
        }
    }

    fn on_exchange(&mut self, x: &Exchange, now_ms: u32) {
        let i = match self.index_of(x.from) {
            Some(i) => i,
            None => {
                if x.progress != Progress::Start {
                    // Completion for an exchange we no longer know of.
                    debug!("encounter: stale exchange from {}", x.from);
                    return;
                }
                // The peer accepted our broadcast invitation.
                let Some(i) = self.create(x.from, now_ms) else {
                    return;
                };
                i
            }
        };

        let rec = &mut self.peers[i];
        rec.last_activity_ms = now_ms;
        rec.peer_picture = Some(x.picture);

        match rec.state {
            EncounterState::Invited => {
                rec.remote_progress = Some(x.progress);
                // Adopt the initiator's start time so both meters align.
                rec.started_ms = x.starttime;
                self.try_promote(i, now_ms);
            }
            EncounterState::Exchanging => {
                rec.remote_progress = Some(x.progress);
                self.check_completed(i, now_ms);
            }
            // Duplicate traffic after the exchange settled: no-op.
            EncounterState::Completed | EncounterState::Aborted => {}
        }
    }

    fn on_abort(&mut self, a: &Abort, now_ms: u32) {
        match self.index_of(a.from) {
            Some(i) if self.peers[i].is_live() => {
                info!("encounter: peer {} aborted", a.from);
                self.abort_peer(i, now_ms);
            }
            Some(_) => {} // already settled - duplicate abort is a no-op
            None => debug!("encounter: abort from unknown peer {}", a.from),
        }
    }

    /// Promote an `Invited` record once policy allows.  The default
    /// policy auto-accepts up to `max_parallel_exchanges` at a time;
    /// everyone else keeps waiting (and eventually times out).
    fn try_promote(&mut self, i: usize, now_ms: u32) {
        let exchanging = self
            .peers
            .iter()
            .filter(|p| p.state == EncounterState::Exchanging)
            .count();
        if exchanging >= self.cfg.max_parallel_exchanges {
            return;
        }

        let picture = self.selected_picture;
        let rec = &mut self.peers[i];
        rec.state = EncounterState::Exchanging;
        rec.state_since_ms = now_ms;
        rec.local_progress = Progress::Start;
        rec.picture = picture;
        if rec.remote_progress.is_none() {
            // We initiate: our clock defines the shared start time.
            rec.started_ms = now_ms;
        }
        rec.last_ping_ms = now_ms;
        let announce = Message::Exchange(Exchange {
            from: self.node,
            dest: rec.peer,
            picture,
            progress: Progress::Start,
            starttime: rec.started_ms,
        });
        info!("encounter: exchanging with peer {}", rec.peer);
        self.send(announce);
        self.check_completed(i, now_ms);
    }

    /// Progress/keepalive while `Exchanging`: flip local progress to
    /// `Complete` once the shared start time is a handshake window old,
    /// and retransmit the current progress at the ping cadence.
    fn run_exchange(&mut self, i: usize, now_ms: u32) {
        let rec = &self.peers[i];
        let elapsed = now_ms.wrapping_sub(rec.started_ms);
        let ping_due = now_ms.wrapping_sub(rec.last_ping_ms) >= self.cfg.ping_interval_ms;

        if rec.local_progress == Progress::Start && elapsed >= self.cfg.handshake_timeout_ms {
            let rec = &mut self.peers[i];
            rec.local_progress = Progress::Complete;
            rec.last_ping_ms = now_ms;
            let msg = Message::Exchange(Exchange {
                from: self.node,
                dest: rec.peer,
                picture: rec.picture,
                progress: Progress::Complete,
                starttime: rec.started_ms,
            });
            debug!("encounter: peer {} local progress complete", rec.peer);
            self.send(msg);
            self.check_completed(i, now_ms);
        } else if ping_due {
            let rec = &mut self.peers[i];
            rec.last_ping_ms = now_ms;
            let msg = Message::Exchange(Exchange {
                from: self.node,
                dest: rec.peer,
                picture: rec.picture,
                progress: rec.local_progress,
                starttime: rec.started_ms,
            });
            self.send(msg);
        }
    }

    fn check_completed(&mut self, i: usize, now_ms: u32) {
        let rec = &mut self.peers[i];
        if rec.state == EncounterState::Exchanging
            && rec.local_progress == Progress::Complete
            && rec.remote_progress == Some(Progress::Complete)
        {
            rec.state = EncounterState::Completed;
            rec.state_since_ms = now_ms;
            info!(
                "encounter: exchange with peer {} completed (got picture {:?})",
                rec.peer, rec.peer_picture
            );
        }
    }

    /// Transition to `Aborted` and notify the peer (best-effort, not
    /// retried).
    fn abort_peer(&mut self, i: usize, now_ms: u32) {
        let rec = &mut self.peers[i];
        rec.state = EncounterState::Aborted;
        rec.state_since_ms = now_ms;
        let peer = rec.peer;
        self.send(Message::Abort(Abort {
            from: self.node,
            dest: peer,
        }));
    }

    /// Insert a fresh `Invited` record, evicting the least-recently
    /// active settled/waiting record when the arena is full.  Returns
    /// the record's index.
    fn create(&mut self, peer: NodeId, now_ms: u32) -> Option<usize> {
        if self.peers.is_full() {
            match self.eviction_victim() {
                Some(victim) => {
                    let gone = self.peers.swap_remove(victim);
                    warn!(
                        "encounter: peer table full, evicting peer {} ({:?})",
                        gone.peer, gone.state
                    );
                }
                None => {
                    warn!("encounter: peer table full, ignoring peer {}", peer);
                    return None;
                }
            }
        }
        let rec = PeerEncounter::new(peer, self.selected_picture, now_ms);
        self.peers.push(rec).ok();
        Some(self.peers.len() - 1)
    }

    /// Least-recently-active record, preferring anything over a live
    /// exchange; only when every record is `Exchanging` is one of those
    /// sacrificed.
    fn eviction_victim(&self) -> Option<usize> {
        let lru = |pred: &dyn Fn(&PeerEncounter) -> bool| {
            self.peers
                .iter()
                .enumerate()
                .filter(|(_, p)| pred(p))
                .min_by_key(|(_, p)| p.last_activity_ms)
                .map(|(i, _)| i)
        };
        lru(&|p| p.state != EncounterState::Exchanging).or_else(|| lru(&|_| true))
    }

    fn index_of(&self, peer: NodeId) -> Option<usize> {
        self.peers.iter().position(|p| p.peer == peer)
    }

    fn send(&mut self, msg: Message) {
        if self.outbox.push_back(msg).is_err() {
            warn!("encounter: outbox full, dropping {:?}", msg);
        }
    }
}
