//! Agent Components
//!
//! Components for individual agents: identity, position, score, memory,
//! inbox and the delivery statistics that drive self-censorship.

use bevy_ecs::prelude::*;
use std::collections::{BTreeMap, VecDeque};

use swarm_events::{Cell, DecisionBasis, MessageOutcome};

use super::message::{Message, Sighting, SightingKind, SightingSource};

/// Marker component identifying an entity as an agent
#[derive(Component, Debug, Clone, Default)]
pub struct Agent;

/// Unique identifier for an agent. Processing order within a tick is
/// ascending by this id.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentId(pub u32);

/// Component: An agent's current cell
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position(pub Cell);

/// Component: Chebyshev radius of direct perception
#[derive(Component, Debug, Clone, Copy)]
pub struct Vision(pub u32);

/// Component: cumulative score. Only resource collection and hazard contact
/// change it.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Score {
    total: f64,
}

impl Score {
    pub fn total(&self) -> f64 {
        self.total
    }

    pub(crate) fn credit(&mut self, value: f64) {
        self.total += value;
    }

    pub(crate) fn penalize(&mut self, severity: f64) {
        self.total -= severity;
    }
}

/// Trailing window of delivered/dropped outcomes
#[derive(Debug, Clone, PartialEq)]
pub struct RollingRatio {
    window: usize,
    outcomes: VecDeque<bool>,
}

impl RollingRatio {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            outcomes: VecDeque::with_capacity(window.max(1)),
        }
    }

    pub fn record(&mut self, delivered: bool) {
        if self.outcomes.len() == self.window {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(delivered);
    }

    /// Delivered fraction over the window; 1.0 while the window is empty.
    pub fn rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        let delivered = self.outcomes.iter().filter(|d| **d).count();
        delivered as f64 / self.outcomes.len() as f64
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Component: per-agent delivery history, updated only by the router pass
#[derive(Component, Debug, Clone)]
pub struct DeliveryHistory {
    window: usize,
    own: RollingRatio,
    /// Peer id -> rolling success ratio of that peer's messages reaching us
    peers: BTreeMap<u32, RollingRatio>,
}

impl DeliveryHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            own: RollingRatio::new(window),
            peers: BTreeMap::new(),
        }
    }

    /// Trailing delivery rate of this agent's own messages.
    pub fn rate(&self) -> f64 {
        self.own.rate()
    }

    /// Rolling ratio for a peer; 1.0 when nothing has been heard about it.
    pub fn peer_rate(&self, peer: u32) -> f64 {
        self.peers.get(&peer).map_or(1.0, RollingRatio::rate)
    }

    pub fn peer_rates(&self) -> BTreeMap<u32, f64> {
        self.peers.iter().map(|(id, r)| (*id, r.rate())).collect()
    }

    pub(crate) fn record_own(&mut self, delivered: bool) {
        self.own.record(delivered);
    }

    pub(crate) fn record_peer(&mut self, peer: u32, delivered: bool) {
        let window = self.window;
        self.peers
            .entry(peer)
            .or_insert_with(|| RollingRatio::new(window))
            .record(delivered);
    }
}

/// Component: messages routed to this agent. Deliveries from tick t land in
/// `pending` and become `current` at the start of tick t + 1.
#[derive(Component, Debug, Clone, Default)]
pub struct Inbox {
    pending: Vec<Message>,
    current: Vec<Message>,
}

impl Inbox {
    pub fn current(&self) -> &[Message] {
        &self.current
    }

    pub(crate) fn deliver(&mut self, message: Message) {
        self.pending.push(message);
    }

    /// Makes last tick's deliveries readable and discards the ones already read.
    pub(crate) fn roll_over(&mut self) {
        self.current = std::mem::take(&mut self.pending);
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
        self.current.clear();
    }
}

/// Component: remembered sightings, own and peer-reported
#[derive(Component, Debug, Clone, Default)]
pub struct Memory {
    resources: BTreeMap<Cell, Sighting>,
    hazards: BTreeMap<Cell, Sighting>,
}

impl Memory {
    pub fn resources(&self) -> impl Iterator<Item = &Sighting> {
        self.resources.values()
    }

    pub fn hazards(&self) -> impl Iterator<Item = &Sighting> {
        self.hazards.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len() + self.hazards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bucket_mut(&mut self, kind: SightingKind) -> &mut BTreeMap<Cell, Sighting> {
        match kind {
            SightingKind::Resource => &mut self.resources,
            SightingKind::Hazard => &mut self.hazards,
        }
    }

    /// Replaces everything inside the agent's field of view with what it
    /// sees now. Remembered items in view that are gone are forgotten.
    pub(crate) fn observe(&mut self, center: Cell, radius: u32, visible: &[Sighting]) {
        self.resources.retain(|cell, _| cell.chebyshev(&center) > radius);
        self.hazards.retain(|cell, _| cell.chebyshev(&center) > radius);
        for sighting in visible {
            self.bucket_mut(sighting.kind).insert(sighting.cell, *sighting);
        }
    }

    /// Merges a peer report unless we hold a fresher sighting of that cell.
    pub(crate) fn merge_report(&mut self, sighting: Sighting, sender: u32) {
        let bucket = self.bucket_mut(sighting.kind);
        let fresher = bucket
            .get(&sighting.cell)
            .map_or(true, |known| sighting.observed_tick > known.observed_tick);
        if fresher {
            bucket.insert(
                sighting.cell,
                Sighting { source: SightingSource::Peer(sender), ..sighting },
            );
        }
    }

    /// Drops sightings older than `ttl` ticks.
    pub(crate) fn expire(&mut self, now: u64, ttl: u64) {
        self.resources.retain(|_, s| s.age(now) <= ttl);
        self.hazards.retain(|_, s| s.age(now) <= ttl);
    }

    pub(crate) fn clear(&mut self) {
        self.resources.clear();
        self.hazards.clear();
    }
}

/// Component: lifetime counters for the run summary
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub messages_generated: u64,
    pub messages_delivered: u64,
    pub encoding_failures: u64,
    pub resources_collected: u64,
    pub hazard_contacts: u64,
}

/// Component: scratch state for the tick in progress
#[derive(Component, Debug, Clone, Default)]
pub struct TickLedger {
    pub score_delta: f64,
    /// Score delta of the previous tick; the reward a learner sees
    pub last_reward: f64,
    pub decision: Option<DecisionBasis>,
    pub outgoing: Option<Message>,
    pub outcome: MessageOutcome,
}

impl TickLedger {
    /// Carries the finished tick's delta over as the next reward.
    pub(crate) fn begin_tick(&mut self) {
        self.last_reward = self.score_delta;
        self.score_delta = 0.0;
        self.decision = None;
        self.outgoing = None;
        self.outcome = MessageOutcome::None;
    }
}
