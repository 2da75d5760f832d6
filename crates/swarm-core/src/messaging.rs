//! Message Proposal and Self-Censorship
//!
//! After deciding, an agent may offer one message to the router. Whether it
//! speaks depends on how well its recent messages got through: a falling
//! delivery rate lowers the chance of speaking and raises the importance a
//! message needs.

use rand::rngs::SmallRng;
use rand::Rng;

use swarm_events::{Cell, StrategyKind};

use crate::components::message::{Message, Report, Sighting, SightingKind, SightingSource};
use crate::config::MessagingConfig;
use crate::strategy::Percept;

/// How talkative each strategy is before delivery feedback applies.
pub fn strategy_bias(kind: StrategyKind) -> f64 {
    match kind {
        StrategyKind::Cooperative => 1.0,
        StrategyKind::Cautious => 0.9,
        StrategyKind::Balanced | StrategyKind::QLearning => 0.8,
        StrategyKind::Explorer => 0.7,
        StrategyKind::Greedy => 0.5,
    }
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// `bias x (min_probability + (1 - min_probability) x rate)`
pub fn generation_probability(kind: StrategyKind, rate: f64, config: &MessagingConfig) -> f64 {
    let floor = config.min_probability;
    strategy_bias(kind) * (floor + (1.0 - floor) * clamp_rate(rate))
}

/// `base_threshold + censor_strength x (1 - rate)`
pub fn importance_threshold(rate: f64, config: &MessagingConfig) -> f64 {
    config.base_threshold + config.censor_strength * (1.0 - clamp_rate(rate))
}

/// Value of passing a sighting on: magnitude over distance, hazards boosted.
pub fn salience(sighting: &Sighting, from: Cell, config: &MessagingConfig) -> f64 {
    let falloff = 1.0 + sighting.cell.chebyshev(&from) as f64;
    match sighting.kind {
        SightingKind::Resource => sighting.magnitude / falloff,
        SightingKind::Hazard => sighting.magnitude * config.threat_weight / falloff,
    }
}

/// Packs the agent's most salient first-hand sightings into a message.
/// Peer reports are never relayed. `None` when there is nothing to say.
pub fn compose(percept: &Percept, config: &MessagingConfig) -> Option<Message> {
    let mut reports: Vec<Report> = percept
        .memory
        .resources()
        .chain(percept.memory.hazards())
        .filter(|s| s.source == SightingSource::Own)
        .map(|s| Report {
            sighting: *s,
            salience: salience(s, percept.position, config),
        })
        .collect();
    if reports.is_empty() {
        return None;
    }
    reports.sort_by(|a, b| b.salience.total_cmp(&a.salience));
    reports.truncate(config.max_sightings);
    Some(Message::new(
        percept.agent,
        percept.tick,
        reports,
        config.staleness_discount,
    ))
}

/// Composes a message and runs it through self-censorship.
pub fn propose(
    kind: StrategyKind,
    percept: &Percept,
    config: &MessagingConfig,
    rng: &mut SmallRng,
) -> Option<Message> {
    let message = compose(percept, config)?;
    let rate = percept.delivery_rate();
    if message.importance < importance_threshold(rate, config) {
        return None;
    }
    if rng.gen::<f64>() >= generation_probability(kind, rate, config) {
        return None;
    }
    Some(message)
}
