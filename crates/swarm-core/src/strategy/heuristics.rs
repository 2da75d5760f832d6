//! Heuristic Strategies
//!
//! Hand-written policies over the agent's remembered sightings. None of
//! them look at the world directly; everything comes through the percept.

use rand::rngs::SmallRng;
use rand::Rng;
use std::collections::BTreeMap;

use swarm_events::{Cell, DecisionBasis};

use crate::components::message::{Sighting, SightingSource};
use crate::config::BehaviorConfig;

use super::{wander, Decision, Direction, Percept};

/// Sticky drift target of a cautious agent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CautiousState {
    target: Option<Cell>,
}

impl CautiousState {
    pub fn target(&self) -> Option<Cell> {
        self.target
    }
}

/// Last tick each cell was visited by an explorer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitLog {
    last_visit: BTreeMap<Cell, u64>,
}

impl VisitLog {
    pub fn visit(&mut self, cell: Cell, tick: u64) {
        self.last_visit.insert(cell, tick);
    }

    pub fn last_visit(&self, cell: Cell) -> Option<u64> {
        self.last_visit.get(&cell).copied()
    }

    pub fn visited(&self) -> usize {
        self.last_visit.len()
    }

    pub(crate) fn clear(&mut self) {
        self.last_visit.clear();
    }
}

fn unit(dx: i32, dy: i32) -> (f64, f64) {
    let (x, y) = (dx as f64, dy as f64);
    let norm = x.hypot(y);
    if norm == 0.0 {
        (0.0, 0.0)
    } else {
        (x / norm, y / norm)
    }
}

fn age_exponent(sighting: &Sighting, now: u64) -> i32 {
    sighting.age(now).min(i32::MAX as u64) as i32
}

/// Known resource maximizing `value - distance_discount * distance`.
/// Ties go to the lowest cell.
fn best_resource(percept: &Percept, behavior: &BehaviorConfig) -> Option<Cell> {
    let mut best: Option<(f64, Cell)> = None;
    for sighting in percept.memory.resources() {
        let distance = sighting.cell.chebyshev(&percept.position) as f64;
        let score = sighting.magnitude - behavior.distance_discount * distance;
        if best.map_or(true, |(top, _)| score > top) {
            best = Some((score, sighting.cell));
        }
    }
    best.map(|(_, cell)| cell)
}

fn nearest_hazard(percept: &Percept) -> Option<Cell> {
    percept
        .memory
        .hazards()
        .min_by_key(|h| h.cell.chebyshev(&percept.position))
        .map(|h| h.cell)
}

/// Steps toward `target`; if that step lands on a known hazard, takes the
/// hazard-free neighbour closest to the target instead.
fn step_around_hazards(
    percept: &Percept,
    target: Cell,
    direct: DecisionBasis,
    detour: DecisionBasis,
) -> Decision {
    let direction = Direction::toward(percept.position, target);
    if direction == Direction::Stay || !percept.knows_hazard_at(direction.apply(percept.position)) {
        return Decision::new(direction, direct);
    }

    let mut best: Option<(u32, Direction)> = None;
    for candidate in Direction::MOVES {
        let cell = candidate.apply(percept.position);
        if !percept.in_bounds(cell) || percept.knows_hazard_at(cell) {
            continue;
        }
        let distance = cell.chebyshev(&target);
        if best.map_or(true, |(closest, _)| distance < closest) {
            best = Some((distance, candidate));
        }
    }
    Decision::new(best.map_or(Direction::Stay, |(_, d)| d), detour)
}

/// Greedy: chase the best-valued known resource, ignoring hazards that are
/// not directly in the way.
pub fn greedy(percept: &Percept, behavior: &BehaviorConfig, rng: &mut SmallRng) -> Decision {
    match best_resource(percept, behavior) {
        Some(target) => step_around_hazards(
            percept,
            target,
            DecisionBasis::GreedyTarget,
            DecisionBasis::GreedyDetour,
        ),
        None => wander(percept, rng),
    }
}

/// Cautious: flee nearby hazards, otherwise drift toward a sticky target.
pub fn cautious(
    state: &mut CautiousState,
    percept: &Percept,
    behavior: &BehaviorConfig,
    rng: &mut SmallRng,
) -> Decision {
    let threats: Vec<Cell> = percept
        .memory
        .hazards()
        .map(|h| h.cell)
        .filter(|cell| cell.chebyshev(&percept.position) <= behavior.safety_radius)
        .collect();
    if !threats.is_empty() {
        return flee(percept, &threats);
    }

    let still_known = state
        .target
        .map_or(false, |t| percept.memory.resources().any(|s| s.cell == t));
    if !still_known {
        let known: Vec<Cell> = percept.memory.resources().map(|s| s.cell).collect();
        state.target = if known.is_empty() {
            None
        } else {
            Some(known[rng.gen_range(0..known.len())])
        };
    }

    match state.target {
        Some(target) => Decision::new(
            Direction::toward(percept.position, target),
            DecisionBasis::CautiousDrift,
        ),
        None => wander(percept, rng),
    }
}

fn flee(percept: &Percept, threats: &[Cell]) -> Decision {
    let (mut vx, mut vy) = (0.0, 0.0);
    for threat in threats {
        let (dx, dy) = threat.offset_to(&percept.position);
        let (ux, uy) = unit(dx, dy);
        let distance = threat.chebyshev(&percept.position).max(1) as f64;
        vx += ux / distance;
        vy += uy / distance;
    }
    let direction = Direction::from_vector(vx, vy);
    if direction != Direction::Stay && percept.in_bounds(direction.apply(percept.position)) {
        return Decision::new(direction, DecisionBasis::CautiousFlee);
    }

    // No usable heading: take the in-bounds neighbour furthest from the
    // closest threat.
    let mut best: Option<(u32, Direction)> = None;
    for candidate in Direction::MOVES {
        let cell = candidate.apply(percept.position);
        if !percept.in_bounds(cell) {
            continue;
        }
        let clearance = threats.iter().map(|t| t.chebyshev(&cell)).min().unwrap_or(u32::MAX);
        if best.map_or(true, |(widest, _)| clearance > widest) {
            best = Some((clearance, candidate));
        }
    }
    Decision::new(best.map_or(Direction::Stay, |(_, d)| d), DecisionBasis::CautiousFlee)
}

/// Attraction to the best resource plus repulsion from the nearest hazard,
/// scaled down with distance. `None` when nothing is known.
fn blend(percept: &Percept, behavior: &BehaviorConfig, basis: DecisionBasis) -> Option<Decision> {
    let target = best_resource(percept, behavior);
    let hazard = nearest_hazard(percept);
    if target.is_none() && hazard.is_none() {
        return None;
    }

    let (mut vx, mut vy) = (0.0, 0.0);
    if let Some(target) = target {
        let (dx, dy) = percept.position.offset_to(&target);
        let (ux, uy) = unit(dx, dy);
        vx += behavior.attraction_weight * ux;
        vy += behavior.attraction_weight * uy;
    }
    if let Some(hazard) = hazard {
        let (dx, dy) = hazard.offset_to(&percept.position);
        let (ux, uy) = unit(dx, dy);
        let distance = hazard.chebyshev(&percept.position).max(1) as f64;
        vx += behavior.repulsion_weight * ux / distance;
        vy += behavior.repulsion_weight * uy / distance;
    }

    let direction = Direction::from_vector(vx, vy);
    if direction == Direction::Stay && percept.knows_hazard_at(percept.position) {
        return None;
    }
    Some(Decision::new(direction, basis))
}

/// Balanced: weighted blend of attraction and repulsion.
pub fn balanced(percept: &Percept, behavior: &BehaviorConfig, rng: &mut SmallRng) -> Decision {
    blend(percept, behavior, DecisionBasis::BalancedBlend).unwrap_or_else(|| wander(percept, rng))
}

/// Explorer: head for the least recently visited neighbour, grabbing any
/// resource within one step on the way.
pub fn explorer(visits: &mut VisitLog, percept: &Percept, rng: &mut SmallRng) -> Decision {
    visits.visit(percept.position, percept.tick);

    let mut nearby: Option<&Sighting> = None;
    for sighting in percept.memory.resources() {
        if sighting.cell.chebyshev(&percept.position) > 1 {
            continue;
        }
        if nearby.map_or(true, |best| sighting.magnitude > best.magnitude) {
            nearby = Some(sighting);
        }
    }
    if let Some(resource) = nearby {
        return Decision::new(
            Direction::toward(percept.position, resource.cell),
            DecisionBasis::ExplorerCollect,
        );
    }

    // Known hazards last, then never visited, then oldest visit.
    let mut frontier: Vec<Direction> = Vec::new();
    let mut best_key: Option<(bool, Option<u64>)> = None;
    for candidate in Direction::MOVES {
        let cell = candidate.apply(percept.position);
        if !percept.in_bounds(cell) {
            continue;
        }
        let key = (percept.knows_hazard_at(cell), visits.last_visit(cell));
        match best_key {
            Some(best) if key > best => {}
            Some(best) if key == best => frontier.push(candidate),
            _ => {
                best_key = Some(key);
                frontier.clear();
                frontier.push(candidate);
            }
        }
    }

    let direction = match frontier.len() {
        0 => Direction::Stay,
        1 => frontier[0],
        n => frontier[rng.gen_range(0..n)],
    };
    Decision::new(direction, DecisionBasis::ExplorerFrontier)
}

/// Cooperative: act on shared knowledge, trusting a peer report by
/// `peer_weight x freshness x that peer's delivery reliability`.
pub fn cooperative(
    percept: &Percept,
    behavior: &BehaviorConfig,
    staleness_discount: f64,
    rng: &mut SmallRng,
) -> Decision {
    let fallback = |rng: &mut SmallRng| {
        blend(percept, behavior, DecisionBasis::CooperativeFallback)
            .unwrap_or_else(|| wander(percept, rng))
    };
    if percept.inbox.is_empty() {
        return fallback(rng);
    }

    let mut best: Option<(f64, Cell)> = None;
    for sighting in percept.memory.resources() {
        let weight = match sighting.source {
            SightingSource::Own => 1.0,
            SightingSource::Peer(peer) => {
                behavior.peer_weight
                    * staleness_discount.powi(age_exponent(sighting, percept.tick))
                    * percept.history.peer_rate(peer)
            }
        };
        let distance = sighting.cell.chebyshev(&percept.position) as f64;
        let score = weight * sighting.magnitude - behavior.distance_discount * distance;
        if best.map_or(true, |(top, _)| score > top) {
            best = Some((score, sighting.cell));
        }
    }

    match best {
        Some((_, target)) => step_around_hazards(
            percept,
            target,
            DecisionBasis::CooperativeShared,
            DecisionBasis::CooperativeShared,
        ),
        None => fallback(rng),
    }
}
