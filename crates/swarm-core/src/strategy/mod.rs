//! Decision Strategies
//!
//! The closed set of policies an agent can follow. Each agent entity owns
//! exactly one `Strategy` component together with whatever per-agent state
//! that policy needs (a sticky target, a visit log, a Q-table).

pub mod heuristics;
pub mod learning;

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;

use swarm_events::{Cell, DecisionBasis, StrategyKind};

use crate::components::agent::{DeliveryHistory, Memory};
use crate::components::message::Message;
use crate::config::{LearningConfig, SimConfig};

pub use heuristics::{CautiousState, VisitLog};
pub use learning::{QLearner, QState, QTable};

/// One of the nine moves available each tick. `y` grows southwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Stay,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const ALL: [Direction; 9] = [
        Direction::Stay,
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// The eight actual moves, without `Stay`.
    pub const MOVES: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Stay => (0, 0),
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
        }
    }

    pub fn index(self) -> usize {
        Direction::ALL.iter().position(|d| *d == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Direction {
        Direction::ALL.get(index).copied().unwrap_or(Direction::Stay)
    }

    /// Direction for a step of (`dx`, `dy`), each component clamped to {-1, 0, 1}.
    pub fn from_delta(dx: i32, dy: i32) -> Direction {
        match (dx.signum(), dy.signum()) {
            (0, -1) => Direction::North,
            (1, -1) => Direction::NorthEast,
            (1, 0) => Direction::East,
            (1, 1) => Direction::SouthEast,
            (0, 1) => Direction::South,
            (-1, 1) => Direction::SouthWest,
            (-1, 0) => Direction::West,
            (-1, -1) => Direction::NorthWest,
            _ => Direction::Stay,
        }
    }

    /// First step of a shortest king-move path from `from` to `to`.
    pub fn toward(from: Cell, to: Cell) -> Direction {
        let (dx, dy) = from.offset_to(&to);
        Direction::from_delta(dx, dy)
    }

    /// Quantizes a continuous vector into one of eight 45-degree sectors.
    /// Vectors too short to have a heading map to `Stay`.
    pub fn from_vector(dx: f64, dy: f64) -> Direction {
        let norm = dx.hypot(dy);
        if !norm.is_finite() || norm < 1e-9 {
            return Direction::Stay;
        }
        // sin(22.5 deg): beyond this the component counts as a step
        const SECTOR: f64 = 0.382_683_432_365_089_8;
        let axis = |c: f64| {
            let unit = c / norm;
            if unit > SECTOR {
                1
            } else if unit < -SECTOR {
                -1
            } else {
                0
            }
        };
        Direction::from_delta(axis(dx), axis(dy))
    }

    pub fn apply(self, cell: Cell) -> Cell {
        let (dx, dy) = self.delta();
        cell.shifted(dx, dy)
    }
}

/// Component: direction chosen this tick, applied by the movement system
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent(pub Direction);

impl Default for Intent {
    fn default() -> Self {
        Intent(Direction::Stay)
    }
}

/// A strategy's choice for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub direction: Direction,
    pub basis: DecisionBasis,
}

impl Decision {
    pub fn new(direction: Direction, basis: DecisionBasis) -> Self {
        Self { direction, basis }
    }
}

/// Everything an agent may consult when deciding.
#[derive(Debug, Clone, Copy)]
pub struct Percept<'a> {
    pub tick: u64,
    pub agent: u32,
    pub position: Cell,
    pub world_size: u32,
    pub memory: &'a Memory,
    /// Messages delivered by the previous tick's routing pass
    pub inbox: &'a [Message],
    pub history: &'a DeliveryHistory,
    /// Score delta of the previous tick
    pub last_reward: f64,
}

impl Percept<'_> {
    pub fn in_bounds(&self, cell: Cell) -> bool {
        let max = self.world_size as i32;
        cell.x >= 0 && cell.y >= 0 && cell.x < max && cell.y < max
    }

    pub fn delivery_rate(&self) -> f64 {
        self.history.rate()
    }

    pub fn knows_hazard_at(&self, cell: Cell) -> bool {
        self.memory.hazards().any(|h| h.cell == cell)
    }
}

/// Component: an agent's decision policy and its private state
#[derive(Component, Debug, Clone)]
pub enum Strategy {
    Greedy,
    Cautious(CautiousState),
    Balanced,
    Explorer(VisitLog),
    Cooperative,
    QLearning(Box<QLearner>),
}

impl Strategy {
    pub fn new(kind: StrategyKind, learning: &LearningConfig) -> Self {
        match kind {
            StrategyKind::Greedy => Strategy::Greedy,
            StrategyKind::Cautious => Strategy::Cautious(CautiousState::default()),
            StrategyKind::Balanced => Strategy::Balanced,
            StrategyKind::Explorer => Strategy::Explorer(VisitLog::default()),
            StrategyKind::Cooperative => Strategy::Cooperative,
            StrategyKind::QLearning => Strategy::QLearning(Box::new(QLearner::new(learning))),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Greedy => StrategyKind::Greedy,
            Strategy::Cautious(_) => StrategyKind::Cautious,
            Strategy::Balanced => StrategyKind::Balanced,
            Strategy::Explorer(_) => StrategyKind::Explorer,
            Strategy::Cooperative => StrategyKind::Cooperative,
            Strategy::QLearning(_) => StrategyKind::QLearning,
        }
    }

    /// Chooses this tick's move.
    pub fn decide(&mut self, percept: &Percept, config: &SimConfig, rng: &mut SmallRng) -> Decision {
        let behavior = &config.behavior;
        match self {
            Strategy::Greedy => heuristics::greedy(percept, behavior, rng),
            Strategy::Cautious(state) => heuristics::cautious(state, percept, behavior, rng),
            Strategy::Balanced => heuristics::balanced(percept, behavior, rng),
            Strategy::Explorer(visits) => heuristics::explorer(visits, percept, rng),
            Strategy::Cooperative => {
                heuristics::cooperative(percept, behavior, config.messaging.staleness_discount, rng)
            }
            Strategy::QLearning(learner) => learner.decide(percept, rng),
        }
    }

    pub fn learner(&self) -> Option<&QLearner> {
        match self {
            Strategy::QLearning(learner) => Some(&**learner),
            _ => None,
        }
    }

    /// Closes the episode: learners flush their pending transition and
    /// decay exploration, heuristics drop per-episode state.
    pub(crate) fn end_episode(&mut self, final_reward: f64) {
        match self {
            Strategy::QLearning(learner) => learner.end_episode(final_reward),
            Strategy::Cautious(state) => *state = CautiousState::default(),
            Strategy::Explorer(visits) => visits.clear(),
            Strategy::Greedy | Strategy::Balanced | Strategy::Cooperative => {}
        }
    }
}

/// Random in-bounds step. `Stay` only when no move stays inside the world.
pub(crate) fn wander(percept: &Percept, rng: &mut SmallRng) -> Decision {
    let options: Vec<Direction> = Direction::MOVES
        .iter()
        .copied()
        .filter(|d| percept.in_bounds(d.apply(percept.position)))
        .collect();
    let direction = if options.is_empty() {
        Direction::Stay
    } else {
        options[rng.gen_range(0..options.len())]
    };
    Decision::new(direction, DecisionBasis::Wander)
}
