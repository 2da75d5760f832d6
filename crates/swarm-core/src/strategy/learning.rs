//! Tabular Q-Learning
//!
//! A per-agent learner over a coarse discretization of the percept. The
//! table is owned by exactly one agent, grows monotonically and survives
//! episode boundaries; only ε decays between episodes.

use rand::rngs::SmallRng;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;

use swarm_events::{Cell, DecisionBasis, LearnerSummary, QEntry};

use crate::config::LearningConfig;

use super::{Decision, Direction, Percept};

/// Size of the action space: stay plus eight compass moves.
pub const ACTIONS: usize = Direction::ALL.len();

/// Number of delivery-rate buckets in the state.
pub const DELIVERY_BUCKETS: u8 = 4;

/// Discretized percept.
///
/// Offsets to the nearest known resource and hazard are bucketed per axis
/// into {-2, -1, 0, 1, 2}: 0 for the same column/row, ±1 for one or two
/// cells away, ±2 for three or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QState {
    pub resource: Option<(i8, i8)>,
    pub hazard: Option<(i8, i8)>,
    pub delivery: u8,
}

fn bucket(offset: i32) -> i8 {
    let magnitude: i8 = match offset.unsigned_abs() {
        0 => 0,
        1 | 2 => 1,
        _ => 2,
    };
    magnitude * offset.signum() as i8
}

fn delivery_bucket(rate: f64) -> u8 {
    let rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
    ((rate * DELIVERY_BUCKETS as f64) as u8).min(DELIVERY_BUCKETS - 1)
}

fn nearest<'a>(from: Cell, cells: impl Iterator<Item = &'a Cell>) -> Option<(i8, i8)> {
    cells.min_by_key(|c| c.chebyshev(&from)).map(|c| {
        let (dx, dy) = from.offset_to(c);
        (bucket(dx), bucket(dy))
    })
}

impl QState {
    pub fn observe(percept: &Percept) -> Self {
        let position = percept.position;
        Self {
            resource: nearest(position, percept.memory.resources().map(|s| &s.cell)),
            hazard: nearest(position, percept.memory.hazards().map(|s| &s.cell)),
            delivery: delivery_bucket(percept.delivery_rate()),
        }
    }
}

impl fmt::Display for QState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offset = |o: Option<(i8, i8)>| match o {
            Some((x, y)) => format!("({:+},{:+})", x, y),
            None => "none".to_string(),
        };
        write!(
            f,
            "r={} h={} d={}",
            offset(self.resource),
            offset(self.hazard),
            self.delivery
        )
    }
}

/// `(state, action) -> value`, zero-initialized on first visit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    values: BTreeMap<QState, [f64; ACTIONS]>,
}

impl QTable {
    pub fn get(&self, state: &QState) -> Option<&[f64; ACTIONS]> {
        self.values.get(state)
    }

    pub fn value(&self, state: &QState, action: usize) -> f64 {
        self.values
            .get(state)
            .and_then(|row| row.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Highest action value in `state`; 0.0 for an unvisited state.
    pub fn max_value(&self, state: &QState) -> f64 {
        self.values
            .get(state)
            .map(|row| row.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            .unwrap_or(0.0)
    }

    /// Index of the best action; ties go to the lowest index.
    pub fn best_action(&self, state: &QState) -> usize {
        let Some(row) = self.values.get(state) else {
            return 0;
        };
        let mut best = 0;
        for (action, value) in row.iter().enumerate() {
            if *value > row[best] {
                best = action;
            }
        }
        best
    }

    fn row_mut(&mut self, state: QState) -> &mut [f64; ACTIONS] {
        self.values.entry(state).or_insert([0.0; ACTIONS])
    }

    /// Number of visited states.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QState, &[f64; ACTIONS])> {
        self.values.iter()
    }
}

/// ε-greedy Q-learner with updates deferred until the next state is seen.
#[derive(Debug, Clone, PartialEq)]
pub struct QLearner {
    table: QTable,
    alpha: f64,
    gamma: f64,
    epsilon: f64,
    epsilon_decay: f64,
    epsilon_min: f64,
    /// Last (state, action) still waiting for its reward and successor
    pending: Option<(QState, usize)>,
    episodes_completed: u32,
    updates: u64,
}

impl QLearner {
    pub fn new(config: &LearningConfig) -> Self {
        Self {
            table: QTable::default(),
            alpha: config.alpha,
            gamma: config.gamma,
            epsilon: config.epsilon_start,
            epsilon_decay: config.epsilon_decay,
            epsilon_min: config.epsilon_min,
            pending: None,
            episodes_completed: 0,
            updates: 0,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn episodes_completed(&self) -> u32 {
        self.episodes_completed
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn decide(&mut self, percept: &Percept, rng: &mut SmallRng) -> Decision {
        let state = QState::observe(percept);
        if let Some((previous, action)) = self.pending.take() {
            self.update(previous, action, percept.last_reward, Some(state));
        }
        self.table.row_mut(state);

        let (action, basis) = if rng.gen::<f64>() < self.epsilon {
            (rng.gen_range(0..ACTIONS), DecisionBasis::QExplore)
        } else {
            (self.table.best_action(&state), DecisionBasis::QExploit)
        };
        self.pending = Some((state, action));
        Decision::new(Direction::from_index(action), basis)
    }

    /// `Q(s,a) += α (r + γ max Q(s',·) − Q(s,a))`; a terminal transition
    /// has no successor term.
    fn update(&mut self, state: QState, action: usize, reward: f64, next: Option<QState>) {
        let future = next.map_or(0.0, |s| self.table.max_value(&s));
        let target = reward + self.gamma * future;
        let alpha = self.alpha;
        let q = &mut self.table.row_mut(state)[action];
        *q += alpha * (target - *q);
        self.updates += 1;
    }

    /// Flushes the pending transition as terminal and decays ε once.
    /// ε never rises, even when the floor sits above the current value.
    pub(crate) fn end_episode(&mut self, final_reward: f64) {
        if let Some((state, action)) = self.pending.take() {
            self.update(state, action, final_reward, None);
        }
        let floor = self.epsilon_min.min(self.epsilon);
        self.epsilon = (self.epsilon * self.epsilon_decay).max(floor).min(1.0);
        self.episodes_completed += 1;
    }

    pub fn summary(&self) -> LearnerSummary {
        LearnerSummary {
            epsilon: self.epsilon,
            episodes_completed: self.episodes_completed,
            updates: self.updates,
            table: self
                .table
                .iter()
                .map(|(state, values)| QEntry {
                    state: state.to_string(),
                    values: values.to_vec(),
                })
                .collect(),
        }
    }
}
