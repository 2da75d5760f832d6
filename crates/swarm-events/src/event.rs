//! Event Types
//!
//! Per-tick log records emitted by the engine, one per agent per tick.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A grid cell. Coordinates are signed so offsets can be computed directly;
/// the engine guarantees every stored cell lies inside the world bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (king-move) distance, the metric used for vision and movement.
    pub fn chebyshev(&self, other: &Cell) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    /// Offset from `self` to `other`.
    pub fn offset_to(&self, other: &Cell) -> (i32, i32) {
        (other.x - self.x, other.y - self.y)
    }

    pub fn shifted(&self, dx: i32, dy: i32) -> Cell {
        Cell::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The closed set of decision policies an agent can be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Greedy,
    Cautious,
    Balanced,
    Explorer,
    Cooperative,
    #[serde(alias = "q_learning", alias = "qlearning")]
    QLearning,
}

impl StrategyKind {
    /// Returns all strategy variants in declaration order.
    pub fn all() -> &'static [StrategyKind] {
        &[
            StrategyKind::Greedy,
            StrategyKind::Cautious,
            StrategyKind::Balanced,
            StrategyKind::Explorer,
            StrategyKind::Cooperative,
            StrategyKind::QLearning,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Greedy => "greedy",
            StrategyKind::Cautious => "cautious",
            StrategyKind::Balanced => "balanced",
            StrategyKind::Explorer => "explorer",
            StrategyKind::Cooperative => "cooperative",
            StrategyKind::QLearning => "q_learning",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a strategy name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStrategy(pub String);

impl fmt::Display for UnknownStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown strategy '{}'", self.0)
    }
}

impl std::error::Error for UnknownStrategy {}

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "greedy" => Ok(StrategyKind::Greedy),
            "cautious" => Ok(StrategyKind::Cautious),
            "balanced" => Ok(StrategyKind::Balanced),
            "explorer" => Ok(StrategyKind::Explorer),
            "cooperative" => Ok(StrategyKind::Cooperative),
            "q_learning" | "qlearning" | "q-learning" => Ok(StrategyKind::QLearning),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Which branch of a strategy produced the tick's movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBasis {
    /// Nothing known; random step
    Wander,
    /// Stepping toward the best-valued known resource
    GreedyTarget,
    /// Target step blocked by an adjacent hazard; detoured
    GreedyDetour,
    /// Hazard inside the safety radius; moving away
    CautiousFlee,
    /// Drifting toward a sampled known resource
    CautiousDrift,
    /// Attraction/repulsion blend
    BalancedBlend,
    /// Resource within one step; taking it
    ExplorerCollect,
    /// Heading for the least recently visited neighbour
    ExplorerFrontier,
    /// Acting on peer-reported sightings
    CooperativeShared,
    /// Inbox empty; balanced behaviour
    CooperativeFallback,
    /// Random action (epsilon branch)
    QExplore,
    /// Greedy action over the value table
    QExploit,
}

/// What happened to an agent's candidate message this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MessageOutcome {
    /// No message was generated (nothing to say, or self-censored)
    None,
    /// Admitted by the router; visible to peers next tick
    Delivered { bits: u64 },
    /// Generated but did not fit in the remaining budget
    DroppedOverBudget { bits: u64 },
    /// Size could not be computed; dropped before routing
    EncodingFailed { reason: String },
}

impl MessageOutcome {
    pub fn generated(&self) -> bool {
        !matches!(self, MessageOutcome::None)
    }

    pub fn delivered(&self) -> bool {
        matches!(self, MessageOutcome::Delivered { .. })
    }

    pub fn bits(&self) -> Option<u64> {
        match self {
            MessageOutcome::Delivered { bits } | MessageOutcome::DroppedOverBudget { bits } => {
                Some(*bits)
            }
            _ => None,
        }
    }
}

impl Default for MessageOutcome {
    fn default() -> Self {
        MessageOutcome::None
    }
}

/// One structured record per agent per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub tick: u64,
    #[serde(default)]
    pub episode: u32,
    pub agent_id: u32,
    pub strategy: StrategyKind,
    pub position: Cell,
    pub score_delta: f64,
    pub decision: DecisionBasis,
    pub message: MessageOutcome,
}

impl TickRecord {
    pub fn message_generated(&self) -> bool {
        self.message.generated()
    }

    pub fn message_delivered(&self) -> bool {
        self.message.delivered()
    }

    /// Serializes the record to a JSON line (for JSONL format).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a record from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
