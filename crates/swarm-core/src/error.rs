//! Error taxonomy for the simulation core.

use thiserror::Error;

/// Invalid configuration. Always raised before the first tick.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(String),
    #[error("could not parse config: {0}")]
    Parse(String),
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: String },
    #[error("{field} = {value} is outside {range}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        range: &'static str,
    },
    #[error("strategy_mix proportions cannot be normalized: {0}")]
    StrategyMix(String),
    #[error("{field} = {requested} exceeds the {capacity} cells of the world")]
    Overcrowded {
        field: &'static str,
        requested: usize,
        capacity: usize,
    },
}

impl ConfigError {
    pub(crate) fn not_positive(field: &'static str, value: impl ToString) -> Self {
        ConfigError::NotPositive { field, value: value.to_string() }
    }
}

/// A candidate message whose encoded size cannot be computed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessageEncodingError {
    #[error("payload has {0} sightings; the count field holds at most 255")]
    TooManySightings(usize),
    #[error("sighting at ({x}, {y}) is outside the {size}x{size} world")]
    CoordinateOutOfRange { x: i32, y: i32, size: u32 },
    #[error("sighting age {0} exceeds 8-bit field")]
    StaleSighting(u64),
}

/// Everything that can stop a run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Core-logic defect. Fatal; the engine refuses further ticks.
    #[error("state invariant violated at tick {tick}{}: {detail}", agent_suffix(.agent))]
    StateInvariantViolation {
        tick: u64,
        agent: Option<u32>,
        detail: String,
    },

    /// Only ever raised by the encoder; the engine recovers by dropping the message.
    #[error("message encoding failed: {0}")]
    MessageEncoding(#[from] MessageEncodingError),

    #[error("cannot reseed the generator at tick {tick}; determinism is fixed for the run")]
    ReseedAttempt { tick: u64 },

    #[error("event log I/O failed: {0}")]
    Io(String),

    #[error("serialization failed: {0}")]
    Serialize(String),
}

fn agent_suffix(agent: &Option<u32>) -> String {
    agent.map(|id| format!(" (agent {})", id)).unwrap_or_default()
}

impl SimError {
    pub(crate) fn invariant(tick: u64, agent: Option<u32>, detail: impl Into<String>) -> Self {
        SimError::StateInvariantViolation { tick, agent, detail: detail.into() }
    }

    /// Whether the error halts the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SimError::MessageEncoding(_))
    }
}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        SimError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::Serialize(e.to_string())
    }
}
