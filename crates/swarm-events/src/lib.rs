//! Shared record types and serialization for the swarm simulation.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is the interface between the engine and its collaborators
//! (dashboards, exporters, statistical analysis).

pub mod event;
pub mod snapshot;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

// Re-export event types
pub use event::{
    Cell, DecisionBasis, MessageOutcome, StrategyKind, TickRecord, UnknownStrategy,
};

// Re-export snapshot types
pub use snapshot::{
    AgentSnapshot, AgentSummary, ItemSnapshot, LearnerSummary, QEntry, RunStats, RunSummary,
    WorldSnapshot,
};
