//! Sample data fixtures for testing.
//!
//! This module provides ready-made records for other crates to use.
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // swarm-events = { path = "../swarm-events", features = ["test-fixtures"] }
//!
//! use swarm_events::fixtures;
//!
//! let records = fixtures::sample_records();
//! let snapshot = fixtures::sample_snapshot();
//! ```

use crate::{TickRecord, WorldSnapshot};

/// Returns sample tick records from the fixtures file.
///
/// Contains two ticks of four agents (greedy, cautious, cooperative,
/// q-learning) covering every message outcome.
pub fn sample_records() -> Vec<TickRecord> {
    let jsonl = include_str!("../tests/fixtures/sample_ticks.jsonl");
    jsonl
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            TickRecord::from_jsonl(l).unwrap_or_else(|e| {
                panic!("Failed to parse record line: {}\nError: {}", l, e)
            })
        })
        .collect()
}

/// Returns a sample world snapshot from the fixtures file.
///
/// Four agents on a 15x15 grid, two resources (one mobile), one hazard.
pub fn sample_snapshot() -> WorldSnapshot {
    let json = include_str!("../tests/fixtures/sample_state.json");
    serde_json::from_str(json).expect("Failed to parse sample_state.json")
}

/// Returns the sample records for a single tick.
pub fn records_at(tick: u64) -> Vec<TickRecord> {
    sample_records().into_iter().filter(|r| r.tick == tick).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageOutcome;

    #[test]
    fn test_sample_records_load() {
        let records = sample_records();
        assert_eq!(records.len(), 8);
        assert_eq!(records_at(0).len(), 4);
        assert!(records.iter().any(|r| matches!(r.message, MessageOutcome::EncodingFailed { .. })));
    }

    #[test]
    fn test_sample_snapshot_loads() {
        let snapshot = sample_snapshot();
        assert_eq!(snapshot.agents.len(), 4);
        assert_eq!(snapshot.total_score(), 15.0);
        assert!(snapshot.resources.iter().any(|r| r.mobile));
    }
}
