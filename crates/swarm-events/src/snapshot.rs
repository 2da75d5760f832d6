//! Snapshot Types
//!
//! Serialization structs for world snapshots and run summaries.
//!
//! Snapshots capture the observable state of a run at a point in time and are
//! the only view external collaborators (UI, analysis, export) get of the
//! engine. Summaries are produced once, at the end of a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::event::{Cell, StrategyKind};

/// Agent state visible to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: u32,
    pub strategy: StrategyKind,
    pub position: Cell,
    pub score: f64,
    pub delivery_rate: f64,
}

/// A resource or hazard on the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub position: Cell,
    /// Resource value or hazard severity
    pub magnitude: f64,
    #[serde(default)]
    pub mobile: bool,
}

/// Full observable state at the end of a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub episode: u32,
    pub world_size: u32,
    pub agents: Vec<AgentSnapshot>,
    pub resources: Vec<ItemSnapshot>,
    pub hazards: Vec<ItemSnapshot>,
}

impl WorldSnapshot {
    /// Sum of all agent scores.
    pub fn total_score(&self) -> f64 {
        self.agents.iter().map(|a| a.score).sum()
    }

    pub fn agent(&self, agent_id: u32) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }
}

/// One row of a learned value table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QEntry {
    /// Discretized state label, e.g. `r=(+2,-1) h=none d=3`
    pub state: String,
    /// One value per action, in direction order
    pub values: Vec<f64>,
}

/// Final learner state, kept for reproducibility and offline inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerSummary {
    pub epsilon: f64,
    pub episodes_completed: u32,
    pub updates: u64,
    pub table: Vec<QEntry>,
}

/// Per-agent end-of-run figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_id: u32,
    pub strategy: StrategyKind,
    pub final_score: f64,
    pub resources_collected: u64,
    pub hazard_contacts: u64,
    pub messages_generated: u64,
    pub messages_delivered: u64,
    pub delivery_rate: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub peer_delivery_rates: BTreeMap<u32, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner: Option<LearnerSummary>,
}

/// Aggregate outcome metrics for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub ticks: u64,
    pub resources_collected: u64,
    pub hazard_contacts: u64,
    pub total_score: f64,
    /// Total score divided by agent count
    pub coordination_efficiency: f64,
    pub messages_generated: u64,
    pub messages_delivered: u64,
    pub messages_failed_encoding: u64,
    pub bits_delivered: u64,
    /// Delivered / generated, 0.0 when nothing was generated
    pub message_delivery_rate: f64,
    /// (resources collected - hazard contacts) per tick
    pub net_efficiency: f64,
}

/// Run-level summary record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_bits: Option<u64>,
    pub episodes: u32,
    pub stats: RunStats,
    pub agents: Vec<AgentSummary>,
}

impl RunSummary {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> WorldSnapshot {
        WorldSnapshot {
            tick: 3,
            episode: 0,
            world_size: 10,
            agents: vec![
                AgentSnapshot {
                    agent_id: 0,
                    strategy: StrategyKind::Greedy,
                    position: Cell::new(1, 1),
                    score: 10.0,
                    delivery_rate: 1.0,
                },
                AgentSnapshot {
                    agent_id: 1,
                    strategy: StrategyKind::Cautious,
                    position: Cell::new(5, 2),
                    score: -5.0,
                    delivery_rate: 0.5,
                },
            ],
            resources: vec![ItemSnapshot { position: Cell::new(9, 9), magnitude: 10.0, mobile: false }],
            hazards: vec![],
        }
    }

    #[test]
    fn test_snapshot_totals() {
        let snapshot = sample_snapshot();
        assert_eq!(snapshot.total_score(), 5.0);
        assert_eq!(snapshot.agent(1).map(|a| a.strategy), Some(StrategyKind::Cautious));
        assert!(snapshot.agent(7).is_none());
    }

    #[test]
    fn test_summary_skips_empty_fields() {
        let summary = RunSummary {
            seed: 42,
            bandwidth_bits: None,
            episodes: 1,
            stats: RunStats::default(),
            agents: vec![AgentSummary {
                agent_id: 0,
                strategy: StrategyKind::Greedy,
                final_score: 0.0,
                resources_collected: 0,
                hazard_contacts: 0,
                messages_generated: 0,
                messages_delivered: 0,
                delivery_rate: 1.0,
                peer_delivery_rates: BTreeMap::new(),
                learner: None,
            }],
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("bandwidth_bits"));
        assert!(!json.contains("peer_delivery_rates"));
        assert!(!json.contains("learner"));
        let parsed: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }
}
