//! World Snapshots
//!
//! Read-only views of the grid and the agents for external consumers.

use bevy_ecs::prelude::*;
use std::fs;
use std::path::Path;

use swarm_events::{AgentSnapshot, WorldSnapshot};

use crate::components::agent::{Agent, AgentId, DeliveryHistory, Position, Score};
use crate::components::world::GridWorld;
use crate::error::SimError;
use crate::strategy::Strategy;
use crate::SimClock;

/// Generate a complete world snapshot. Reads components through
/// `EntityRef` so the world is never borrowed mutably.
pub fn generate_snapshot(world: &World) -> WorldSnapshot {
    let clock = *world.resource::<SimClock>();

    let mut agents: Vec<AgentSnapshot> = world
        .iter_entities()
        .filter(|entity| entity.contains::<Agent>())
        .filter_map(|entity| {
            let history = entity.get::<DeliveryHistory>()?;
            Some(AgentSnapshot {
                agent_id: entity.get::<AgentId>()?.0,
                strategy: entity.get::<Strategy>()?.kind(),
                position: entity.get::<Position>()?.0,
                score: entity.get::<Score>()?.total(),
                delivery_rate: history.rate(),
            })
        })
        .collect();
    agents.sort_by_key(|a| a.agent_id);

    let grid = world.resource::<GridWorld>();
    WorldSnapshot {
        tick: clock.tick,
        episode: clock.episode,
        world_size: grid.size(),
        agents,
        resources: grid.resource_snapshots(),
        hazards: grid.hazard_snapshots(),
    }
}

/// Write a snapshot to a file
pub fn write_snapshot(snapshot: &WorldSnapshot, path: impl AsRef<Path>) -> Result<(), SimError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;
    Ok(())
}
