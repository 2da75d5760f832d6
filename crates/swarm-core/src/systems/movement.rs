//! Movement System
//!
//! Applies each agent's intent, clamped to the world, and resolves what it
//! lands on. This is the only place a score changes.

use bevy_ecs::prelude::*;

use crate::components::agent::{Agent, AgentId, AgentStats, Position, Score, TickLedger};
use crate::components::world::GridWorld;
use crate::strategy::Intent;
use crate::{RunConfig, SimRng};

/// System: move and resolve contacts in ascending agent id order, so the
/// lower id wins a resource two agents reach on the same tick.
#[allow(clippy::type_complexity)]
pub fn apply_movement(
    config: Res<RunConfig>,
    mut grid: ResMut<GridWorld>,
    mut rng: ResMut<SimRng>,
    mut agents: Query<
        (
            &AgentId,
            &Intent,
            &mut Position,
            &mut Score,
            &mut TickLedger,
            &mut AgentStats,
        ),
        With<Agent>,
    >,
) {
    let removal_probability = config.0.world.hazard_removal_probability;
    let mut ordered: Vec<_> = agents.iter_mut().collect();
    ordered.sort_by_key(|(id, ..)| **id);

    for (id, intent, mut position, mut score, mut ledger, mut stats) in ordered {
        let target = grid.clamp(intent.0.apply(position.0));
        position.0 = target;

        let contact = grid.touch(target, removal_probability, &mut rng.0);
        if let Some(value) = contact.collected {
            score.credit(value);
            ledger.score_delta += value;
            stats.resources_collected += 1;
        }
        if let Some(severity) = contact.hazard {
            score.penalize(severity);
            ledger.score_delta -= severity;
            stats.hazard_contacts += 1;
            if contact.hazard_removed {
                tracing::trace!(agent = id.0, cell = %target, "hazard removed on contact");
            }
        }
    }
}
