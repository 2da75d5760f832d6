//! Perception System
//!
//! Refreshes each agent's memory from what it can see and from the messages
//! routed to it during the previous tick.

use bevy_ecs::prelude::*;

use swarm_events::Cell;

use crate::components::agent::{Agent, Inbox, Memory, Position, TickLedger, Vision};
use crate::components::message::{Sighting, SightingKind, SightingSource};
use crate::components::world::GridWorld;
use crate::{RunConfig, SimClock};

/// Everything within Chebyshev `radius` of `center`, as first-hand sightings.
pub fn visible_sightings(grid: &GridWorld, center: Cell, radius: u32, now: u64) -> Vec<Sighting> {
    let resources = grid.resources_within(center, radius).into_iter().map(|(cell, site)| Sighting {
        kind: SightingKind::Resource,
        cell,
        magnitude: site.value,
        observed_tick: now,
        source: SightingSource::Own,
    });
    let hazards = grid.hazards_within(center, radius).into_iter().map(|(cell, site)| Sighting {
        kind: SightingKind::Hazard,
        cell,
        magnitude: site.severity,
        observed_tick: now,
        source: SightingSource::Own,
    });
    resources.chain(hazards).collect()
}

/// System: start the tick for every agent.
///
/// Last tick's deliveries become readable, peer reports are merged into
/// memory, direct sight overrides anything remembered inside the field of
/// view, and sightings past their time to live are forgotten.
pub fn perceive(
    clock: Res<SimClock>,
    config: Res<RunConfig>,
    grid: Res<GridWorld>,
    mut agents: Query<(&Position, &Vision, &mut Inbox, &mut Memory, &mut TickLedger), With<Agent>>,
) {
    let now = clock.tick;
    let ttl = config.0.messaging.memory_ttl;
    for (position, vision, mut inbox, mut memory, mut ledger) in agents.iter_mut() {
        ledger.begin_tick();
        inbox.roll_over();
        for message in inbox.current() {
            for report in &message.reports {
                memory.merge_report(report.sighting, message.sender);
            }
        }
        let visible = visible_sightings(&grid, position.0, vision.0, now);
        memory.observe(position.0, vision.0, &visible);
        memory.expire(now, ttl);
    }
}
