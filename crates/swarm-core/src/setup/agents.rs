//! Agent Spawning
//!
//! Apportions strategies across the population, spawns agent entities and
//! re-places them at episode boundaries.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use std::collections::BTreeMap;

use swarm_events::StrategyKind;

use crate::components::agent::{
    Agent, AgentId, AgentStats, DeliveryHistory, Inbox, Memory, Position, Score, TickLedger,
    Vision,
};
use crate::components::world::GridWorld;
use crate::config::SimConfig;
use crate::error::ConfigError;
use crate::strategy::{Intent, Strategy};

use super::world::random_open_cell;

/// Largest-remainder apportionment of `num_agents` over the normalized
/// strategy mix. Returned in strategy order, so ids are grouped by kind.
pub fn assign_strategies(config: &SimConfig) -> Result<Vec<StrategyKind>, ConfigError> {
    let mix = config.normalized_mix()?;
    let n = config.num_agents;

    let mut counts: Vec<(StrategyKind, usize, f64)> = mix
        .iter()
        .map(|(kind, share)| {
            let exact = share * n as f64;
            let whole = exact.floor() as usize;
            (*kind, whole, exact - whole as f64)
        })
        .collect();

    let assigned: usize = counts.iter().map(|(_, whole, _)| whole).sum();
    let mut by_remainder: Vec<usize> = (0..counts.len()).collect();
    by_remainder.sort_by(|a, b| counts[*b].2.total_cmp(&counts[*a].2));
    for slot in by_remainder.into_iter().take(n.saturating_sub(assigned)) {
        counts[slot].1 += 1;
    }

    Ok(counts
        .into_iter()
        .flat_map(|(kind, count, _)| std::iter::repeat(kind).take(count))
        .collect())
}

/// Spawns the whole population with ids `0..num_agents`.
pub fn spawn_all_agents(
    world: &mut World,
    config: &SimConfig,
    grid: &GridWorld,
    rng: &mut SmallRng,
) -> Result<(), ConfigError> {
    for (index, kind) in assign_strategies(config)?.into_iter().enumerate() {
        let position = random_open_cell(grid, rng);
        world.spawn((
            Agent,
            AgentId(index as u32),
            Position(position),
            Vision(config.vision_radius),
            Score::default(),
            Intent::default(),
            Memory::default(),
            Inbox::default(),
            DeliveryHistory::new(config.messaging.delivery_window),
            AgentStats::default(),
            TickLedger::default(),
            Strategy::new(kind, &config.learning),
        ));
    }
    Ok(())
}

/// Moves every agent to a fresh open cell, in ascending id order.
pub fn reposition_agents(world: &mut World, grid: &GridWorld, rng: &mut SmallRng) {
    let mut query = world.query_filtered::<(&AgentId, &mut Position), With<Agent>>();
    let mut agents: Vec<_> = query.iter_mut(world).collect();
    agents.sort_by_key(|(id, _)| **id);
    for (_, mut position) in agents {
        position.0 = random_open_cell(grid, rng);
    }
}

/// Summary of spawned agents
#[derive(Debug, Clone, Default)]
pub struct SpawnSummary {
    pub total_agents: u32,
    pub by_strategy: BTreeMap<StrategyKind, u32>,
}

/// Get summary statistics about spawned agents
pub fn get_spawn_summary(world: &mut World) -> SpawnSummary {
    let mut summary = SpawnSummary::default();
    let mut query = world.query_filtered::<&Strategy, With<Agent>>();
    for strategy in query.iter(world) {
        summary.total_agents += 1;
        *summary.by_strategy.entry(strategy.kind()).or_insert(0) += 1;
    }
    summary
}

impl std::fmt::Display for SpawnSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} agents", self.total_agents)?;
        for (kind, count) in &self.by_strategy {
            write!(f, ", {} {}", count, kind)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn count(kinds: &[StrategyKind], kind: StrategyKind) -> usize {
        kinds.iter().filter(|k| **k == kind).count()
    }

    #[test]
    fn test_largest_remainder_apportionment() {
        let mut config = SimConfig { num_agents: 8, ..SimConfig::default() };
        // Five strategies at 0.2 each: 1.6 agents per kind
        let kinds = assign_strategies(&config).unwrap();
        assert_eq!(kinds.len(), 8);
        for kind in [
            StrategyKind::Greedy,
            StrategyKind::Cautious,
            StrategyKind::Balanced,
        ] {
            assert_eq!(count(&kinds, kind), 2);
        }
        assert_eq!(count(&kinds, StrategyKind::Explorer), 1);
        assert_eq!(count(&kinds, StrategyKind::Cooperative), 1);

        config.strategy_mix = BTreeMap::from([
            (StrategyKind::Greedy, 3.0),
            (StrategyKind::QLearning, 1.0),
        ]);
        config.num_agents = 7;
        let kinds = assign_strategies(&config).unwrap();
        assert_eq!(count(&kinds, StrategyKind::Greedy), 5);
        assert_eq!(count(&kinds, StrategyKind::QLearning), 2);
        assert_eq!(kinds[0], StrategyKind::Greedy);
    }

    #[test]
    fn test_spawned_agents_avoid_hazards() {
        let config = SimConfig {
            world_size: 4,
            num_agents: 10,
            resource_count: 0,
            hazard_count: 0,
            ..SimConfig::default()
        }
        .with_uniform_strategy(StrategyKind::Cautious);
        let mut grid = GridWorld::new(4);
        for x in 0..4 {
            for y in 0..3 {
                grid.place_hazard(
                    swarm_events::Cell::new(x, y),
                    crate::components::world::HazardSite { severity: 1.0, mobility: None },
                )
                .unwrap();
            }
        }
        let mut world = World::new();
        let mut rng = SmallRng::seed_from_u64(1);
        spawn_all_agents(&mut world, &config, &grid, &mut rng).unwrap();

        let mut query = world.query::<(&AgentId, &Position)>();
        for (_, position) in query.iter(&world) {
            assert_eq!(position.0.y, 3);
        }
        let summary = get_spawn_summary(&mut world);
        assert_eq!(summary.total_agents, 10);
        assert_eq!(summary.by_strategy.get(&StrategyKind::Cautious), Some(&10));
    }
}
