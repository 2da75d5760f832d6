//! Statistics Output
//!
//! Per-agent summaries and run-level statistics for a finished (or
//! in-progress) run.

use bevy_ecs::prelude::*;

use swarm_events::{AgentSummary, RunStats, RunSummary};

use crate::components::agent::{Agent, AgentId, AgentStats, DeliveryHistory, Score};
use crate::config::SimConfig;
use crate::router::{MessageRouter, RouterTotals};
use crate::strategy::Strategy;

/// Per-agent totals, ascending id.
pub fn agent_summaries(world: &World) -> Vec<AgentSummary> {
    let mut summaries: Vec<AgentSummary> = world
        .iter_entities()
        .filter(|entity| entity.contains::<Agent>())
        .filter_map(|entity| {
            let strategy = entity.get::<Strategy>()?;
            let stats = entity.get::<AgentStats>()?;
            let history = entity.get::<DeliveryHistory>()?;
            Some(AgentSummary {
                agent_id: entity.get::<AgentId>()?.0,
                strategy: strategy.kind(),
                final_score: entity.get::<Score>()?.total(),
                resources_collected: stats.resources_collected,
                hazard_contacts: stats.hazard_contacts,
                messages_generated: stats.messages_generated,
                messages_delivered: stats.messages_delivered,
                delivery_rate: history.rate(),
                peer_delivery_rates: history.peer_rates(),
                learner: strategy.learner().map(|l| l.summary()),
            })
        })
        .collect();
    summaries.sort_by_key(|s| s.agent_id);
    summaries
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Aggregates agent summaries and router totals over `ticks` ticks.
pub fn run_stats(agents: &[AgentSummary], router: &RouterTotals, ticks: u64) -> RunStats {
    let resources_collected: u64 = agents.iter().map(|a| a.resources_collected).sum();
    let hazard_contacts: u64 = agents.iter().map(|a| a.hazard_contacts).sum();
    let total_score: f64 = agents.iter().map(|a| a.final_score).sum();
    let messages_generated: u64 = agents.iter().map(|a| a.messages_generated).sum();
    let messages_delivered: u64 = agents.iter().map(|a| a.messages_delivered).sum();

    RunStats {
        ticks,
        resources_collected,
        hazard_contacts,
        total_score,
        coordination_efficiency: ratio(total_score, agents.len() as f64),
        messages_generated,
        messages_delivered,
        messages_failed_encoding: router.encoding_failures,
        bits_delivered: router.bits_delivered,
        message_delivery_rate: ratio(messages_delivered as f64, messages_generated as f64),
        net_efficiency: ratio(
            resources_collected as f64 - hazard_contacts as f64,
            ticks as f64,
        ),
    }
}

/// Full summary of the run held in `world`.
pub fn run_summary(world: &World, config: &SimConfig, ticks: u64) -> RunSummary {
    let agents = agent_summaries(world);
    let totals = world.resource::<MessageRouter>().totals();
    RunSummary {
        seed: config.seed,
        bandwidth_bits: config.bandwidth_bits,
        episodes: config.episode_count,
        stats: run_stats(&agents, &totals, ticks),
        agents,
    }
}
