//! Decision System
//!
//! Each agent's strategy picks a direction, then the agent may offer one
//! message to the router subject to self-censorship.

use bevy_ecs::prelude::*;

use crate::components::agent::{Agent, AgentId, DeliveryHistory, Inbox, Memory, Position, TickLedger};
use crate::components::world::GridWorld;
use crate::messaging;
use crate::strategy::{Intent, Percept, Strategy};
use crate::{RunConfig, SimClock, SimRng};

/// System: decide and propose, in ascending agent id order.
#[allow(clippy::type_complexity)]
pub fn decide(
    clock: Res<SimClock>,
    config: Res<RunConfig>,
    grid: Res<GridWorld>,
    mut rng: ResMut<SimRng>,
    mut agents: Query<
        (
            &AgentId,
            &Position,
            &Memory,
            &Inbox,
            &DeliveryHistory,
            &mut Strategy,
            &mut Intent,
            &mut TickLedger,
        ),
        With<Agent>,
    >,
) {
    let mut ordered: Vec<_> = agents.iter_mut().collect();
    ordered.sort_by_key(|(id, ..)| **id);

    for (id, position, memory, inbox, history, mut strategy, mut intent, mut ledger) in ordered {
        let percept = Percept {
            tick: clock.tick,
            agent: id.0,
            position: position.0,
            world_size: grid.size(),
            memory,
            inbox: inbox.current(),
            history,
            last_reward: ledger.last_reward,
        };
        let decision = strategy.decide(&percept, &config.0, &mut rng.0);
        intent.0 = decision.direction;
        ledger.decision = Some(decision.basis);
        ledger.outgoing =
            messaging::propose(strategy.kind(), &percept, &config.0.messaging, &mut rng.0);
    }
}
