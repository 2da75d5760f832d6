//! Routing System
//!
//! Collects this tick's candidate messages, runs them through the router
//! and applies the outcome: ledgers, counters, delivery windows, and the
//! inboxes that will be read next tick.

use bevy_ecs::prelude::*;

use swarm_events::MessageOutcome;

use crate::components::agent::{Agent, AgentId, AgentStats, DeliveryHistory, Inbox, TickLedger};
use crate::components::message::Message;
use crate::router::MessageRouter;
use crate::SimClock;

/// System: one routing pass per tick.
#[allow(clippy::type_complexity)]
pub fn route_messages(
    clock: Res<SimClock>,
    mut router: ResMut<MessageRouter>,
    mut agents: Query<
        (
            &AgentId,
            &mut TickLedger,
            &mut DeliveryHistory,
            &mut Inbox,
            &mut AgentStats,
        ),
        With<Agent>,
    >,
) {
    let mut ordered: Vec<_> = agents.iter_mut().collect();
    ordered.sort_by_key(|(id, ..)| **id);

    let candidates: Vec<Message> = ordered
        .iter_mut()
        .filter_map(|(_, ledger, ..)| ledger.outgoing.take())
        .collect();
    let report = router.route(clock.tick, candidates);

    for (id, ledger, history, inbox, stats) in ordered.iter_mut() {
        let me = id.0;
        if let Some(outcome) = report.outcome_for(me) {
            stats.messages_generated += 1;
            match outcome {
                MessageOutcome::Delivered { .. } => {
                    stats.messages_delivered += 1;
                    history.record_own(true);
                }
                MessageOutcome::DroppedOverBudget { .. } => history.record_own(false),
                MessageOutcome::EncodingFailed { .. } => stats.encoding_failures += 1,
                MessageOutcome::None => {}
            }
            ledger.outcome = outcome.clone();
        }

        for (sender, outcome) in &report.outcomes {
            if *sender == me {
                continue;
            }
            match outcome {
                MessageOutcome::Delivered { .. } => history.record_peer(*sender, true),
                MessageOutcome::DroppedOverBudget { .. } => history.record_peer(*sender, false),
                _ => {}
            }
        }

        for message in report.delivered.iter().filter(|m| m.sender != me) {
            inbox.deliver(message.clone());
        }
    }
}
