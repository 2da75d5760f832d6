//! Record System
//!
//! Turns each agent's tick ledger into one structured record. The engine
//! drains the records after the schedule runs and hands them to the event log.

use bevy_ecs::prelude::*;

use swarm_events::TickRecord;

use crate::components::agent::{Agent, AgentId, Position, TickLedger};
use crate::error::SimError;
use crate::strategy::Strategy;
use crate::SimClock;

use super::TickFault;

/// Resource: records produced during the current tick
#[derive(Resource, Debug, Default)]
pub struct TickRecords {
    records: Vec<TickRecord>,
}

impl TickRecords {
    pub fn push(&mut self, record: TickRecord) {
        self.records.push(record);
    }

    pub fn drain(&mut self) -> Vec<TickRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// System: one record per agent, ascending id.
pub fn record_tick(
    clock: Res<SimClock>,
    mut records: ResMut<TickRecords>,
    mut fault: ResMut<TickFault>,
    agents: Query<(&AgentId, &Strategy, &Position, &TickLedger), With<Agent>>,
) {
    let mut ordered: Vec<_> = agents.iter().collect();
    ordered.sort_by_key(|(id, ..)| **id);

    for (id, strategy, position, ledger) in ordered {
        let Some(decision) = ledger.decision else {
            fault.raise(SimError::invariant(
                clock.tick,
                Some(id.0),
                "agent finished the tick without a decision",
            ));
            continue;
        };
        records.push(TickRecord {
            tick: clock.tick,
            episode: clock.episode,
            agent_id: id.0,
            strategy: strategy.kind(),
            position: position.0,
            score_delta: ledger.score_delta,
            decision,
            message: ledger.outcome.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningConfig;
    use swarm_events::{Cell, DecisionBasis, StrategyKind};

    #[test]
    fn test_records_sorted_by_agent_id() {
        let mut world = World::new();
        world.insert_resource(SimClock { tick: 3, episode: 1 });
        world.insert_resource(TickRecords::default());
        world.insert_resource(TickFault::default());
        for id in [2, 0, 1] {
            world.spawn((
                Agent,
                AgentId(id),
                Strategy::new(StrategyKind::Greedy, &LearningConfig::default()),
                Position(Cell::new(id as i32, 0)),
                TickLedger {
                    decision: Some(DecisionBasis::Wander),
                    ..TickLedger::default()
                },
            ));
        }

        let mut schedule = Schedule::default();
        schedule.add_systems(record_tick);
        schedule.run(&mut world);

        let records = world.resource_mut::<TickRecords>().drain();
        let ids: Vec<u32> = records.iter().map(|r| r.agent_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(records.iter().all(|r| r.tick == 3 && r.episode == 1));
        assert!(!world.resource::<TickFault>().is_set());
    }

    #[test]
    fn test_missing_decision_raises_fault() {
        let mut world = World::new();
        world.insert_resource(SimClock::default());
        world.insert_resource(TickRecords::default());
        world.insert_resource(TickFault::default());
        world.spawn((
            Agent,
            AgentId(4),
            Strategy::new(StrategyKind::Explorer, &LearningConfig::default()),
            Position(Cell::new(0, 0)),
            TickLedger::default(),
        ));

        let mut schedule = Schedule::default();
        schedule.add_systems(record_tick);
        schedule.run(&mut world);

        let fault = world.resource_mut::<TickFault>().take();
        assert!(matches!(
            fault,
            Some(SimError::StateInvariantViolation { agent: Some(4), .. })
        ));
        assert!(world.resource::<TickRecords>().is_empty());
    }
}
