//! Simulation Engine
//!
//! Owns the ECS world, the tick schedule and the event log handle. `step`
//! is the only thing that advances the tick counter.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use swarm_events::{RunSummary, WorldSnapshot};

use crate::components::agent::{Agent, AgentId, Inbox, Memory, Position, TickLedger};
use crate::components::world::GridWorld;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::events::EventLog;
use crate::output;
use crate::router::MessageRouter;
use crate::setup;
use crate::strategy::Strategy;
use crate::systems::{tick_schedule, TickFault, TickRecords};
use crate::{RunConfig, SimClock, SimRng};

/// Shared stop flag, checked between ticks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A single deterministic simulation run.
pub struct Engine {
    world: World,
    schedule: Schedule,
    config: SimConfig,
    log: EventLog,
    /// Set by the first fatal error; every later `step` returns it.
    halted: Option<SimError>,
}

/// Fresh world for `config`: grid first, then agents, all from one RNG
/// seeded with `config.seed`.
fn build_world(config: &SimConfig) -> Result<World, SimError> {
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let grid = setup::populate_world(config, &mut rng, 0)?;

    let mut world = World::new();
    setup::spawn_all_agents(&mut world, config, &grid, &mut rng)?;

    world.insert_resource(grid);
    world.insert_resource(SimRng(rng));
    world.insert_resource(SimClock::default());
    world.insert_resource(RunConfig(config.clone()));
    world.insert_resource(MessageRouter::new(
        config.bandwidth_bits,
        config.world_size,
        config.messaging.staleness_discount,
    ));
    world.insert_resource(TickRecords::default());
    world.insert_resource(TickFault::default());
    Ok(world)
}

impl Engine {
    /// Validates `config` and builds the initial world.
    pub fn new(config: SimConfig, log: EventLog) -> Result<Self, SimError> {
        config.validate()?;
        let mut world = build_world(&config)?;

        let summary = setup::get_spawn_summary(&mut world);
        info!(
            seed = config.seed,
            world_size = config.world_size,
            bandwidth = ?config.bandwidth_bits,
            "engine ready: {}",
            summary
        );

        Ok(Self {
            world,
            // A schedule is bound to the world it first ran against
            schedule: tick_schedule(),
            config,
            log,
            halted: None,
        })
    }

    /// Rebuilds everything from `seed` and `config`. The event log handle
    /// is kept.
    pub fn reset(&mut self, seed: u64, mut config: SimConfig) -> Result<(), SimError> {
        config.seed = seed;
        config.validate()?;
        self.world = build_world(&config)?;
        self.schedule = tick_schedule();
        self.config = config;
        self.halted = None;
        info!(seed, "engine reset");
        Ok(())
    }

    /// Changes the seed before the first tick. Rejected once the run has
    /// started.
    pub fn reseed(&mut self, seed: u64) -> Result<(), SimError> {
        let tick = self.tick();
        if tick > 0 {
            return Err(SimError::ReseedAttempt { tick });
        }
        self.reset(seed, self.config.clone())
    }

    /// Advances exactly one tick.
    pub fn step(&mut self) -> Result<(), SimError> {
        if let Some(error) = &self.halted {
            return Err(error.clone());
        }

        self.schedule.run(&mut self.world);
        let records = self.world.resource_mut::<TickRecords>().drain();

        let fault = self.world.resource_mut::<TickFault>().take();
        if let Some(error) = fault.or_else(|| self.check_invariants()) {
            return Err(self.halt(error));
        }
        if let Err(error) = self.log.log_batch(&records) {
            return Err(self.halt(error));
        }

        self.world.resource_mut::<SimClock>().tick += 1;
        Ok(())
    }

    /// Runs up to `ticks` ticks, stopping early when `cancel` is set.
    /// Returns the number of ticks actually run.
    pub fn run(&mut self, ticks: u64, cancel: &CancelToken) -> Result<u64, SimError> {
        let mut ran = 0;
        while ran < ticks {
            if cancel.is_cancelled() {
                info!(tick = self.tick(), "run cancelled");
                break;
            }
            self.step()?;
            ran += 1;
        }
        Ok(ran)
    }

    /// Runs the configured episodes back to back and returns the summary.
    pub fn run_episodes(&mut self, cancel: &CancelToken) -> Result<RunSummary, SimError> {
        info!(
            episodes = self.config.episode_count,
            ticks_per_episode = self.config.ticks_per_episode,
            "starting run"
        );
        for _ in 0..self.config.episode_count {
            let ran = self.run(self.config.ticks_per_episode, cancel)?;
            if ran < self.config.ticks_per_episode {
                break;
            }
            self.end_episode()?;
        }
        let summary = self.summary();
        info!(
            ticks = summary.stats.ticks,
            total_score = summary.stats.total_score,
            delivered = summary.stats.messages_delivered,
            "run complete"
        );
        Ok(summary)
    }

    /// Closes the current episode. Learners take their terminal update and
    /// decay ε; memories and inboxes are wiped. If another episode follows,
    /// the grid and agent positions are regenerated from the run RNG.
    pub fn end_episode(&mut self) -> Result<(), SimError> {
        if let Some(error) = &self.halted {
            return Err(error.clone());
        }

        {
            let mut query = self
                .world
                .query_filtered::<(&mut Strategy, &mut Memory, &mut Inbox, &mut TickLedger), With<Agent>>();
            for (mut strategy, mut memory, mut inbox, mut ledger) in query.iter_mut(&mut self.world) {
                strategy.end_episode(ledger.score_delta);
                memory.clear();
                inbox.clear();
                *ledger = TickLedger::default();
            }
        }

        let clock = *self.world.resource::<SimClock>();
        info!(episode = clock.episode, tick = clock.tick, "episode finished");
        if clock.episode + 1 >= self.config.episode_count {
            return Ok(());
        }

        // Take the RNG out to avoid borrow conflicts
        let Some(mut sim_rng) = self.world.remove_resource::<SimRng>() else {
            return Err(self.halt(SimError::invariant(clock.tick, None, "run RNG missing")));
        };
        let regenerated = setup::populate_world(&self.config, &mut sim_rng.0, clock.tick);
        let grid = match regenerated {
            Ok(grid) => grid,
            Err(error) => {
                self.world.insert_resource(sim_rng);
                return Err(self.halt(error));
            }
        };
        setup::reposition_agents(&mut self.world, &grid, &mut sim_rng.0);
        self.world.insert_resource(grid);
        self.world.insert_resource(sim_rng);
        self.world.resource_mut::<SimClock>().episode += 1;
        Ok(())
    }

    fn halt(&mut self, error: SimError) -> SimError {
        if error.is_fatal() {
            error!(%error, "engine halted");
            self.halted = Some(error.clone());
        }
        error
    }

    /// Post-tick consistency checks.
    fn check_invariants(&mut self) -> Option<SimError> {
        let tick = self.tick();
        let grid = self.world.resource::<GridWorld>();
        if let Some(cell) = grid.find_out_of_bounds() {
            return Some(SimError::invariant(tick, None, format!("world item outside bounds at {}", cell)));
        }
        let size = grid.size();

        let router = self.world.resource::<MessageRouter>();
        if let Some(budget) = router.budget() {
            if router.last_bits_used() > budget {
                return Some(SimError::invariant(
                    tick,
                    None,
                    format!("routing used {} bits of a {} bit budget", router.last_bits_used(), budget),
                ));
            }
        }

        let mut query = self.world.query_filtered::<(&AgentId, &Position), With<Agent>>();
        for (id, position) in query.iter(&self.world) {
            let cell = position.0;
            if cell.x < 0 || cell.y < 0 || cell.x >= size as i32 || cell.y >= size as i32 {
                return Some(SimError::invariant(
                    tick,
                    Some(id.0),
                    format!("agent outside world bounds at {}", cell),
                ));
            }
        }
        None
    }

    /// Read-only view of the current state.
    pub fn snapshot(&self) -> WorldSnapshot {
        output::generate_snapshot(&self.world)
    }

    pub fn summary(&self) -> RunSummary {
        output::run_summary(&self.world, &self.config, self.tick())
    }

    /// Ticks completed so far, across episodes.
    pub fn tick(&self) -> u64 {
        self.world.resource::<SimClock>().tick
    }

    pub fn episode(&self) -> u32 {
        self.world.resource::<SimClock>().episode
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub(crate) fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Flushes the event log.
    pub fn finish(&mut self) -> Result<(), SimError> {
        self.log.flush()
    }

    /// Flushes the event log and writes the current summary to `path`.
    pub fn write_summary(&mut self, path: impl AsRef<std::path::Path>) -> Result<RunSummary, SimError> {
        let summary = self.summary();
        self.log.write_summary(path, &summary)?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_events::StrategyKind;

    fn small_config() -> SimConfig {
        SimConfig {
            world_size: 8,
            num_agents: 4,
            resource_count: 5,
            hazard_count: 3,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_step_advances_tick_and_logs_one_record_per_agent() {
        let mut engine = Engine::new(small_config(), EventLog::in_memory()).unwrap();
        assert_eq!(engine.tick(), 0);
        engine.step().unwrap();
        engine.step().unwrap();
        assert_eq!(engine.tick(), 2);
        assert_eq!(engine.log().records().len(), 8);
        assert!(engine.log().records()[..4].iter().all(|r| r.tick == 0));
        let ids: Vec<u32> = engine.log().records()[4..].iter().map(|r| r.agent_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_invalid_config_rejected_before_any_tick() {
        let config = SimConfig { world_size: 0, ..SimConfig::default() };
        assert!(matches!(
            Engine::new(config, EventLog::null()),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_cancelled_run_stops_between_ticks() {
        let mut engine = Engine::new(small_config(), EventLog::null()).unwrap();
        let cancel = CancelToken::new();
        assert_eq!(engine.run(3, &cancel).unwrap(), 3);
        cancel.cancel();
        assert_eq!(engine.run(10, &cancel).unwrap(), 0);
        assert_eq!(engine.tick(), 3);
    }

    #[test]
    fn test_reseed_only_before_first_tick() {
        let mut engine = Engine::new(small_config(), EventLog::null()).unwrap();
        engine.reseed(7).unwrap();
        assert_eq!(engine.config().seed, 7);
        engine.step().unwrap();
        assert_eq!(engine.reseed(8), Err(SimError::ReseedAttempt { tick: 1 }));
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut engine = Engine::new(small_config(), EventLog::null()).unwrap();
        let initial = engine.snapshot();
        engine.run(5, &CancelToken::new()).unwrap();
        engine.reset(small_config().seed, small_config()).unwrap();
        assert_eq!(engine.tick(), 0);
        assert_eq!(engine.snapshot(), initial);
    }

    #[test]
    fn test_halted_engine_keeps_returning_the_fault() {
        let mut engine = Engine::new(small_config(), EventLog::null()).unwrap();
        engine
            .world_mut()
            .resource_mut::<TickFault>()
            .raise(SimError::invariant(0, Some(1), "corrupted ledger"));

        let error = engine.step().unwrap_err();
        assert!(matches!(error, SimError::StateInvariantViolation { agent: Some(1), .. }));
        assert!(engine.is_halted());
        assert_eq!(engine.tick(), 0);
        assert_eq!(engine.step().unwrap_err(), error);
        assert_eq!(engine.end_episode().unwrap_err(), error);
    }

    #[test]
    fn test_queries_leave_the_engine_untouched() {
        let mut engine = Engine::new(small_config(), EventLog::null()).unwrap();
        engine.run(4, &CancelToken::new()).unwrap();

        let view: &Engine = &engine;
        let snapshot = view.snapshot();
        let summary = view.summary();
        assert_eq!(view.snapshot(), snapshot);
        assert_eq!(view.summary(), summary);
        assert_eq!(snapshot.agents.len(), 4);
        assert_eq!(summary.stats.ticks, 4);
        assert_eq!(view.tick(), 4);
    }

    #[test]
    fn test_unencodable_message_is_recorded_and_tick_continues() {
        use crate::components::message::{Sighting, SightingKind, SightingSource};
        use swarm_events::{Cell, MessageOutcome};

        let mut config = SimConfig {
            world_size: 15,
            num_agents: 1,
            vision_radius: 1,
            resource_count: 0,
            hazard_count: 0,
            ..SimConfig::default()
        }
        .with_uniform_strategy(StrategyKind::Cooperative);
        config.messaging.memory_ttl = 1_000;
        config.messaging.base_threshold = 0.0;

        let mut engine = Engine::new(config, EventLog::in_memory()).unwrap();
        {
            let world = engine.world_mut();
            world.resource_mut::<SimClock>().tick = 300;
            let mut agents = world.query_filtered::<(&mut Position, &mut Memory), With<Agent>>();
            for (mut position, mut memory) in agents.iter_mut(world) {
                position.0 = Cell::new(0, 0);
                let remembered = Sighting {
                    kind: SightingKind::Resource,
                    cell: Cell::new(14, 14),
                    magnitude: 10.0,
                    observed_tick: 0,
                    source: SightingSource::Own,
                };
                memory.observe(Cell::new(14, 14), 0, &[remembered]);
            }
        }

        engine.step().unwrap();
        assert!(!engine.is_halted());
        assert_eq!(engine.tick(), 301);

        let record = &engine.log().records()[0];
        assert!(matches!(
            record.message,
            MessageOutcome::EncodingFailed { ref reason } if reason.contains("300")
        ));
        assert!(record.message_generated());
        assert!(!record.message_delivered());
        assert_eq!(engine.summary().stats.messages_failed_encoding, 1);

        engine.step().unwrap();
        assert_eq!(engine.tick(), 302);
    }

    #[test]
    fn test_write_summary_matches_in_process_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let mut engine = Engine::new(small_config(), EventLog::null()).unwrap();
        engine.run(6, &CancelToken::new()).unwrap();

        let written = engine.write_summary(&path).unwrap();
        let read: RunSummary = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read.seed, written.seed);
        assert_eq!(read.stats.ticks, 6);
        assert_eq!(read.agents.len(), 4);
    }

    #[test]
    fn test_episodes_regenerate_world_and_keep_scores() {
        let config = SimConfig {
            episode_count: 3,
            ticks_per_episode: 10,
            ..small_config()
        }
        .with_uniform_strategy(StrategyKind::QLearning);
        let mut engine = Engine::new(config, EventLog::in_memory()).unwrap();
        let summary = engine.run_episodes(&CancelToken::new()).unwrap();

        assert_eq!(engine.tick(), 30);
        assert_eq!(engine.episode(), 2);
        assert_eq!(summary.stats.ticks, 30);
        assert_eq!(summary.episodes, 3);
        let episodes: Vec<u32> = engine.log().records().iter().map(|r| r.episode).collect();
        assert_eq!(episodes.first(), Some(&0));
        assert_eq!(episodes.last(), Some(&2));
        for agent in &summary.agents {
            let learner = agent.learner.as_ref().unwrap();
            assert_eq!(learner.episodes_completed, 3);
        }
    }
}
