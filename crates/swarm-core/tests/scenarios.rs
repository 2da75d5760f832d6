//! End-to-end scenarios
//!
//! Whole runs through the public engine API, checked against the
//! behavioural guarantees of the simulation.

use std::collections::BTreeMap;

use swarm_core::components::message::{Message, Report, Sighting, SightingKind, SightingSource};
use swarm_core::config::MessagingConfig;
use swarm_core::messaging::{generation_probability, importance_threshold};
use swarm_core::{CancelToken, Engine, EventLog, MessageRouter, SimConfig};
use swarm_events::{Cell, MessageOutcome, StrategyKind, TickRecord};

fn run_records(config: SimConfig, ticks: u64) -> (Engine, Vec<TickRecord>) {
    let mut engine = Engine::new(config, EventLog::in_memory()).unwrap();
    engine.run(ticks, &CancelToken::new()).unwrap();
    let records = engine.log().records().to_vec();
    (engine, records)
}

fn chatty_config(bandwidth_bits: Option<u64>, seed: u64) -> SimConfig {
    SimConfig {
        world_size: 12,
        num_agents: 10,
        vision_radius: 3,
        resource_count: 14,
        hazard_count: 6,
        bandwidth_bits,
        seed,
        ..SimConfig::default()
    }
    .with_uniform_strategy(StrategyKind::Cooperative)
}

fn bits_delivered_per_tick(records: &[TickRecord]) -> BTreeMap<u64, u64> {
    let mut per_tick = BTreeMap::new();
    for record in records {
        if let MessageOutcome::Delivered { bits } = record.message {
            *per_tick.entry(record.tick).or_insert(0) += bits;
        }
    }
    per_tick
}

#[test]
fn test_delivered_bits_never_exceed_budget() {
    for budget in [73, 150, 400] {
        let (_, records) = run_records(chatty_config(Some(budget), 5), 60);
        for (tick, bits) in bits_delivered_per_tick(&records) {
            assert!(bits <= budget, "tick {} delivered {} bits over a {} budget", tick, bits, budget);
        }
    }
}

#[test]
fn test_zero_budget_delivers_nothing() {
    let (mut engine, records) = run_records(chatty_config(Some(0), 5), 60);
    assert!(records.iter().any(|r| r.message_generated()));
    assert!(records
        .iter()
        .all(|r| !matches!(r.message, MessageOutcome::Delivered { .. })));
    assert_eq!(engine.summary().stats.messages_delivered, 0);
}

#[test]
fn test_unconstrained_budget_delivers_every_candidate() {
    let (_, records) = run_records(chatty_config(None, 5), 60);
    assert!(records
        .iter()
        .any(|r| matches!(r.message, MessageOutcome::Delivered { .. })));
    assert!(records
        .iter()
        .all(|r| !matches!(r.message, MessageOutcome::DroppedOverBudget { .. })));
}

fn report(x: i32, y: i32, salience: f64) -> Report {
    Report {
        sighting: Sighting {
            kind: SightingKind::Resource,
            cell: Cell::new(x, y),
            magnitude: 10.0,
            observed_tick: 0,
            source: SightingSource::Own,
        },
        salience,
    }
}

#[test]
fn test_higher_priority_admitted_whenever_lower_is() {
    // Single-sighting messages on a 16x16 world are 48 + 25 = 73 bits
    let low = Message::new(0, 0, vec![report(1, 1, 1.0)], 0.9);
    let high = Message::new(5, 0, vec![report(2, 2, 8.0)], 0.9);

    for budget in [0, 73, 100, 146, 500] {
        for order in [vec![low.clone(), high.clone()], vec![high.clone(), low.clone()]] {
            let mut router = MessageRouter::new(Some(budget), 16, 0.9);
            let report = router.route(0, order);
            let admitted = |sender| {
                matches!(report.outcome_for(sender), Some(MessageOutcome::Delivered { .. }))
            };
            if admitted(0) {
                assert!(admitted(5), "budget {}: low admitted without high", budget);
            }
        }
    }
}

#[test]
fn test_falling_delivery_rate_never_encourages_speaking() {
    let config = MessagingConfig::default();
    let rates: Vec<f64> = (0..=20).rev().map(|i| i as f64 / 20.0).collect();
    for kind in StrategyKind::all() {
        for pair in rates.windows(2) {
            let (before, after) = (pair[0], pair[1]);
            assert!(generation_probability(*kind, after, &config) <= generation_probability(*kind, before, &config));
            assert!(importance_threshold(after, &config) >= importance_threshold(before, &config));
        }
    }
}

#[test]
fn test_score_changes_only_through_contacts() {
    let mut config = chatty_config(Some(300), 11);
    config.strategy_mix = StrategyKind::all().iter().map(|k| (*k, 1.0)).collect();
    let value = config.world.resource_value;
    let severity = config.world.hazard_severity;
    let (mut engine, records) = run_records(config, 80);

    let mut totals: BTreeMap<u32, f64> = BTreeMap::new();
    for record in &records {
        let delta = record.score_delta;
        let allowed = [0.0, value, -severity, value - severity];
        assert!(
            allowed.iter().any(|a| (a - delta).abs() < 1e-9),
            "agent {} tick {} changed score by {}",
            record.agent_id,
            record.tick,
            delta
        );
        *totals.entry(record.agent_id).or_insert(0.0) += delta;
    }

    let summary = engine.summary();
    for agent in &summary.agents {
        let expected = value * agent.resources_collected as f64 - severity * agent.hazard_contacts as f64;
        assert!((agent.final_score - expected).abs() < 1e-9);
        assert!((totals[&agent.agent_id] - agent.final_score).abs() < 1e-9);
    }
}

#[test]
fn test_learner_bounds_across_episodes() {
    let mut config = SimConfig {
        world_size: 10,
        num_agents: 4,
        resource_count: 8,
        hazard_count: 4,
        ticks_per_episode: 25,
        episode_count: 6,
        seed: 3,
        ..SimConfig::default()
    }
    .with_uniform_strategy(StrategyKind::QLearning);
    config.learning.epsilon_start = 1.0;
    config.learning.epsilon_decay = 0.5;
    config.learning.epsilon_min = 0.05;

    let mut engine = Engine::new(config.clone(), EventLog::null()).unwrap();
    let cancel = CancelToken::new();
    let mut visited: BTreeMap<u32, usize> = BTreeMap::new();
    for _ in 0..config.episode_count {
        engine.run(config.ticks_per_episode, &cancel).unwrap();
        engine.end_episode().unwrap();

        for agent in engine.summary().agents {
            let learner = agent.learner.expect("learning agent");
            assert!((0.0..=1.0).contains(&learner.epsilon));
            assert!(learner.epsilon >= config.learning.epsilon_min);
            assert!(learner
                .table
                .iter()
                .all(|entry| entry.values.iter().all(|q| q.is_finite())));
            let seen = visited.entry(agent.agent_id).or_insert(0);
            assert!(learner.table.len() >= *seen);
            *seen = learner.table.len();
        }
    }
    assert_eq!(engine.tick(), 150);
}

#[test]
fn test_greedy_agents_collect_every_resource_without_messages() {
    let config = SimConfig {
        world_size: 15,
        num_agents: 4,
        resource_count: 6,
        hazard_count: 0,
        bandwidth_bits: Some(0),
        seed: 42,
        ticks_per_episode: 50,
        ..SimConfig::default()
    }
    .with_uniform_strategy(StrategyKind::Greedy);
    assert_eq!(config.world.resource_value, 10.0);

    let mut engine = Engine::new(config, EventLog::in_memory()).unwrap();
    let summary = engine.run_episodes(&CancelToken::new()).unwrap();

    assert_eq!(summary.stats.ticks, 50);
    assert_eq!(summary.stats.resources_collected, 6);
    assert_eq!(summary.stats.messages_delivered, 0);
    assert_eq!(summary.stats.total_score, 60.0);
    assert!(engine.snapshot().resources.is_empty());
}

#[test]
fn test_cooperative_agents_do_no_worse_with_unlimited_bandwidth() {
    let setting = |bandwidth_bits, seed| {
        SimConfig {
            world_size: 15,
            num_agents: 8,
            vision_radius: 2,
            resource_count: 8,
            hazard_count: 0,
            bandwidth_bits,
            seed,
            ticks_per_episode: 200,
            ..SimConfig::default()
        }
        .with_uniform_strategy(StrategyKind::Cooperative)
    };

    let mut silent = 0.0;
    let mut open = 0.0;
    let mut delivered = 0;
    for seed in 0..5 {
        let mut engine = Engine::new(setting(Some(0), seed), EventLog::null()).unwrap();
        silent += engine.run_episodes(&CancelToken::new()).unwrap().stats.coordination_efficiency;

        let mut engine = Engine::new(setting(None, seed), EventLog::null()).unwrap();
        let stats = engine.run_episodes(&CancelToken::new()).unwrap().stats;
        open += stats.coordination_efficiency;
        delivered += stats.messages_delivered;
    }
    assert!(delivered > 0);
    assert!(open >= silent, "unconstrained {} < silent {}", open, silent);
}

#[test]
fn test_jsonl_log_matches_in_memory_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let config = chatty_config(Some(200), 21);

    let mut file_engine = Engine::new(config.clone(), EventLog::jsonl(&path).unwrap()).unwrap();
    file_engine.run(15, &CancelToken::new()).unwrap();
    file_engine.finish().unwrap();

    let (_, records) = run_records(config, 15);
    let read_back = swarm_core::events::read_jsonl(&path).unwrap();
    assert_eq!(read_back, records);
}
