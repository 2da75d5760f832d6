//! Bandwidth-Constrained Swarm Simulation Engine
//!
//! Agents on a bounded grid collect resources and avoid hazards while
//! coordinating over a channel with a per-tick bit budget. The engine is
//! deterministic for a given seed and configuration.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod batch;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod messaging;
pub mod output;
pub mod router;
pub mod setup;
pub mod strategy;
pub mod systems;

pub use components::*;
pub use config::SimConfig;
pub use engine::{CancelToken, Engine};
pub use error::{ConfigError, MessageEncodingError, SimError};
pub use events::EventLog;
pub use router::{MessageRouter, RoutingReport};
pub use strategy::{Decision, Direction, Strategy};

/// Seeded random number generator resource. The only source of randomness
/// in a run.
#[derive(Resource)]
pub struct SimRng(pub SmallRng);

/// Tick and episode counters. Only `Engine` advances them.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimClock {
    pub tick: u64,
    pub episode: u32,
}

/// The validated configuration of the running simulation
#[derive(Resource, Debug, Clone)]
pub struct RunConfig(pub SimConfig);
