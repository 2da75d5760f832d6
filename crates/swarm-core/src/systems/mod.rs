//! ECS Systems
//!
//! One tick is the chain perception -> decision -> movement -> environment
//! -> routing -> record, run on a single thread. Every system that touches
//! more than one agent visits them in ascending id order.

pub mod decision;
pub mod environment;
pub mod movement;
pub mod perception;
pub mod record;
pub mod routing;

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;

use crate::error::SimError;

pub use decision::decide;
pub use environment::advance_environment;
pub use movement::apply_movement;
pub use perception::{perceive, visible_sightings};
pub use record::{record_tick, TickRecords};
pub use routing::route_messages;

/// Resource: first fatal error raised inside a system this tick. The engine
/// checks it after the schedule runs and halts if it is set.
#[derive(Resource, Debug, Default)]
pub struct TickFault(Option<SimError>);

impl TickFault {
    /// Keeps the first error raised in a tick.
    pub fn raise(&mut self, error: SimError) {
        if self.0.is_none() {
            tracing::error!(%error, "fault raised during tick");
            self.0 = Some(error);
        }
    }

    pub fn take(&mut self) -> Option<SimError> {
        self.0.take()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

/// Builds the per-tick schedule.
pub fn tick_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems(
        (
            perceive,
            decide,
            apply_movement,
            advance_environment,
            route_messages,
            record_tick,
        )
            .chain(),
    );
    schedule
}
