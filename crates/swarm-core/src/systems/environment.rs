//! Environment System
//!
//! Passive world dynamics: mobile resources and hazards drift one step per tick.

use bevy_ecs::prelude::*;

use crate::components::world::GridWorld;

/// System: advance every mobile item by its velocity.
pub fn advance_environment(mut grid: ResMut<GridWorld>) {
    grid.advance_mobile();
}
