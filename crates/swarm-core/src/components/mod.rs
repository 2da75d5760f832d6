//! ECS Components
//!
//! Entity components for agents, the grid resource, and message types.

pub mod agent;
pub mod message;
pub mod world;

pub use agent::*;
pub use message::*;
pub use world::*;
