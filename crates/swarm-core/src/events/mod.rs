//! Event logging for simulation output.

pub mod logger;

pub use logger::{read_jsonl, EventLog};
