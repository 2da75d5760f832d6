//! Output Generation
//!
//! Snapshots and run statistics.

pub mod snapshot;
pub mod stats;

pub use snapshot::*;
pub use stats::*;
