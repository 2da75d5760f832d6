//! Message Components
//!
//! Sightings, the messages that carry them between agents, and the
//! fixed-width bit encoding the router charges against its budget.
//!
//! Wire layout (big-endian bit fields, no padding):
//!
//! | field            | bits                          |
//! |------------------|-------------------------------|
//! | flags            | 8                             |
//! | sender id        | 16 (id mod 65536)             |
//! | creation tick    | 16 (tick mod 65536)           |
//! | sighting count   | 8                             |
//! | per sighting     | 1 kind + 2 x coord + 8 magnitude + 8 age |
//!
//! `coord` is `ceil(log2(world_size))`, at least one bit.

use serde::{Deserialize, Serialize};
use swarm_events::Cell;

use crate::error::MessageEncodingError;

pub const HEADER_BITS: u64 = 8 + 16 + 16 + 8;
pub const MAGNITUDE_BITS: u64 = 8;
pub const AGE_BITS: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SightingKind {
    Resource,
    Hazard,
}

/// Where a remembered sighting came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SightingSource {
    Own,
    Peer(u32),
}

/// An observation of a resource or hazard at a cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    pub kind: SightingKind,
    pub cell: Cell,
    /// Resource value or hazard severity
    pub magnitude: f64,
    pub observed_tick: u64,
    pub source: SightingSource,
}

impl Sighting {
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.observed_tick)
    }

    pub fn is_peer_report(&self) -> bool {
        matches!(self.source, SightingSource::Peer(_))
    }
}

/// A sighting packed into a message, with the salience the sender gave it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub sighting: Sighting,
    pub salience: f64,
}

/// A candidate or delivered agent-to-agent message. Lives for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: u32,
    pub created_tick: u64,
    pub reports: Vec<Report>,
    /// Staleness-discounted salience at creation
    pub importance: f64,
}

impl Message {
    pub fn new(sender: u32, created_tick: u64, reports: Vec<Report>, staleness_discount: f64) -> Self {
        let mut message = Self {
            sender,
            created_tick,
            reports,
            importance: 0.0,
        };
        message.importance = message.priority(created_tick, staleness_discount);
        message
    }

    /// Routing priority at tick `now`: salience discounted by sighting age.
    pub fn priority(&self, now: u64, staleness_discount: f64) -> f64 {
        self.reports
            .iter()
            .map(|r| {
                let age = r.sighting.age(now).min(i32::MAX as u64) as i32;
                r.salience * staleness_discount.powi(age)
            })
            .sum()
    }

    /// Encoded size in bits for a world of side `world_size`, evaluated at tick `now`.
    pub fn encoded_bits(&self, world_size: u32, now: u64) -> Result<u64, MessageEncodingError> {
        if self.reports.len() > u8::MAX as usize {
            return Err(MessageEncodingError::TooManySightings(self.reports.len()));
        }
        let coord = coordinate_bits(world_size);
        let per_sighting = 1 + 2 * coord + MAGNITUDE_BITS + AGE_BITS;
        let max = world_size as i32;
        for report in &self.reports {
            let cell = report.sighting.cell;
            if cell.x < 0 || cell.y < 0 || cell.x >= max || cell.y >= max {
                return Err(MessageEncodingError::CoordinateOutOfRange {
                    x: cell.x,
                    y: cell.y,
                    size: world_size,
                });
            }
            let age = report.sighting.age(now);
            if age > u8::MAX as u64 {
                return Err(MessageEncodingError::StaleSighting(age));
            }
        }
        Ok(HEADER_BITS + per_sighting * self.reports.len() as u64)
    }
}

/// Bits needed to address one axis of a `world_size` grid.
pub fn coordinate_bits(world_size: u32) -> u64 {
    let span = world_size.max(2) - 1;
    (u32::BITS - span.leading_zeros()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(kind: SightingKind, x: i32, y: i32, observed: u64, salience: f64) -> Report {
        Report {
            sighting: Sighting {
                kind,
                cell: Cell::new(x, y),
                magnitude: 10.0,
                observed_tick: observed,
                source: SightingSource::Own,
            },
            salience,
        }
    }

    #[test]
    fn test_coordinate_bits() {
        assert_eq!(coordinate_bits(1), 1);
        assert_eq!(coordinate_bits(2), 1);
        assert_eq!(coordinate_bits(15), 4);
        assert_eq!(coordinate_bits(16), 4);
        assert_eq!(coordinate_bits(17), 5);
        assert_eq!(coordinate_bits(100), 7);
    }

    #[test]
    fn test_encoded_size() {
        let msg = Message::new(
            3,
            10,
            vec![
                report(SightingKind::Resource, 1, 2, 10, 5.0),
                report(SightingKind::Hazard, 14, 0, 8, 2.0),
            ],
            0.9,
        );
        // 48 header + 2 * (1 + 8 + 8 + 8)
        assert_eq!(msg.encoded_bits(15, 10).unwrap(), 98);
    }

    #[test]
    fn test_header_only_message() {
        let msg = Message::new(0, 0, Vec::new(), 0.9);
        assert_eq!(msg.encoded_bits(15, 0).unwrap(), HEADER_BITS);
        assert_eq!(msg.importance, 0.0);
    }

    #[test]
    fn test_encoding_errors() {
        let msg = Message::new(0, 300, vec![report(SightingKind::Resource, 1, 1, 0, 1.0)], 0.9);
        assert_eq!(msg.encoded_bits(15, 300), Err(MessageEncodingError::StaleSighting(300)));

        let msg = Message::new(0, 0, vec![report(SightingKind::Hazard, 15, 1, 0, 1.0)], 0.9);
        assert!(matches!(
            msg.encoded_bits(15, 0),
            Err(MessageEncodingError::CoordinateOutOfRange { x: 15, .. })
        ));

        let reports = (0..256).map(|_| report(SightingKind::Resource, 0, 0, 0, 0.1)).collect();
        let msg = Message::new(0, 0, reports, 0.9);
        assert_eq!(msg.encoded_bits(15, 0), Err(MessageEncodingError::TooManySightings(256)));
    }

    #[test]
    fn test_priority_discounts_stale_reports() {
        let fresh = Message::new(1, 5, vec![report(SightingKind::Resource, 0, 0, 5, 4.0)], 0.5);
        let stale = Message::new(2, 5, vec![report(SightingKind::Resource, 0, 0, 3, 4.0)], 0.5);
        assert_eq!(fresh.importance, 4.0);
        assert_eq!(stale.importance, 1.0);
        assert!(fresh.priority(5, 0.5) > stale.priority(5, 0.5));
    }
}
