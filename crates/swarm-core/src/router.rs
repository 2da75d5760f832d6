//! Message Router
//!
//! Admits candidate messages against the per-tick bit budget. Candidates
//! are ranked by staleness-discounted salience and admitted as a strict
//! prefix: the first candidate that does not fit ends admission for the
//! tick, and everything after it is dropped. Nothing carries over.

use bevy_ecs::prelude::*;
use std::cmp::Ordering;

use swarm_events::MessageOutcome;

use crate::components::message::Message;

/// Outcome of one routing pass, in the order candidates were submitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingReport {
    /// (sender, outcome) for every candidate
    pub outcomes: Vec<(u32, MessageOutcome)>,
    /// Admitted messages in admission order
    pub delivered: Vec<Message>,
    pub bits_used: u64,
}

impl RoutingReport {
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    pub fn outcome_for(&self, sender: u32) -> Option<&MessageOutcome> {
        self.outcomes.iter().find(|(s, _)| *s == sender).map(|(_, o)| o)
    }
}

/// Running totals across every pass of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterTotals {
    pub passes: u64,
    pub candidates: u64,
    pub delivered: u64,
    pub dropped_over_budget: u64,
    pub encoding_failures: u64,
    pub bits_delivered: u64,
}

/// Resource: the channel. Holds only configuration and counters; queues
/// live for the duration of one `route` call.
#[derive(Resource, Debug, Clone)]
pub struct MessageRouter {
    budget: Option<u64>,
    world_size: u32,
    staleness_discount: f64,
    totals: RouterTotals,
    last_bits_used: u64,
}

struct Ranked {
    index: usize,
    sender: u32,
    priority: f64,
    bits: u64,
}

impl MessageRouter {
    pub fn new(budget: Option<u64>, world_size: u32, staleness_discount: f64) -> Self {
        Self {
            budget,
            world_size,
            staleness_discount,
            totals: RouterTotals::default(),
            last_bits_used: 0,
        }
    }

    pub fn budget(&self) -> Option<u64> {
        self.budget
    }

    pub fn totals(&self) -> RouterTotals {
        self.totals
    }

    /// Bits admitted by the most recent pass.
    pub fn last_bits_used(&self) -> u64 {
        self.last_bits_used
    }

    /// Runs one routing pass at tick `now`.
    pub fn route(&mut self, now: u64, candidates: Vec<Message>) -> RoutingReport {
        let mut outcomes: Vec<(u32, MessageOutcome)> = candidates
            .iter()
            .map(|m| (m.sender, MessageOutcome::None))
            .collect();

        let mut ranked = Vec::with_capacity(candidates.len());
        for (index, message) in candidates.iter().enumerate() {
            match message.encoded_bits(self.world_size, now) {
                Ok(bits) => ranked.push(Ranked {
                    index,
                    sender: message.sender,
                    priority: message.priority(now, self.staleness_discount),
                    bits,
                }),
                Err(e) => {
                    tracing::warn!(
                        tick = now,
                        sender = message.sender,
                        error = %e,
                        "dropping message that cannot be encoded"
                    );
                    self.totals.encoding_failures += 1;
                    outcomes[index].1 = MessageOutcome::EncodingFailed { reason: e.to_string() };
                }
            }
        }

        ranked.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(Ordering::Equal)
                .then(a.sender.cmp(&b.sender))
        });

        let mut remaining = self.budget;
        let mut admitting = true;
        let mut admitted = Vec::new();
        let mut bits_used = 0;
        for candidate in &ranked {
            let fits = match remaining {
                None => true,
                Some(left) => candidate.bits <= left,
            };
            if admitting && fits {
                if let Some(left) = remaining.as_mut() {
                    *left -= candidate.bits;
                }
                bits_used += candidate.bits;
                admitted.push(candidate.index);
                outcomes[candidate.index].1 = MessageOutcome::Delivered { bits: candidate.bits };
            } else {
                admitting = false;
                outcomes[candidate.index].1 =
                    MessageOutcome::DroppedOverBudget { bits: candidate.bits };
            }
        }

        let delivered_count = admitted.len() as u64;
        self.totals.passes += 1;
        self.totals.candidates += candidates.len() as u64;
        self.totals.delivered += delivered_count;
        self.totals.dropped_over_budget += ranked.len() as u64 - delivered_count;
        self.totals.bits_delivered += bits_used;
        self.last_bits_used = bits_used;

        let mut slots: Vec<Option<Message>> = candidates.into_iter().map(Some).collect();
        let delivered = admitted
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();

        tracing::debug!(
            tick = now,
            candidates = outcomes.len(),
            delivered = delivered_count,
            bits_used,
            budget = ?self.budget,
            "routing pass"
        );

        RoutingReport { outcomes, delivered, bits_used }
    }
}
