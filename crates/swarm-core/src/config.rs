//! Configuration System
//!
//! One validated configuration structure per run, loaded from TOML.
//! Every field has a default so partial files are accepted; `validate`
//! must succeed before the engine will build a world from it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use swarm_events::StrategyKind;

use crate::error::ConfigError;

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Side length of the square grid
    pub world_size: u32,
    pub num_agents: usize,
    /// Strategy name -> proportion; normalized when the sum is positive
    pub strategy_mix: BTreeMap<StrategyKind, f64>,
    /// Chebyshev radius of an agent's direct perception
    pub vision_radius: u32,
    /// Per-tick bit budget; `None` means unconstrained, `Some(0)` means silence
    pub bandwidth_bits: Option<u64>,
    pub seed: u64,
    pub resource_count: usize,
    pub hazard_count: usize,
    /// Episodes per learning run
    pub episode_count: u32,
    pub ticks_per_episode: u64,
    pub learning: LearningConfig,
    pub world: WorldConfig,
    pub messaging: MessagingConfig,
    pub behavior: BehaviorConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        let strategy_mix = [
            StrategyKind::Greedy,
            StrategyKind::Cautious,
            StrategyKind::Balanced,
            StrategyKind::Explorer,
            StrategyKind::Cooperative,
        ]
        .into_iter()
        .map(|kind| (kind, 0.2))
        .collect();

        Self {
            world_size: 15,
            num_agents: 8,
            strategy_mix,
            vision_radius: 3,
            bandwidth_bits: None,
            seed: 42,
            resource_count: 10,
            hazard_count: 5,
            episode_count: 1,
            ticks_per_episode: 30,
            learning: LearningConfig::default(),
            world: WorldConfig::default(),
            messaging: MessagingConfig::default(),
            behavior: BehaviorConfig::default(),
        }
    }
}

/// Q-learning hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Learning rate, (0, 1]
    pub alpha: f64,
    /// Discount factor, [0, 1)
    pub gamma: f64,
    /// Initial exploration rate, [0, 1]
    pub epsilon_start: f64,
    /// Multiplicative decay applied once per episode, (0, 1]
    pub epsilon_decay: f64,
    /// Floor for epsilon after decay, [0, 1]
    pub epsilon_min: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon_start: 0.3,
            epsilon_decay: 0.95,
            epsilon_min: 0.01,
        }
    }
}

/// Resource and hazard generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub resource_value: f64,
    pub hazard_severity: f64,
    /// Probability that a placed item gets a mobility vector
    pub mobile_fraction: f64,
    /// Probability that a hazard disappears after being touched
    pub hazard_removal_probability: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            resource_value: 10.0,
            hazard_severity: 5.0,
            mobile_fraction: 0.0,
            hazard_removal_probability: 0.3,
        }
    }
}

/// Message generation, self-censorship and routing priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Trailing window (in generated messages) for delivery-rate statistics
    pub delivery_window: usize,
    /// Generation probability multiplier at a delivery rate of zero
    pub min_probability: f64,
    /// Importance a message needs at a perfect delivery rate
    pub base_threshold: f64,
    /// Extra importance required as the delivery rate falls to zero
    pub censor_strength: f64,
    /// Maximum sightings packed into one message
    pub max_sightings: usize,
    /// Per-tick priority discount for stale sightings, (0, 1]
    pub staleness_discount: f64,
    /// Salience multiplier for hazard sightings
    pub threat_weight: f64,
    /// Ticks a sighting is remembered without being re-observed
    pub memory_ttl: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            delivery_window: 10,
            min_probability: 0.1,
            base_threshold: 1.0,
            censor_strength: 4.0,
            max_sightings: 4,
            staleness_discount: 0.9,
            threat_weight: 1.5,
            memory_ttl: 12,
        }
    }
}

/// Tunable coefficients for the heuristic strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Value lost per step of distance when ranking resources
    pub distance_discount: f64,
    /// Cautious agents flee hazards within this radius
    pub safety_radius: u32,
    pub attraction_weight: f64,
    pub repulsion_weight: f64,
    /// How much more a cooperative agent trusts peer reports than its own eyes
    pub peer_weight: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            distance_discount: 1.0,
            safety_radius: 2,
            attraction_weight: 1.0,
            repulsion_weight: 1.5,
            peer_weight: 2.0,
        }
    }
}

#[derive(Clone, Copy)]
enum Bound {
    /// (0, 1]
    OpenClosedUnit,
    /// [0, 1)
    ClosedOpenUnit,
    /// [0, 1]
    Unit,
    /// [0, inf)
    NonNegative,
    /// (0, inf)
    Positive,
}

impl Bound {
    fn contains(self, v: f64) -> bool {
        if !v.is_finite() {
            return false;
        }
        match self {
            Bound::OpenClosedUnit => v > 0.0 && v <= 1.0,
            Bound::ClosedOpenUnit => (0.0..1.0).contains(&v),
            Bound::Unit => (0.0..=1.0).contains(&v),
            Bound::NonNegative => v >= 0.0,
            Bound::Positive => v > 0.0,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Bound::OpenClosedUnit => "(0, 1]",
            Bound::ClosedOpenUnit => "[0, 1)",
            Bound::Unit => "[0, 1]",
            Bound::NonNegative => "[0, inf)",
            Bound::Positive => "(0, inf)",
        }
    }
}

fn check(field: &'static str, value: f64, bound: Bound) -> Result<(), ConfigError> {
    if bound.contains(value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value, range: bound.label() })
    }
}

impl SimConfig {
    /// Loads configuration from a TOML file. The result is not yet validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Number of cells on the grid.
    pub fn cell_count(&self) -> usize {
        (self.world_size as usize).saturating_mul(self.world_size as usize)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.bandwidth_bits.is_none()
    }

    /// Rejects every invalid field before a world is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_size == 0 {
            return Err(ConfigError::not_positive("world_size", self.world_size));
        }
        if self.world_size > u16::MAX as u32 {
            return Err(ConfigError::OutOfRange {
                field: "world_size",
                value: self.world_size as f64,
                range: "[1, 65535]",
            });
        }
        if self.num_agents == 0 {
            return Err(ConfigError::not_positive("num_agents", self.num_agents));
        }
        if self.vision_radius == 0 {
            return Err(ConfigError::not_positive("vision_radius", self.vision_radius));
        }
        if self.episode_count == 0 {
            return Err(ConfigError::not_positive("episode_count", self.episode_count));
        }
        if self.ticks_per_episode == 0 {
            return Err(ConfigError::not_positive("ticks_per_episode", self.ticks_per_episode));
        }

        let placed = self.resource_count.saturating_add(self.hazard_count);
        if placed > self.cell_count() {
            return Err(ConfigError::Overcrowded {
                field: "resource_count + hazard_count",
                requested: placed,
                capacity: self.cell_count(),
            });
        }

        self.normalized_mix()?;

        let l = &self.learning;
        check("learning.alpha", l.alpha, Bound::OpenClosedUnit)?;
        check("learning.gamma", l.gamma, Bound::ClosedOpenUnit)?;
        check("learning.epsilon_start", l.epsilon_start, Bound::Unit)?;
        check("learning.epsilon_decay", l.epsilon_decay, Bound::OpenClosedUnit)?;
        check("learning.epsilon_min", l.epsilon_min, Bound::Unit)?;
        if l.epsilon_min > l.epsilon_start {
            return Err(ConfigError::OutOfRange {
                field: "learning.epsilon_min",
                value: l.epsilon_min,
                range: "[0, learning.epsilon_start]",
            });
        }

        let w = &self.world;
        check("world.resource_value", w.resource_value, Bound::Positive)?;
        check("world.hazard_severity", w.hazard_severity, Bound::Positive)?;
        check("world.mobile_fraction", w.mobile_fraction, Bound::Unit)?;
        check("world.hazard_removal_probability", w.hazard_removal_probability, Bound::Unit)?;

        let m = &self.messaging;
        if m.delivery_window == 0 {
            return Err(ConfigError::not_positive("messaging.delivery_window", m.delivery_window));
        }
        if m.max_sightings == 0 || m.max_sightings > u8::MAX as usize {
            return Err(ConfigError::OutOfRange {
                field: "messaging.max_sightings",
                value: m.max_sightings as f64,
                range: "[1, 255]",
            });
        }
        if m.memory_ttl == 0 {
            return Err(ConfigError::not_positive("messaging.memory_ttl", m.memory_ttl));
        }
        check("messaging.min_probability", m.min_probability, Bound::Unit)?;
        check("messaging.base_threshold", m.base_threshold, Bound::NonNegative)?;
        check("messaging.censor_strength", m.censor_strength, Bound::NonNegative)?;
        check("messaging.staleness_discount", m.staleness_discount, Bound::OpenClosedUnit)?;
        check("messaging.threat_weight", m.threat_weight, Bound::NonNegative)?;

        let b = &self.behavior;
        check("behavior.distance_discount", b.distance_discount, Bound::NonNegative)?;
        check("behavior.attraction_weight", b.attraction_weight, Bound::NonNegative)?;
        check("behavior.repulsion_weight", b.repulsion_weight, Bound::NonNegative)?;
        check("behavior.peer_weight", b.peer_weight, Bound::NonNegative)?;

        Ok(())
    }

    /// Strategy proportions scaled to sum to 1.0, in strategy order.
    pub fn normalized_mix(&self) -> Result<Vec<(StrategyKind, f64)>, ConfigError> {
        if self.strategy_mix.is_empty() {
            return Err(ConfigError::StrategyMix("no strategies listed".into()));
        }
        for (kind, &p) in &self.strategy_mix {
            if !p.is_finite() || p < 0.0 {
                return Err(ConfigError::StrategyMix(format!(
                    "proportion for {} is {}",
                    kind, p
                )));
            }
        }
        let total: f64 = self.strategy_mix.values().sum();
        if total <= 0.0 {
            return Err(ConfigError::StrategyMix("proportions sum to zero".into()));
        }
        Ok(self
            .strategy_mix
            .iter()
            .map(|(&kind, &p)| (kind, p / total))
            .collect())
    }

    /// Builder helper: a single strategy for every agent.
    pub fn with_uniform_strategy(mut self, kind: StrategyKind) -> Self {
        self.strategy_mix = BTreeMap::from([(kind, 1.0)]);
        self
    }
}
