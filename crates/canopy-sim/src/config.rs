//! Simulation configuration.

use canopy_topology::{GeneratorConfig, Weight, DEFAULT_MAX_DEGREE, DEFAULT_MAX_WEIGHT};
use tracing::warn;

/// Configuration for a simulated run on a generated topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Number of nodes
    pub node_count: usize,
    /// Seed for topology generation
    pub seed: u64,
    /// Nearest-peer degree bound
    pub max_degree: usize,
    /// Largest link weight
    pub max_weight: Weight,
    /// Hard cap on rounds; `None` uses the schedule's bound
    pub round_limit: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            node_count: 10,
            seed: 42,
            max_degree: DEFAULT_MAX_DEGREE,
            max_weight: DEFAULT_MAX_WEIGHT,
            round_limit: None,
        }
    }
}

impl SimulationConfig {
    /// Read `CANOPY_NODES`, `CANOPY_SEED`, `CANOPY_MAX_DEGREE`,
    /// `CANOPY_MAX_WEIGHT` and `CANOPY_ROUND_LIMIT`, falling back to the
    /// defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            node_count: env_or("CANOPY_NODES", defaults.node_count),
            seed: env_or("CANOPY_SEED", defaults.seed),
            max_degree: env_or("CANOPY_MAX_DEGREE", defaults.max_degree),
            max_weight: env_or("CANOPY_MAX_WEIGHT", defaults.max_weight),
            round_limit: std::env::var("CANOPY_ROUND_LIMIT")
                .ok()
                .and_then(|raw| raw.parse().ok()),
        }
    }

    #[must_use]
    pub fn with_nodes(mut self, node_count: usize) -> Self {
        self.node_count = node_count;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_max_degree(mut self, max_degree: usize) -> Self {
        self.max_degree = max_degree;
        self
    }

    #[must_use]
    pub fn with_max_weight(mut self, max_weight: Weight) -> Self {
        self.max_weight = max_weight;
        self
    }

    #[must_use]
    pub fn with_round_limit(mut self, rounds: u64) -> Self {
        self.round_limit = Some(rounds);
        self
    }

    /// Generator parameters for this run's topology.
    pub fn generator(&self) -> GeneratorConfig {
        GeneratorConfig::with_nodes(self.node_count)
            .with_seed(self.seed)
            .with_max_degree(self.max_degree)
            .with_max_weight(self.max_weight)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(%key, %raw, "ignoring unparsable value");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = SimulationConfig::default()
            .with_nodes(30)
            .with_seed(9)
            .with_round_limit(500);
        assert_eq!(config.node_count, 30);
        assert_eq!(config.seed, 9);
        assert_eq!(config.round_limit, Some(500));
        assert_eq!(config.max_degree, DEFAULT_MAX_DEGREE);
    }

    #[test]
    fn generator_mirrors_config() {
        let generator = SimulationConfig::default().with_nodes(5).with_seed(3).generator();
        assert_eq!(generator.node_count, 5);
        assert_eq!(generator.seed, 3);
        assert_eq!(generator.max_weight, DEFAULT_MAX_WEIGHT);
    }
}
