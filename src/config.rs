use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::game::constants::{food, map, player, snapshot, tick, OBSTACLES};
use crate::game::entity::Obstacle;

/// Simulation parameters (map, grid, population)
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Map width in world units
    pub map_width: f32,
    /// Map height in world units
    pub map_height: f32,
    /// Spatial grid cell size
    pub cell_size: f32,
    /// Constant food population
    pub food_count: usize,
    /// Maximum concurrent players (joins beyond this are refused)
    pub max_players: usize,
    /// Leaderboard length in snapshots
    pub leaderboard_size: usize,
    /// Static safe zones
    pub obstacles: Vec<Obstacle>,
    /// Fixed RNG seed for reproducible runs (random if None)
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            map_width: map::WIDTH,
            map_height: map::HEIGHT,
            cell_size: map::GRID_CELL_SIZE,
            food_count: food::COUNT,
            max_players: player::MAX_PLAYERS,
            leaderboard_size: snapshot::LEADERBOARD_SIZE,
            obstacles: OBSTACLES.iter().copied().map(Obstacle::from).collect(),
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Defaults with a fixed seed, for tests and benchmarks
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Apply environment overrides on top of the current values
    pub fn apply_env(&mut self) {
        let positive = |v: &f32| v.is_finite() && *v > 0.0;
        override_from_env("MAP_WIDTH", &mut self.map_width, positive);
        override_from_env("MAP_HEIGHT", &mut self.map_height, positive);
        override_from_env("GRID_CELL_SIZE", &mut self.cell_size, positive);
        override_from_env("FOOD_COUNT", &mut self.food_count, |v| *v <= 100_000);
        override_from_env("MAX_PLAYERS", &mut self.max_players, |v| (1..=10_000).contains(v));
        override_from_env("LEADERBOARD_SIZE", &mut self.leaderboard_size, |v| *v <= 100);

        if let Ok(seed) = std::env::var("SIM_SEED") {
            match seed.parse::<u64>() {
                Ok(parsed) => self.seed = Some(parsed),
                Err(_) => tracing::warn!("Invalid SIM_SEED '{}', using random seed", seed),
            }
        }
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !(positive(self.map_width) && positive(self.map_height)) {
            return Err(ConfigError::InvalidMap {
                width: self.map_width,
                height: self.map_height,
            });
        }
        if !positive(self.cell_size) {
            return Err(ConfigError::InvalidCellSize(self.cell_size));
        }
        let cells = (self.map_width as f64 / self.cell_size as f64).ceil()
            * (self.map_height as f64 / self.cell_size as f64).ceil();
        if cells > map::MAX_GRID_CELLS {
            return Err(ConfigError::TooManyCells(cells as u64));
        }
        if self.max_players == 0 {
            return Err(ConfigError::NoPlayerCapacity);
        }
        for (index, o) in self.obstacles.iter().enumerate() {
            let inside = o.x >= 0.0
                && o.y >= 0.0
                && o.width >= 0.0
                && o.height >= 0.0
                && o.x + o.width <= self.map_width
                && o.y + o.height <= self.map_height;
            if !inside {
                return Err(ConfigError::ObstacleOutOfBounds(index));
            }
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the metrics/health endpoint binds to
    pub metrics_bind_address: IpAddr,
    /// Port for the metrics/health endpoint
    pub metrics_port: u16,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Capacity of the intent queue between transport and tick loop
    pub intent_capacity: usize,
    /// Simulation parameters
    pub simulation: SimulationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            metrics_port: 9090,
            tick_rate: tick::RATE,
            intent_capacity: tick::INTENT_CAPACITY,
            simulation: SimulationConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("METRICS_BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse() {
                config.metrics_bind_address = parsed;
            } else {
                tracing::warn!("Invalid METRICS_BIND_ADDRESS '{}', using default", addr);
            }
        }

        override_from_env("METRICS_PORT", &mut config.metrics_port, |v| *v > 0);
        override_from_env("TICK_RATE", &mut config.tick_rate, |v| (1..=240).contains(v));
        override_from_env("INTENT_CAPACITY", &mut config.intent_capacity, |v| *v > 0);

        config.simulation.apply_env();
        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metrics_port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if !(1..=240).contains(&self.tick_rate) {
            return Err(ConfigError::InvalidTickRate(self.tick_rate));
        }
        if self.intent_capacity == 0 {
            return Err(ConfigError::NoIntentCapacity);
        }
        self.simulation.validate()
    }
}

/// Read `key` from the environment into `slot` if it parses and passes `accept`
fn override_from_env<T, F>(key: &str, slot: &mut T, accept: F)
where
    T: FromStr,
    F: Fn(&T) -> bool,
{
    let Ok(raw) = std::env::var(key) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(parsed) if accept(&parsed) => *slot = parsed,
        Ok(_) => tracing::warn!("{} '{}' out of range, using default", key, raw),
        Err(_) => tracing::warn!("Invalid {} '{}', using default", key, raw),
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("map must have positive size, got {width}x{height}")]
    InvalidMap { width: f32, height: f32 },
    #[error("cell size must be positive, got {0}")]
    InvalidCellSize(f32),
    #[error("grid would have {0} cells, raise the cell size")]
    TooManyCells(u64),
    #[error("max_players must be at least 1")]
    NoPlayerCapacity,
    #[error("obstacle #{0} lies outside the map")]
    ObstacleOutOfBounds(usize),
    #[error("metrics port cannot be 0")]
    InvalidPort,
    #[error("tick rate must be 1-240 Hz, got {0}")]
    InvalidTickRate(u32),
    #[error("intent capacity must be at least 1")]
    NoIntentCapacity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.simulation.food_count, 200);
        assert_eq!(config.simulation.max_players, 100);
        assert_eq!(config.simulation.obstacles.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = ServerConfig::load_or_default();
        assert!(config.metrics_port > 0);
        assert!(config.tick_rate > 0);
    }

    #[test]
    fn test_seeded() {
        let config = SimulationConfig::seeded(42);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.map_width, map::WIDTH);
    }

    #[test]
    fn test_validate_rejects_bad_cell_size() {
        let config = SimulationConfig {
            cell_size: 0.0,
            ..SimulationConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidCellSize(0.0)));
    }

    #[test]
    fn test_validate_rejects_infinite_map() {
        let config = SimulationConfig {
            map_width: f32::INFINITY,
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMap { .. })));

        let config = SimulationConfig {
            cell_size: f32::NAN,
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCellSize(_))));
    }

    #[test]
    fn test_validate_rejects_tiny_cells() {
        let config = SimulationConfig {
            cell_size: 0.5,
            ..SimulationConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::TooManyCells(16_000_000)));
    }

    #[test]
    fn test_validate_rejects_obstacle_outside_map() {
        let mut config = SimulationConfig::default();
        config.obstacles.push(Obstacle::new(1900.0, 0.0, 200.0, 50.0));
        assert_eq!(config.validate(), Err(ConfigError::ObstacleOutOfBounds(5)));
    }

    #[test]
    fn test_validate_rejects_tick_rate() {
        let config = ServerConfig {
            tick_rate: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidTickRate(0)));
    }

    #[test]
    fn test_validate_rejects_zero_players() {
        let config = SimulationConfig {
            max_players: 0,
            ..SimulationConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoPlayerCapacity));
    }
}
