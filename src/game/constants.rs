/// Map and spatial grid defaults (overridable via `SimulationConfig`)
pub mod map {
    /// Map width in world units
    pub const WIDTH: f32 = 2000.0;
    /// Map height in world units
    pub const HEIGHT: f32 = 2000.0;
    /// Spatial grid cell edge length (2000 / 200 = 10x10 cells)
    pub const GRID_CELL_SIZE: f32 = 200.0;
    /// Upper bound on grid cells a configuration may produce
    pub const MAX_GRID_CELLS: f64 = 1_000_000.0;
}

/// Player mass, size and speed rules
pub mod player {
    /// Mass on join and on respawn
    pub const START_MASS: f32 = 50.0;
    /// Speed numerator: base_speed = BASE_SPEED / mass^SPEED_EXPONENT
    pub const BASE_SPEED: f32 = 600.0;
    /// radius = sqrt(mass) * RADIUS_MULTIPLIER
    pub const RADIUS_MULTIPLIER: f32 = 1.5;
    /// Larger players are slower (0.5 = inverse sqrt)
    pub const SPEED_EXPONENT: f32 = 0.5;
    /// Default cap on concurrent players
    pub const MAX_PLAYERS: usize = 100;
}

/// Food pellet rules
pub mod food {
    /// Constant pellet population
    pub const COUNT: usize = 200;
    /// Mass gained per pellet
    pub const MASS: f32 = 5.0;
    /// Fixed pellet radius
    pub const RADIUS: f32 = 8.0;
}

/// Player-vs-player eating
pub mod eat {
    /// Eater must be strictly heavier than victim * MASS_RATIO
    pub const MASS_RATIO: f32 = 1.1;
}

/// Movement integration
pub mod movement {
    /// Targets closer than this do not move the player (no jitter)
    pub const DEAD_ZONE: f32 = 5.0;
    /// Distance at which a target yields full speed; closer targets throttle linearly
    pub const PROXIMITY_SCALE: f32 = 150.0;
}

/// Boost ability
pub mod boost {
    use std::time::Duration;

    /// Wall-clock duration of a boost
    pub const DURATION: Duration = Duration::from_secs(3);
    /// Speed multiplier while boosted
    pub const MULTIPLIER: f32 = 2.0;
}

/// Spawn placement
pub mod spawn {
    /// Players spawn at least this far from the map edges
    pub const MARGIN: f32 = 100.0;
    /// Attempts to find a position not overlapping another player
    pub const MAX_SPAWN_ATTEMPTS: u32 = 30;
}

/// Tick timing
pub mod tick {
    /// Default server tick rate in Hz
    pub const RATE: u32 = 20;
    /// Largest dt a single tick may integrate (seconds); a stalled loop does not teleport players
    pub const MAX_DT: f32 = 0.25;
    /// Default intent queue capacity
    pub const INTENT_CAPACITY: usize = 4096;
}

/// Snapshot contents
pub mod snapshot {
    /// Decimal places kept for positions, mass and radius on the wire
    pub const DECIMALS: u32 = 2;
    /// Leaderboard length
    pub const LEADERBOARD_SIZE: usize = 10;
}

/// Colour palette shared by food and players (players rotate through it on join)
pub const PALETTE: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8",
    "#F7DC6F", "#BB8FCE", "#85C1E2", "#F8B739", "#52C285",
];

/// Default safe zones as (x, y, width, height)
pub const OBSTACLES: [(f32, f32, f32, f32); 5] = [
    (400.0, 400.0, 200.0, 200.0),
    (100.0, 100.0, 150.0, 150.0),
    (1750.0, 100.0, 150.0, 150.0),
    (100.0, 1750.0, 150.0, 150.0),
    (1750.0, 1750.0, 150.0, 150.0),
];

/// Resolve a palette index to its hex colour
#[inline]
pub fn palette_color(index: u8) -> &'static str {
    PALETTE[index as usize % PALETTE.len()]
}
