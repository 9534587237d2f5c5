//! Entity value types: players, food pellets and safe-zone obstacles
//!
//! Radius and speed are pure functions of mass (and, for speed, the boost
//! clock). They are recomputed on every read and never stored.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use crate::game::constants::{boost, food, player};
use crate::util::vec2::Vec2;

/// Stable external player identifier (kept across respawns)
pub type PlayerId = Uuid;

/// Food pellet identifier (monotonically increasing, never reused)
pub type FoodId = u64;

/// Key stored in the spatial index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    Player(PlayerId),
    Food(FoodId),
}

/// radius = sqrt(mass) * RADIUS_MULTIPLIER
#[inline]
pub fn mass_to_radius(mass: f32) -> f32 {
    mass.sqrt() * player::RADIUS_MULTIPLIER
}

/// base speed = BASE_SPEED / mass^SPEED_EXPONENT
#[inline]
pub fn base_speed(mass: f32) -> f32 {
    player::BASE_SPEED / mass.powf(player::SPEED_EXPONENT)
}

/// Player state
#[derive(Debug, Clone)]
pub struct Player {
    /// Unique player identifier
    pub id: PlayerId,
    /// Player display name
    pub name: String,
    /// Center position in world space
    pub position: Vec2,
    /// Current mass; only grows, reset by respawn
    pub mass: f32,
    /// Last submitted movement target (defaults to map origin)
    pub target: Vec2,
    /// Whether player is alive; alive -> dead is terminal for this record
    pub alive: bool,
    /// Boost is active while `now < boost_until`
    pub boost_until: Option<Instant>,
    /// Palette index
    pub color_index: u8,
    /// Join order, used for deterministic resolution and tie-breaks
    pub join_seq: u64,
}

impl Player {
    pub fn new(id: PlayerId, name: String, position: Vec2, color_index: u8, join_seq: u64) -> Self {
        Self {
            id,
            name,
            position,
            mass: player::START_MASS,
            target: Vec2::ZERO,
            alive: true,
            boost_until: None,
            color_index,
            join_seq,
        }
    }

    /// Collision radius based on current mass
    #[inline]
    pub fn radius(&self) -> f32 {
        mass_to_radius(self.mass)
    }

    /// Speed before boost
    #[inline]
    pub fn base_speed(&self) -> f32 {
        base_speed(self.mass)
    }

    /// Whether the boost is active at `now`
    #[inline]
    pub fn is_boosted(&self, now: Instant) -> bool {
        self.boost_until.is_some_and(|until| now < until)
    }

    /// Speed including any active boost
    pub fn effective_speed(&self, now: Instant) -> f32 {
        if self.is_boosted(now) {
            self.base_speed() * boost::MULTIPLIER
        } else {
            self.base_speed()
        }
    }

    /// Start (or restart) a boost lasting `boost::DURATION` from `now`
    pub fn activate_boost(&mut self, now: Instant) {
        self.boost_until = Some(now + boost::DURATION);
    }
}

/// Food pellet
#[derive(Debug, Clone)]
pub struct Food {
    pub id: FoodId,
    pub position: Vec2,
    pub color_index: u8,
}

impl Food {
    pub fn new(id: FoodId, position: Vec2, color_index: u8) -> Self {
        Self {
            id,
            position,
            color_index,
        }
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        food::MASS
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        food::RADIUS
    }
}

/// Static axis-aligned safe zone; no player-vs-player eating inside
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Obstacle {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Inclusive point containment
    #[inline]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

impl From<(f32, f32, f32, f32)> for Obstacle {
    fn from((x, y, width, height): (f32, f32, f32, f32)) -> Self {
        Self::new(x, y, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_player(mass: f32) -> Player {
        let mut p = Player::new(Uuid::new_v4(), "Test".to_string(), Vec2::new(500.0, 500.0), 0, 0);
        p.mass = mass;
        p
    }

    #[test]
    fn test_player_new() {
        let p = Player::new(Uuid::new_v4(), "Blob".to_string(), Vec2::new(1.0, 2.0), 3, 7);
        assert_eq!(p.mass, player::START_MASS);
        assert_eq!(p.target, Vec2::ZERO);
        assert!(p.alive);
        assert!(p.boost_until.is_none());
        assert_eq!(p.join_seq, 7);
    }

    #[test]
    fn test_radius_from_mass() {
        assert!((mass_to_radius(100.0) - 15.0).abs() < 0.001);
        assert!((test_player(50.0).radius() - 50f32.sqrt() * 1.5).abs() < 0.001);
    }

    #[test]
    fn test_radius_recomputed_after_growth() {
        let mut p = test_player(100.0);
        let before = p.radius();
        p.mass += 44.0;
        assert!((p.radius() - 18.0).abs() < 0.001);
        assert!(p.radius() > before);
    }

    #[test]
    fn test_speed_decreases_with_mass() {
        assert!((base_speed(100.0) - 60.0).abs() < 0.001);
        assert!((base_speed(400.0) - 30.0).abs() < 0.001);
        assert!(base_speed(50.0) > base_speed(51.0));
    }

    #[test]
    fn test_boost_doubles_speed_until_expiry() {
        let now = Instant::now();
        let mut p = test_player(100.0);
        assert_eq!(p.effective_speed(now), p.base_speed());

        p.activate_boost(now);
        assert!(p.is_boosted(now));
        assert!((p.effective_speed(now) - 120.0).abs() < 0.001);
        assert!(p.is_boosted(now + Duration::from_millis(2999)));

        // Expiry instant itself is no longer boosted (strict <)
        let expiry = now + boost::DURATION;
        assert!(!p.is_boosted(expiry));
        assert_eq!(p.effective_speed(expiry), p.base_speed());
    }

    #[test]
    fn test_food_constants() {
        let f = Food::new(1, Vec2::new(10.0, 10.0), 2);
        assert_eq!(f.mass(), food::MASS);
        assert_eq!(f.radius(), food::RADIUS);
    }

    #[test]
    fn test_obstacle_contains_inclusive() {
        let o = Obstacle::new(400.0, 400.0, 200.0, 200.0);
        assert!(o.contains(Vec2::new(400.0, 400.0)));
        assert!(o.contains(Vec2::new(600.0, 600.0)));
        assert!(o.contains(Vec2::new(500.0, 500.0)));
        assert!(!o.contains(Vec2::new(600.01, 500.0)));
        assert!(!o.contains(Vec2::new(399.99, 500.0)));
    }

    #[test]
    fn test_entity_key_ordering() {
        assert!(EntityKey::Food(1) < EntityKey::Food(2));
        assert_ne!(EntityKey::Food(1), EntityKey::Player(Uuid::nil()));
    }
}
