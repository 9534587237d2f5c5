//! Simulation state
//!
//! Owns every player and food pellet plus the spatial index over them. No
//! other component mutates these tables; external intents reach the state
//! through the game loop, one tick at a time.

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

use crate::config::SimulationConfig;
use crate::game::constants::{player, spawn, PALETTE};
use crate::game::entity::{mass_to_radius, EntityKey, Food, FoodId, Obstacle, Player, PlayerId};
use crate::game::spatial::SpatialIndex;
use crate::game::systems::{collision, food, movement};
use crate::util::vec2::Vec2;

/// What happened during one `advance`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Players that died this tick, in the order they were eaten
    pub deaths: Vec<PlayerId>,
    /// Players that moved (and were re-indexed)
    pub moved: usize,
    /// Food pellets eaten (and replaced)
    pub food_eaten: u32,
    /// Player-vs-player consumptions
    pub players_eaten: u32,
}

/// Complete simulation state
pub struct SimulationState {
    pub(crate) config: SimulationConfig,
    pub(crate) players: HashMap<PlayerId, Player>,
    pub(crate) food: HashMap<FoodId, Food>,
    pub(crate) index: SpatialIndex<EntityKey>,
    pub(crate) rng: StdRng,
    next_food_id: FoodId,
    next_join_seq: u64,
    next_color: u8,
    tick: u64,
}

impl SimulationState {
    /// Build a fresh simulation and spawn the initial food population
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let index = SpatialIndex::new(config.map_width, config.map_height, config.cell_size);

        let mut state = Self {
            players: HashMap::with_capacity(config.max_players),
            food: HashMap::with_capacity(config.food_count),
            index,
            rng,
            next_food_id: 0,
            next_join_seq: 0,
            next_color: 0,
            tick: 0,
            config,
        };

        food::spawn_initial(&mut state);
        tracing::debug!(
            "Simulation ready: {}x{} map, {} food, grid {:?}",
            state.config.map_width,
            state.config.map_height,
            state.food.len(),
            state.index.grid_dimensions()
        );
        state
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Completed ticks
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.config.obstacles
    }

    pub fn index(&self) -> &SpatialIndex<EntityKey> {
        &self.index
    }

    /// Get player by ID - O(1) with HashMap
    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Get mutable player by ID, for tests and tooling that stage scenarios
    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn get_food(&self, id: FoodId) -> Option<&Food> {
        self.food.get(&id)
    }

    /// All players (alive and dead-awaiting-respawn)
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn food(&self) -> impl Iterator<Item = &Food> {
        self.food.values()
    }

    /// Alive players in join order
    pub fn alive_players(&self) -> Vec<&Player> {
        let mut alive: Vec<&Player> = self.players.values().filter(|p| p.alive).collect();
        alive.sort_unstable_by_key(|p| p.join_seq);
        alive
    }

    /// Ids of alive players in join order (collision resolution order)
    pub(crate) fn alive_ids_in_join_order(&self) -> Vec<PlayerId> {
        self.alive_players().into_iter().map(|p| p.id).collect()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }

    pub fn food_count(&self) -> usize {
        self.food.len()
    }

    /// Sum of alive player mass and food mass
    pub fn total_mass(&self) -> f32 {
        let players: f32 = self.players.values().filter(|p| p.alive).map(|p| p.mass).sum();
        let food: f32 = self.food.values().map(|f| f.mass()).sum();
        players + food
    }

    /// Top `limit` alive players by mass (descending, ties by join order)
    pub fn leaderboard(&self, limit: usize) -> Vec<&Player> {
        let mut ranked = self.alive_players();
        ranked.sort_by(|a, b| {
            b.mass
                .partial_cmp(&a.mass)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.join_seq.cmp(&b.join_seq))
        });
        ranked.truncate(limit);
        ranked
    }

    /// Whether a point lies inside any safe zone
    pub fn in_safe_zone(&self, point: Vec2) -> bool {
        self.config.obstacles.iter().any(|o| o.contains(point))
    }

    /// Add a player. An existing entity under the same id is torn down first.
    /// Returns None when the server is full.
    pub fn join(&mut self, id: PlayerId, name: String) -> Option<&Player> {
        let replacing = self.players.contains_key(&id);
        if !replacing && self.players.len() >= self.config.max_players {
            tracing::warn!("Join refused for {} ({}): {} players", name, id, self.players.len());
            return None;
        }
        if replacing {
            self.leave(id);
        }

        let position = self.find_spawn_position();
        let color_index = self.next_color;
        self.next_color = ((self.next_color as usize + 1) % PALETTE.len()) as u8;
        let join_seq = self.next_join_seq;
        self.next_join_seq += 1;

        let player = Player::new(id, name, position, color_index, join_seq);
        self.index.insert_or_update(
            EntityKey::Player(id),
            position.x,
            position.y,
            player.radius(),
        );
        tracing::debug!(
            "Player {} ({}) spawned at ({:.1}, {:.1})",
            player.name,
            id,
            position.x,
            position.y
        );

        self.players.insert(id, player);
        self.players.get(&id)
    }

    /// Destroy and recreate the player entity (fresh mass and position)
    pub fn respawn(&mut self, id: PlayerId, name: String) -> Option<&Player> {
        self.join(id, name)
    }

    /// Remove a player and its index entries. Unknown ids are a no-op.
    pub fn leave(&mut self, id: PlayerId) -> bool {
        self.index.remove(EntityKey::Player(id));
        self.players.remove(&id).is_some()
    }

    /// Store a movement target. Finite values are kept as sent and movement
    /// clamps; infinities pin to the map edge and NaN keeps the current axis.
    pub fn set_move_target(&mut self, id: PlayerId, x: f32, y: f32) {
        let (w, h) = (self.config.map_width, self.config.map_height);
        if let Some(player) = self.players.get_mut(&id) {
            player.target = Vec2::new(
                finite_target(x, w, player.position.x),
                finite_target(y, h, player.position.y),
            );
        }
    }

    /// Boost for a fixed wall-clock duration from `now`
    pub fn activate_boost(&mut self, id: PlayerId, now: Instant) {
        if let Some(player) = self.players.get_mut(&id) {
            if player.alive {
                player.activate_boost(now);
            }
        }
    }

    /// One simulation step: movement, index maintenance, collision resolution
    pub fn advance(&mut self, dt: f32, now: Instant) -> TickReport {
        let moved = movement::update(self, dt, now);
        let collisions = collision::resolve(self);
        self.tick += 1;

        TickReport {
            players_eaten: collisions.kills.len() as u32,
            deaths: collisions.kills.into_iter().map(|(_, victim)| victim).collect(),
            moved,
            food_eaten: collisions.food_eaten,
        }
    }

    /// Allocate a new food id
    pub(crate) fn next_food_id(&mut self) -> FoodId {
        let id = self.next_food_id;
        self.next_food_id += 1;
        id
    }

    /// Re-register a player under its current position and radius
    pub(crate) fn reindex_player(&mut self, id: PlayerId) {
        if let Some(p) = self.players.get(&id) {
            if p.alive {
                self.index.insert_or_update(
                    EntityKey::Player(id),
                    p.position.x,
                    p.position.y,
                    p.radius(),
                );
            }
        }
    }

    /// Random point within the spawn margin whose disk does not overlap an
    /// alive player; falls back to the last sample after MAX_SPAWN_ATTEMPTS
    fn find_spawn_position(&mut self) -> Vec2 {
        let radius = mass_to_radius(player::START_MASS);
        let (w, h) = (self.config.map_width, self.config.map_height);
        let mut candidate = Vec2::new(w * 0.5, h * 0.5);

        for _ in 0..spawn::MAX_SPAWN_ATTEMPTS {
            candidate = Vec2::new(
                sample_axis(&mut self.rng, w, spawn::MARGIN),
                sample_axis(&mut self.rng, h, spawn::MARGIN),
            );
            let clear = self
                .index
                .query(candidate.x, candidate.y, radius)
                .into_iter()
                .filter_map(|key| match key {
                    EntityKey::Player(pid) => self.players.get(&pid),
                    EntityKey::Food(_) => None,
                })
                .all(|other| {
                    !other.alive
                        || candidate.distance_to(other.position) >= radius + other.radius()
                });
            if clear {
                return candidate;
            }
        }
        candidate
    }

    /// Verify table/index consistency and the constant food population
    pub fn check_invariants(&self) -> Result<(), String> {
        if !self.index.is_consistent() {
            return Err("spatial index forward/reverse maps disagree".to_string());
        }
        if self.food.len() != self.config.food_count {
            return Err(format!(
                "food population {} != configured {}",
                self.food.len(),
                self.config.food_count
            ));
        }
        for key in self.index.ids() {
            match key {
                EntityKey::Food(id) if !self.food.contains_key(&id) => {
                    return Err(format!("food {} indexed but missing from table", id));
                }
                EntityKey::Player(id) => match self.players.get(&id) {
                    None => return Err(format!("player {} indexed but missing from table", id)),
                    Some(p) if !p.alive => return Err(format!("dead player {} still indexed", id)),
                    _ => {}
                },
                _ => {}
            }
        }
        for f in self.food.values() {
            if !self.index.contains(EntityKey::Food(f.id)) {
                return Err(format!("food {} not indexed", f.id));
            }
        }
        for p in self.players.values().filter(|p| p.alive) {
            if !self.index.contains(EntityKey::Player(p.id)) {
                return Err(format!("alive player {} not indexed", p.id));
            }
            if !(p.position.x.is_finite() && p.position.y.is_finite()) {
                return Err(format!("player {} has non-finite position {:?}", p.id, p.position));
            }
        }
        Ok(())
    }
}

fn finite_target(value: f32, extent: f32, current: f32) -> f32 {
    if value.is_nan() {
        current
    } else if value.is_infinite() {
        value.clamp(0.0, extent)
    } else {
        value
    }
}

/// Uniform sample along one axis, inside `margin` when the map is large enough
fn sample_axis(rng: &mut StdRng, extent: f32, margin: f32) -> f32 {
    if extent > margin * 2.0 {
        rng.gen_range(margin..=extent - margin)
    } else {
        rng.gen_range(0.0..=extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::food as food_consts;
    use uuid::Uuid;

    fn seeded_state() -> SimulationState {
        SimulationState::new(SimulationConfig::seeded(7))
    }

    #[test]
    fn test_new_spawns_food() {
        let state = seeded_state();
        assert_eq!(state.food_count(), food_consts::COUNT);
        assert_eq!(state.index().len(), food_consts::COUNT);
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_join_creates_player_inside_margin() {
        let mut state = seeded_state();
        let id = Uuid::new_v4();
        let player = state.join(id, "Alice".to_string()).unwrap();

        assert_eq!(player.mass, player::START_MASS);
        assert!(player.position.x >= spawn::MARGIN && player.position.x <= 2000.0 - spawn::MARGIN);
        assert!(player.position.y >= spawn::MARGIN && player.position.y <= 2000.0 - spawn::MARGIN);
        assert!(state.index().contains(EntityKey::Player(id)));
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_join_rotates_palette() {
        let mut state = seeded_state();
        let colors: Vec<u8> = (0..12)
            .map(|i| state.join(Uuid::new_v4(), format!("P{}", i)).unwrap().color_index)
            .collect();
        assert_eq!(&colors[..3], &[0, 1, 2]);
        assert_eq!(colors[10], 0);
        assert_eq!(colors[11], 1);
    }

    #[test]
    fn test_join_refused_at_capacity() {
        let mut state = SimulationState::new(SimulationConfig {
            max_players: 2,
            ..SimulationConfig::seeded(1)
        });
        assert!(state.join(Uuid::new_v4(), "A".to_string()).is_some());
        assert!(state.join(Uuid::new_v4(), "B".to_string()).is_some());
        assert!(state.join(Uuid::new_v4(), "C".to_string()).is_none());
        assert_eq!(state.player_count(), 2);
    }

    #[test]
    fn test_rejoin_same_id_replaces_entity() {
        let mut state = seeded_state();
        let id = Uuid::new_v4();
        state.join(id, "First".to_string());
        state.get_player_mut(id).unwrap().mass = 300.0;

        let again = state.join(id, "Second".to_string()).unwrap();
        assert_eq!(again.name, "Second");
        assert_eq!(again.mass, player::START_MASS);
        assert_eq!(state.player_count(), 1);
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_respawn_resets_dead_player() {
        let mut state = seeded_state();
        let id = Uuid::new_v4();
        state.join(id, "Bob".to_string());
        let first_seq = state.get_player(id).unwrap().join_seq;

        // Simulate death
        state.get_player_mut(id).unwrap().alive = false;
        state.index.remove(EntityKey::Player(id));

        let p = state.respawn(id, "Bob".to_string()).unwrap();
        assert!(p.alive);
        assert_eq!(p.mass, player::START_MASS);
        assert!(p.join_seq > first_seq, "respawn creates a fresh record");
        assert!(state.index().contains(EntityKey::Player(id)));
    }

    #[test]
    fn test_leave_removes_everything() {
        let mut state = seeded_state();
        let id = Uuid::new_v4();
        state.join(id, "Carol".to_string());

        assert!(state.leave(id));
        assert!(state.get_player(id).is_none());
        assert!(!state.index().contains(EntityKey::Player(id)));
        assert!(!state.leave(id), "second leave is a no-op");
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut state = seeded_state();
        let ghost = Uuid::new_v4();
        state.set_move_target(ghost, 10.0, 10.0);
        state.activate_boost(ghost, Instant::now());
        assert!(!state.leave(ghost));
        assert_eq!(state.player_count(), 0);
    }

    #[test]
    fn test_set_move_target_accepts_out_of_range() {
        let mut state = seeded_state();
        let id = Uuid::new_v4();
        state.join(id, "Dan".to_string());
        state.set_move_target(id, -500.0, 99999.0);
        assert_eq!(state.get_player(id).unwrap().target, Vec2::new(-500.0, 99999.0));
    }

    #[test]
    fn test_non_finite_target_stays_on_map() {
        let mut state = seeded_state();
        let id = Uuid::new_v4();
        state.join(id, "Nan".to_string());
        let start = state.get_player(id).unwrap().position;

        state.set_move_target(id, f32::INFINITY, f32::NAN);
        assert_eq!(state.get_player(id).unwrap().target, Vec2::new(2000.0, start.y));
        state.set_move_target(id, f32::NEG_INFINITY, 1000.0);
        assert_eq!(state.get_player(id).unwrap().target, Vec2::new(0.0, 1000.0));

        for _ in 0..20 {
            state.advance(0.05, Instant::now());
        }
        let p = state.get_player(id).unwrap();
        assert!(p.position.x.is_finite() && p.position.y.is_finite());
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_invariants_reject_non_finite_position() {
        let mut state = seeded_state();
        let id = Uuid::new_v4();
        state.join(id, "Bad".to_string());
        state.get_player_mut(id).unwrap().position = Vec2::new(f32::NAN, 100.0);
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn test_leaderboard_order() {
        let mut state = seeded_state();
        let ids: Vec<PlayerId> = (0..4).map(|_| Uuid::new_v4()).collect();
        for (i, id) in ids.iter().enumerate() {
            state.join(*id, format!("P{}", i));
        }
        state.get_player_mut(ids[0]).unwrap().mass = 80.0;
        state.get_player_mut(ids[1]).unwrap().mass = 200.0;
        state.get_player_mut(ids[2]).unwrap().mass = 80.0;
        state.get_player_mut(ids[3]).unwrap().alive = false;

        let board: Vec<PlayerId> = state.leaderboard(10).iter().map(|p| p.id).collect();
        assert_eq!(board, vec![ids[1], ids[0], ids[2]]);
        assert_eq!(state.leaderboard(1).len(), 1);
    }

    #[test]
    fn test_safe_zone_lookup() {
        let state = seeded_state();
        assert!(state.in_safe_zone(Vec2::new(500.0, 500.0)));
        assert!(state.in_safe_zone(Vec2::new(100.0, 100.0)));
        assert!(!state.in_safe_zone(Vec2::new(1000.0, 1000.0)));
    }

    #[test]
    fn test_seeded_states_match() {
        let a = seeded_state();
        let b = seeded_state();
        let layout = |s: &SimulationState| -> Vec<(FoodId, f32, f32)> {
            s.food().map(|f| (f.id, f.position.x, f.position.y)).collect()
        };
        let mut fa = layout(&a);
        let mut fb = layout(&b);
        fa.sort_by_key(|f| f.0);
        fb.sort_by_key(|f| f.0);
        assert_eq!(fa, fb);
    }
}
