//! Food spawning
//! Keeps the pellet population constant: an initial batch at startup and one
//! replacement per pellet eaten, each at a uniformly random position with a
//! uniformly random palette colour.

use rand::Rng;

use crate::game::constants::PALETTE;
use crate::game::entity::{EntityKey, Food, FoodId};
use crate::game::state::SimulationState;
use crate::util::vec2::Vec2;

/// Spawn the configured food population
/// Called once when the simulation is created
pub fn spawn_initial(state: &mut SimulationState) {
    for _ in 0..state.config.food_count {
        spawn_food(state);
    }
}

/// Spawn a single pellet anywhere on the map and index it
pub fn spawn_food(state: &mut SimulationState) -> FoodId {
    let id = state.next_food_id();
    let position = Vec2::new(
        state.rng.gen_range(0.0..=state.config.map_width),
        state.rng.gen_range(0.0..=state.config.map_height),
    );
    let color_index = state.rng.gen_range(0..PALETTE.len()) as u8;

    let pellet = Food::new(id, position, color_index);
    state
        .index
        .insert_or_update(EntityKey::Food(id), position.x, position.y, pellet.radius());
    state.food.insert(id, pellet);
    id
}

/// Remove an eaten pellet and spawn its replacement.
/// Returns the replacement's id, or None if the pellet was already gone.
pub fn replace_food(state: &mut SimulationState, eaten: FoodId) -> Option<FoodId> {
    state.food.remove(&eaten)?;
    state.index.remove(EntityKey::Food(eaten));
    Some(spawn_food(state))
}
