use rayon::prelude::*;
use std::time::Instant;

use crate::game::constants::movement::{DEAD_ZONE, PROXIMITY_SCALE};
use crate::game::entity::{EntityKey, PlayerId};
use crate::game::state::SimulationState;
use crate::util::vec2::Vec2;

/// Move every alive player toward its target and re-index the ones that moved.
///
/// Steps are computed in parallel from start-of-tick positions (players do not
/// see each other's movement within a tick). Each closure writes only its own
/// player record; the shared index is updated sequentially afterwards.
/// Returns the number of players that moved.
pub fn update(state: &mut SimulationState, dt: f32, now: Instant) -> usize {
    let (width, height) = (state.config.map_width, state.config.map_height);

    let moved: Vec<(PlayerId, Vec2, f32)> = state
        .players
        .par_values_mut()
        .filter_map(|player| {
            if !player.alive {
                return None;
            }
            let radius = player.radius();
            let next = step(
                player.position,
                player.target,
                player.effective_speed(now),
                radius,
                dt,
                width,
                height,
            )?;
            player.position = next;
            Some((player.id, next, radius))
        })
        .collect();

    for (id, position, radius) in &moved {
        state
            .index
            .insert_or_update(EntityKey::Player(*id), position.x, position.y, *radius);
    }

    moved.len()
}

/// Next position for one player, or None if it stays put.
///
/// Targets within the dead zone are ignored. Closer targets throttle the step
/// linearly up to PROXIMITY_SCALE, beyond which the player moves at full
/// speed. The result keeps the whole disk inside the map.
pub fn step(
    position: Vec2,
    target: Vec2,
    speed: f32,
    radius: f32,
    dt: f32,
    width: f32,
    height: f32,
) -> Option<Vec2> {
    let (direction, distance) = (target - position).normalize_with_length();
    if distance <= DEAD_ZONE {
        return None;
    }

    let throttle = (distance / PROXIMITY_SCALE).min(1.0);
    let next = (position + direction * (speed * throttle * dt)).clamp_disk(radius, width, height);

    if next == position {
        None
    } else {
        Some(next)
    }
}
