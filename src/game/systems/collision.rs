use rustc_hash::FxHashSet;

use crate::game::constants::eat::MASS_RATIO;
use crate::game::entity::{EntityKey, FoodId, PlayerId};
use crate::game::state::SimulationState;
use crate::game::systems::food;

/// Consumption events produced by one resolution pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionReport {
    /// (eater, victim) in the order they happened
    pub kills: Vec<(PlayerId, PlayerId)>,
    /// Pellets eaten (each one already replaced)
    pub food_eaten: u32,
}

/// Resolve food and player-vs-player consumption for the whole population
///
/// Eaters are visited in join order. Each eater first consumes overlapping
/// food (ascending food id), then fights rival players (join order). A player
/// killed earlier in the pass is skipped both as eater and as victim.
pub fn resolve(state: &mut SimulationState) -> CollisionReport {
    let mut report = CollisionReport::default();
    let mut candidates: FxHashSet<EntityKey> = FxHashSet::default();
    let mut foods: Vec<FoodId> = Vec::new();
    let mut rivals: Vec<(u64, PlayerId)> = Vec::new();

    for id in state.alive_ids_in_join_order() {
        let Some(player) = state.players.get(&id) else {
            continue;
        };
        if !player.alive {
            continue;
        }

        candidates.clear();
        state
            .index
            .query_into(player.position.x, player.position.y, player.radius(), &mut candidates);

        foods.clear();
        rivals.clear();
        for key in candidates.iter() {
            match *key {
                EntityKey::Food(fid) => foods.push(fid),
                EntityKey::Player(pid) if pid != id => {
                    if let Some(other) = state.players.get(&pid) {
                        rivals.push((other.join_seq, pid));
                    }
                }
                EntityKey::Player(_) => {}
            }
        }
        foods.sort_unstable();
        rivals.sort_unstable();

        report.food_eaten += eat_food(state, id, &foods);

        for &(_, rival) in rivals.iter() {
            match fight(state, id, rival) {
                Fight::NoContact => {}
                Fight::Ate => report.kills.push((id, rival)),
                Fight::Eaten => {
                    report.kills.push((rival, id));
                    break;
                }
            }
        }
    }

    report
}

/// Eat every listed pellet the player overlaps (summed radii, strict).
/// The player's radius grows as it eats, so later pellets in the list use
/// the updated size.
fn eat_food(state: &mut SimulationState, id: PlayerId, foods: &[FoodId]) -> u32 {
    let mut eaten = 0;

    for &fid in foods {
        let Some(player) = state.players.get(&id) else {
            break;
        };
        let Some(pellet) = state.food.get(&fid) else {
            debug_assert!(false, "indexed food {} missing from table", fid);
            tracing::error!("Food {} indexed but missing from table", fid);
            continue;
        };

        if player.position.distance_to(pellet.position) >= player.radius() + pellet.radius() {
            continue;
        }

        let gained = pellet.mass();
        if let Some(player) = state.players.get_mut(&id) {
            player.mass += gained;
        }
        food::replace_food(state, fid);
        eaten += 1;
    }

    if eaten > 0 {
        state.reindex_player(id);
    }
    eaten
}

enum Fight {
    NoContact,
    Ate,
    Eaten,
}

/// Check one pair. Either side may eat the other; safe zones cancel the fight.
fn fight(state: &mut SimulationState, id: PlayerId, rival: PlayerId) -> Fight {
    let (Some(p), Some(o)) = (state.players.get(&id), state.players.get(&rival)) else {
        return Fight::NoContact;
    };
    if !p.alive || !o.alive {
        return Fight::NoContact;
    }
    if state.in_safe_zone(p.position) || state.in_safe_zone(o.position) {
        return Fight::NoContact;
    }

    let distance = p.position.distance_to(o.position);
    if can_eat(p.mass, o.mass, distance, p.radius()) {
        consume(state, id, rival);
        Fight::Ate
    } else if can_eat(o.mass, p.mass, distance, o.radius()) {
        consume(state, rival, id);
        Fight::Eaten
    } else {
        Fight::NoContact
    }
}

/// Eater must be strictly heavier than victim * MASS_RATIO and the victim's
/// center strictly inside the eater's own radius.
#[inline]
pub fn can_eat(eater_mass: f32, victim_mass: f32, distance: f32, eater_radius: f32) -> bool {
    eater_mass > victim_mass * MASS_RATIO && distance < eater_radius
}

fn consume(state: &mut SimulationState, eater: PlayerId, victim: PlayerId) {
    let Some(v) = state.players.get_mut(&victim) else {
        return;
    };
    let gained = v.mass;
    v.alive = false;
    state.index.remove(EntityKey::Player(victim));

    if let Some(e) = state.players.get_mut(&eater) {
        e.mass += gained;
        tracing::debug!(
            "Player {} ate {} (+{:.1} mass, now {:.1})",
            e.name,
            victim,
            gained,
            e.mass
        );
    }
    state.reindex_player(eater);
}
