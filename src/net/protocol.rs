use serde::{Deserialize, Serialize};

use crate::game::constants::{palette_color, snapshot::DECIMALS};
use crate::game::entity::{Food, FoodId, Obstacle, Player, PlayerId};
use crate::game::intent_buffer::Intent;
use crate::game::state::SimulationState;
use crate::util::vec2::{round_to, Vec2};

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Request to join the arena
    JoinRequest { player_name: String },
    /// Point the player should move toward (world coordinates)
    MoveTarget { x: f32, y: f32 },
    /// Activate the speed boost
    Boost,
    /// Come back after dying
    Respawn { player_name: String },
    /// Request to leave the game
    Leave,
}

impl ClientMessage {
    /// Attach the session's player id, producing a simulation intent
    pub fn into_intent(self, player_id: PlayerId) -> Intent {
        match self {
            ClientMessage::JoinRequest { player_name } => Intent::Join {
                player_id,
                name: player_name,
            },
            ClientMessage::MoveTarget { x, y } => Intent::MoveTarget { player_id, x, y },
            ClientMessage::Boost => Intent::Boost { player_id },
            ClientMessage::Respawn { player_name } => Intent::Respawn {
                player_id,
                name: player_name,
            },
            ClientMessage::Leave => Intent::Leave { player_id },
        }
    }
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// A join or respawn succeeded; carries the new player's initial state
    PlayerJoined {
        player_id: PlayerId,
        player: PlayerSnapshot,
    },
    /// Full world state, once per tick
    Snapshot(GameSnapshot),
    /// The player was eaten this tick
    PlayerDied { player_id: PlayerId },
}

/// World state for network transmission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub tick: u64,
    /// Alive players only, in join order
    pub players: Vec<PlayerSnapshot>,
    /// Every food pellet, ascending id
    pub food: Vec<FoodSnapshot>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub obstacles: Vec<Obstacle>,
}

impl GameSnapshot {
    pub fn from_state(state: &SimulationState) -> Self {
        let mut food: Vec<FoodSnapshot> = state.food().map(FoodSnapshot::from_food).collect();
        food.sort_unstable_by_key(|f| f.id);

        Self {
            tick: state.tick(),
            players: state
                .alive_players()
                .into_iter()
                .map(PlayerSnapshot::from_player)
                .collect(),
            food,
            leaderboard: state
                .leaderboard(state.config().leaderboard_size)
                .into_iter()
                .map(LeaderboardEntry::from_player)
                .collect(),
            obstacles: state.obstacles().to_vec(),
        }
    }
}

/// Player state as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec2,
    pub mass: f32,
    pub radius: f32,
    /// Hex colour from the shared palette
    pub color: String,
}

impl PlayerSnapshot {
    pub fn from_player(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            position: player.position.rounded(DECIMALS),
            mass: round_to(player.mass, DECIMALS),
            radius: round_to(player.radius(), DECIMALS),
            color: palette_color(player.color_index).to_string(),
        }
    }
}

/// Food pellet as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodSnapshot {
    pub id: FoodId,
    pub position: Vec2,
    pub color: String,
    pub radius: f32,
}

impl FoodSnapshot {
    pub fn from_food(food: &Food) -> Self {
        Self {
            id: food.id,
            position: food.position.rounded(DECIMALS),
            color: palette_color(food.color_index).to_string(),
            radius: food.radius(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub mass: f32,
}

impl LeaderboardEntry {
    pub fn from_player(player: &Player) -> Self {
        Self {
            name: player.name.clone(),
            mass: round_to(player.mass, DECIMALS),
        }
    }
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
