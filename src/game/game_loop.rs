//! Fixed-step game loop
//!
//! Owns the simulation and the intent queue. Each tick drains pending
//! intents, applies them in arrival order, advances the simulation and
//! builds the snapshot for broadcast.

use std::time::Instant;

use crate::config::SimulationConfig;
use crate::game::constants::tick::MAX_DT;
use crate::game::entity::PlayerId;
use crate::game::intent_buffer::{Intent, IntentBuffer, IntentSender};
use crate::game::state::{SimulationState, TickReport};
use crate::net::protocol::{GameSnapshot, PlayerSnapshot};

/// Everything the tick driver needs to publish after one tick
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub tick: u64,
    pub snapshot: GameSnapshot,
    /// Players eaten this tick
    pub deaths: Vec<PlayerId>,
    /// Initial state for every successful join or respawn this tick
    pub joined: Vec<PlayerSnapshot>,
    /// Joins turned away (server full or overloaded)
    pub rejected: Vec<PlayerId>,
    /// Intents applied this tick
    pub intents: usize,
    pub report: TickReport,
}

pub struct GameLoop {
    state: SimulationState,
    intents: IntentBuffer,
    last_tick: Instant,
    /// Cleared by the session while the server is overloaded
    accepting_players: bool,
}

impl GameLoop {
    pub fn new(config: SimulationConfig, intent_capacity: usize) -> Self {
        Self {
            state: SimulationState::new(config),
            intents: IntentBuffer::new(intent_capacity),
            last_tick: Instant::now(),
            accepting_players: true,
        }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    /// Handle for the transport layer to submit intents
    pub fn sender(&self) -> IntentSender {
        self.intents.sender()
    }

    pub fn pending_intents(&self) -> usize {
        self.intents.pending_count()
    }

    pub fn set_accepting_players(&mut self, accepting: bool) {
        if accepting != self.accepting_players {
            tracing::info!("Admission {}", if accepting { "reopened" } else { "paused" });
        }
        self.accepting_players = accepting;
    }

    pub fn accepting_players(&self) -> bool {
        self.accepting_players
    }

    /// Run one tick using the monotonic clock. dt is the real time since the
    /// previous tick, capped at MAX_DT.
    pub fn tick(&mut self) -> TickOutcome {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f32();
        self.tick_at(now, dt)
    }

    /// Run one tick at an explicit time and step length
    pub fn tick_at(&mut self, now: Instant, dt: f32) -> TickOutcome {
        self.last_tick = now;
        let dt = dt.clamp(0.0, MAX_DT);

        let pending = self.intents.drain();
        let intents = pending.len();
        let mut joined = Vec::new();
        let mut rejected = Vec::new();

        for intent in pending {
            match self.apply(intent, now) {
                Applied::Joined(snapshot) => joined.push(snapshot),
                Applied::Rejected(id) => rejected.push(id),
                Applied::Done => {}
            }
        }

        let report = self.state.advance(dt, now);

        if cfg!(debug_assertions) {
            if let Err(e) = self.state.check_invariants() {
                tracing::error!("Simulation invariant broken at tick {}: {}", self.state.tick(), e);
                debug_assert!(false, "{}", e);
            }
        }

        TickOutcome {
            tick: self.state.tick(),
            snapshot: GameSnapshot::from_state(&self.state),
            deaths: report.deaths.clone(),
            joined,
            rejected,
            intents,
            report,
        }
    }

    fn apply(&mut self, intent: Intent, now: Instant) -> Applied {
        match intent {
            Intent::Join { player_id, name } | Intent::Respawn { player_id, name } => {
                let known = self.state.get_player(player_id).is_some();
                if !known && !self.accepting_players {
                    tracing::warn!("Join from {} ({}) dropped: server overloaded", name, player_id);
                    return Applied::Rejected(player_id);
                }
                match self.state.join(player_id, name) {
                    Some(player) => Applied::Joined(PlayerSnapshot::from_player(player)),
                    None => Applied::Rejected(player_id),
                }
            }
            Intent::MoveTarget { player_id, x, y } => {
                self.state.set_move_target(player_id, x, y);
                Applied::Done
            }
            Intent::Boost { player_id } => {
                self.state.activate_boost(player_id, now);
                Applied::Done
            }
            Intent::Leave { player_id } => {
                if self.state.leave(player_id) {
                    tracing::debug!("Player {} left", player_id);
                }
                Applied::Done
            }
        }
    }
}

enum Applied {
    Joined(PlayerSnapshot),
    Rejected(PlayerId),
    Done,
}
