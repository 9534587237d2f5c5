//! Game session - drives the game loop on a timer and publishes results
//!
//! The session exclusively owns the simulation. Transport code talks to it
//! only through a `SessionHandle` (intents in) and a broadcast receiver
//! (server messages out).

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::game::entity::PlayerId;
use crate::game::game_loop::{GameLoop, TickOutcome};
use crate::game::intent_buffer::{IntentBufferError, IntentSender};
use crate::game::performance::PerformanceMonitor;
use crate::metrics::Metrics;
use crate::net::protocol::{ClientMessage, ServerMessage};

/// Messages buffered per subscriber before slow receivers start lagging
const BROADCAST_CAPACITY: usize = 256;

/// Seconds between periodic stats lines
const STATS_INTERVAL_SECS: u64 = 30;

/// Cloneable entry point for connection handlers
#[derive(Clone)]
pub struct SessionHandle {
    sender: IntentSender,
    metrics: Arc<Metrics>,
}

impl SessionHandle {
    /// Queue a client message for the next tick. Dropped intents are counted.
    pub fn submit(
        &self,
        player_id: PlayerId,
        message: ClientMessage,
    ) -> Result<(), IntentBufferError> {
        let result = self.sender.try_send(message.into_intent(player_id));
        if let Err(e) = result {
            self.metrics.intents_dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Dropped intent from {}: {}", player_id, e);
        }
        result
    }
}

pub struct GameSession {
    game_loop: GameLoop,
    performance: PerformanceMonitor,
    metrics: Arc<Metrics>,
    broadcast: broadcast::Sender<ServerMessage>,
    tick_rate: u32,
}

impl GameSession {
    pub fn new(config: &ServerConfig, metrics: Arc<Metrics>) -> Self {
        let (broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);
        let game_loop = GameLoop::new(config.simulation.clone(), config.intent_capacity);
        metrics.record_population(0, 0, game_loop.state().food_count());

        Self {
            game_loop,
            performance: PerformanceMonitor::new(config.tick_rate),
            metrics,
            broadcast,
            tick_rate: config.tick_rate,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            sender: self.game_loop.sender(),
            metrics: self.metrics.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.broadcast.subscribe()
    }

    pub fn game_loop(&self) -> &GameLoop {
        &self.game_loop
    }

    pub fn performance(&self) -> &PerformanceMonitor {
        &self.performance
    }

    /// Run one timed tick, update metrics and admission, publish the results
    pub fn tick(&mut self) -> TickOutcome {
        self.performance.tick_start();
        let outcome = self.game_loop.tick();
        let state = self.game_loop.state();
        let elapsed = self
            .performance
            .tick_end(state.player_count() + state.food_count());

        if let Some(elapsed) = elapsed {
            self.metrics.record_tick_time(elapsed);
        }
        self.metrics.record_population(
            state.player_count(),
            state.alive_count(),
            state.food_count(),
        );
        self.metrics.record_performance(
            self.performance.status(),
            self.performance.budget_usage_percent(),
        );
        self.record_outcome(&outcome);

        let accepting = self.performance.can_accept_players();
        self.game_loop.set_accepting_players(accepting);

        self.publish(&outcome);
        outcome
    }

    fn record_outcome(&self, outcome: &TickOutcome) {
        let m = &self.metrics;
        m.intents_applied.fetch_add(outcome.intents as u64, Ordering::Relaxed);
        m.joins.fetch_add(outcome.joined.len() as u64, Ordering::Relaxed);
        m.joins_rejected.fetch_add(outcome.rejected.len() as u64, Ordering::Relaxed);
        m.food_eaten.fetch_add(outcome.report.food_eaten as u64, Ordering::Relaxed);
        m.players_eaten.fetch_add(outcome.report.players_eaten as u64, Ordering::Relaxed);
    }

    /// Joins and deaths go out before the snapshot of the same tick
    fn publish(&self, outcome: &TickOutcome) {
        // No subscribers is not an error; the snapshot is simply not needed.
        for player in &outcome.joined {
            let _ = self.broadcast.send(ServerMessage::PlayerJoined {
                player_id: player.id,
                player: player.clone(),
            });
        }
        for &player_id in &outcome.deaths {
            debug!("Player {} was eaten", player_id);
            let _ = self.broadcast.send(ServerMessage::PlayerDied { player_id });
        }
        let _ = self
            .broadcast
            .send(ServerMessage::Snapshot(outcome.snapshot.clone()));
    }

    /// Tick at the configured rate until `shutdown` resolves
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let tick_duration = Duration::from_secs_f64(1.0 / self.tick_rate as f64);
        let mut ticker = interval(tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!("Game loop started at {} Hz", self.tick_rate);
        let start = Instant::now();
        let stats_every = self.tick_rate as u64 * STATS_INTERVAL_SECS;
        let mut tick_count: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            self.tick();
            tick_count += 1;

            if tick_count % stats_every == 0 {
                let state = self.game_loop.state();
                let grid = state.index().stats();
                info!(
                    "Game: {}s, tick {}, {} players ({} alive), {} food | Grid: {} cells, max {} per cell | Perf: {}",
                    start.elapsed().as_secs(),
                    state.tick(),
                    state.player_count(),
                    state.alive_count(),
                    state.food_count(),
                    grid.occupied_cells,
                    grid.max_per_cell,
                    self.performance.status_message()
                );
            }
        }

        info!(
            "Game loop stopped after {} ticks ({} players connected)",
            tick_count,
            self.game_loop.state().player_count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use tokio::sync::oneshot;
    use tokio_test::assert_ok;
    use uuid::Uuid;

    fn test_config() -> ServerConfig {
        ServerConfig {
            tick_rate: 50,
            intent_capacity: 8,
            simulation: SimulationConfig {
                food_count: 20,
                ..SimulationConfig::seeded(17)
            },
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_tick_publishes_join_then_snapshot() {
        let mut session = GameSession::new(&test_config(), Arc::new(Metrics::new()));
        let mut rx = session.subscribe();
        let id = Uuid::new_v4();

        assert_ok!(session.handle().submit(
            id,
            ClientMessage::JoinRequest {
                player_name: "Alice".to_string()
            }
        ));
        session.tick();

        match rx.try_recv().unwrap() {
            ServerMessage::PlayerJoined { player_id, player } => {
                assert_eq!(player_id, id);
                assert_eq!(player.name, "Alice");
            }
            other => panic!("expected PlayerJoined, got {:?}", other),
        }
        match rx.try_recv().unwrap() {
            ServerMessage::Snapshot(snapshot) => {
                assert_eq!(snapshot.tick, 1);
                assert_eq!(snapshot.players.len(), 1);
                assert_eq!(snapshot.food.len(), 20);
            }
            other => panic!("expected Snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_tick_updates_metrics() {
        let metrics = Arc::new(Metrics::new());
        let mut session = GameSession::new(&test_config(), metrics.clone());
        let handle = session.handle();
        for name in ["A", "B", "C"] {
            assert_ok!(handle.submit(
                Uuid::new_v4(),
                ClientMessage::JoinRequest {
                    player_name: name.to_string()
                }
            ));
        }

        session.tick();
        session.tick();

        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.total_players.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.joins.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.intents_applied.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.food_count.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn test_backpressure_counts_dropped_intents() {
        let metrics = Arc::new(Metrics::new());
        let session = GameSession::new(&test_config(), metrics.clone());
        let handle = session.handle();
        let id = Uuid::new_v4();

        for _ in 0..8 {
            assert_ok!(handle.submit(id, ClientMessage::Boost));
        }
        assert_eq!(handle.submit(id, ClientMessage::Boost), Err(IntentBufferError::Full));
        assert_eq!(metrics.intents_dropped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let session = GameSession::new(&test_config(), Arc::new(Metrics::new()));
        let handle = session.handle();
        let mut rx = session.subscribe();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(session.run(async move {
            let _ = stop_rx.await;
        }));

        let id = Uuid::new_v4();
        assert_ok!(handle.submit(
            id,
            ClientMessage::JoinRequest {
                player_name: "Runner".to_string()
            }
        ));

        let joined = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(ServerMessage::PlayerJoined { player_id, .. }) = rx.recv().await {
                    return player_id;
                }
            }
        })
        .await
        .expect("join was never published");
        assert_eq!(joined, id);

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("session did not stop")
            .unwrap();
    }
}
