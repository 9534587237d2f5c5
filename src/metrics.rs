//! Prometheus-compatible metrics endpoint
//!
//! Exposes simulation metrics in Prometheus format plus a JSON view and a
//! health check. Default endpoint: http://localhost:9090/metrics

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::performance::PerformanceStatus;

/// Rolling window for tick-time percentiles
const TICK_HISTORY: usize = 1000;

/// Metrics registry for the game server
#[derive(Debug)]
pub struct Metrics {
    // Population
    pub total_players: AtomicU64,
    pub alive_players: AtomicU64,
    pub food_count: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,

    // Performance status (0=Excellent, 1=Good, 2=Warning, 3=Critical)
    pub performance_status: AtomicU64,
    pub budget_usage_percent: AtomicU64,

    pub tick_count: AtomicU64,

    // Gameplay counters
    pub food_eaten: AtomicU64,
    pub players_eaten: AtomicU64,
    pub joins: AtomicU64,
    pub joins_rejected: AtomicU64,
    pub intents_applied: AtomicU64,
    /// Intents the transport could not enqueue (backpressure)
    pub intents_dropped: AtomicU64,

    start_time: Instant,

    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            total_players: AtomicU64::new(0),
            alive_players: AtomicU64::new(0),
            food_count: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            performance_status: AtomicU64::new(0),
            budget_usage_percent: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            food_eaten: AtomicU64::new(0),
            players_eaten: AtomicU64::new(0),
            joins: AtomicU64::new(0),
            joins_rejected: AtomicU64::new(0),
            intents_applied: AtomicU64::new(0),
            intents_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn record_performance(&self, status: PerformanceStatus, budget_percent: f32) {
        let code = match status {
            PerformanceStatus::Excellent => 0,
            PerformanceStatus::Good => 1,
            PerformanceStatus::Warning => 2,
            PerformanceStatus::Critical => 3,
        };
        self.performance_status.store(code, Ordering::Relaxed);
        self.budget_usage_percent.store(budget_percent.max(0.0) as u64, Ordering::Relaxed);
    }

    pub fn record_population(&self, players: usize, alive: usize, food: usize) {
        self.total_players.store(players as u64, Ordering::Relaxed);
        self.alive_players.store(alive as u64, Ordering::Relaxed);
        self.food_count.store(food as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn status_name(&self) -> &'static str {
        match self.performance_status.load(Ordering::Relaxed) {
            0 => "excellent",
            1 => "good",
            2 => "warning",
            _ => "critical",
        }
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("blob_arena_players_total", "Players in the arena (alive or awaiting respawn)", "gauge",
            self.total_players.load(Ordering::Relaxed));
        metric!("blob_arena_players_alive", "Number of alive players", "gauge",
            self.alive_players.load(Ordering::Relaxed));
        metric!("blob_arena_food", "Food pellets on the map", "gauge",
            self.food_count.load(Ordering::Relaxed));

        metric!("blob_arena_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("blob_arena_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("blob_arena_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("blob_arena_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("blob_arena_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("blob_arena_performance_status", "Performance status (0=Excellent, 3=Critical)", "gauge",
            self.performance_status.load(Ordering::Relaxed));
        metric!("blob_arena_budget_usage_percent", "Tick budget usage percentage", "gauge",
            self.budget_usage_percent.load(Ordering::Relaxed));
        output.push_str(&format!(
            "# HELP blob_arena_performance_state Human-readable performance state\n# TYPE blob_arena_performance_state gauge\nblob_arena_performance_state{{state=\"{}\"}} 1\n",
            self.status_name()
        ));

        metric!("blob_arena_food_eaten_total", "Food pellets eaten", "counter",
            self.food_eaten.load(Ordering::Relaxed));
        metric!("blob_arena_players_eaten_total", "Players eaten by other players", "counter",
            self.players_eaten.load(Ordering::Relaxed));
        metric!("blob_arena_joins_total", "Successful joins and respawns", "counter",
            self.joins.load(Ordering::Relaxed));
        metric!("blob_arena_joins_rejected_total", "Joins refused (full or overloaded)", "counter",
            self.joins_rejected.load(Ordering::Relaxed));
        metric!("blob_arena_intents_applied_total", "Client intents applied", "counter",
            self.intents_applied.load(Ordering::Relaxed));
        metric!("blob_arena_intents_dropped_total", "Client intents dropped by backpressure", "counter",
            self.intents_dropped.load(Ordering::Relaxed));
        metric!("blob_arena_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON view of the same metrics
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "players": {
                "total": self.total_players.load(Ordering::Relaxed),
                "alive": self.alive_players.load(Ordering::Relaxed),
            },
            "food": self.food_count.load(Ordering::Relaxed),
            "performance": {
                "tick_time_us": self.tick_time_us.load(Ordering::Relaxed),
                "tick_time_p95_us": self.tick_time_p95_us.load(Ordering::Relaxed),
                "tick_time_p99_us": self.tick_time_p99_us.load(Ordering::Relaxed),
                "tick_time_max_us": self.tick_time_max_us.load(Ordering::Relaxed),
                "tick_count": self.tick_count.load(Ordering::Relaxed),
                "status": self.performance_status.load(Ordering::Relaxed),
                "status_name": self.status_name(),
                "budget_percent": self.budget_usage_percent.load(Ordering::Relaxed),
            },
            "gameplay": {
                "food_eaten": self.food_eaten.load(Ordering::Relaxed),
                "players_eaten": self.players_eaten.load(Ordering::Relaxed),
                "joins": self.joins.load(Ordering::Relaxed),
                "joins_rejected": self.joins_rejected.load(Ordering::Relaxed),
                "intents_applied": self.intents_applied.load(Ordering::Relaxed),
                "intents_dropped": self.intents_dropped.load(Ordering::Relaxed),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }

    /// Health check body
    pub fn health_json(&self) -> String {
        serde_json::json!({
            "status": "healthy",
            "players": self.total_players.load(Ordering::Relaxed),
            "food": self.food_count.load(Ordering::Relaxed),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Build the full HTTP response for a raw request
fn respond(metrics: &Metrics, request: &str) -> String {
    let path = request
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("GET "))
        .and_then(|rest| rest.split_whitespace().next());

    let (content_type, body) = match path {
        Some("/metrics") => ("text/plain; version=0.0.4", metrics.to_prometheus()),
        Some("/metrics/json") | Some("/json") => ("application/json", metrics.to_json()),
        Some("/health") | Some("/") => ("application/json", metrics.health_json()),
        _ => return NOT_FOUND.to_string(),
    };

    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on http://{}/metrics", listener.local_addr()?);
    serve(listener, metrics).await
}

/// Accept loop over an already-bound listener
pub async fn serve(listener: TcpListener, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = respond(&metrics, &request);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.total_players.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_tick_time() {
        let metrics = Metrics::new();
        for i in 0..100 {
            metrics.record_tick_time(Duration::from_micros(100 + i * 10));
        }

        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 100);
        assert!(metrics.tick_time_p95_us.load(Ordering::Relaxed) > 0);
        let p95 = metrics.tick_time_p95_us.load(Ordering::Relaxed);
        assert!(metrics.tick_time_p99_us.load(Ordering::Relaxed) >= p95);
        assert_eq!(metrics.tick_time_max_us.load(Ordering::Relaxed), 1090);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_population(12, 9, 200);

        let output = metrics.to_prometheus();

        assert!(output.contains("blob_arena_players_total 12"));
        assert!(output.contains("blob_arena_players_alive 9"));
        assert!(output.contains("blob_arena_food 200"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_performance_state_label() {
        let metrics = Metrics::new();
        metrics.record_performance(PerformanceStatus::Critical, 104.6);

        let output = metrics.to_prometheus();
        assert!(output.contains("blob_arena_performance_status 3"));
        assert!(output.contains("blob_arena_budget_usage_percent 104"));
        assert!(output.contains("state=\"critical\""));
    }

    #[test]
    fn test_json_format() {
        let metrics = Metrics::new();
        metrics.record_population(100, 80, 200);

        let value: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(value["players"]["total"], 100);
        assert_eq!(value["players"]["alive"], 80);
        assert_eq!(value["performance"]["status_name"], "excellent");
    }

    #[test]
    fn test_health_body() {
        let metrics = Metrics::new();
        metrics.record_population(3, 2, 200);

        let value: serde_json::Value = serde_json::from_str(&metrics.health_json()).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["players"], 3);
        assert_eq!(value["food"], 200);
    }

    #[test]
    fn test_routing() {
        let metrics = Metrics::new();
        let text = respond(&metrics, "GET /metrics HTTP/1.1\r\n\r\n");
        assert!(text.contains("blob_arena_tick_count"));
        let json = respond(&metrics, "GET /metrics/json HTTP/1.1\r\n\r\n");
        assert!(json.contains("application/json"));
        assert!(respond(&metrics, "GET /health HTTP/1.1\r\n\r\n").contains("\"healthy\""));
        assert!(respond(&metrics, "GET /nope HTTP/1.1\r\n\r\n").starts_with("HTTP/1.1 404"));
        assert!(respond(&metrics, "POST /metrics HTTP/1.1\r\n\r\n").starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn test_server_answers_health() {
        let metrics = Arc::new(Metrics::new());
        metrics.record_population(1, 1, 5);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, metrics));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /health HTTP/1.1\r\nHost: test\r\n\r\n").await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        let value: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["players"], 1);
        assert_eq!(value["food"], 5);
    }
}
