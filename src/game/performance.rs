//! Tick performance monitoring
//!
//! Tracks how much of the tick budget the simulation uses and gates
//! admission: joins are refused while the server is critically loaded.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Samples needed before the status moves off its initial value
const MIN_SAMPLES: usize = 10;

/// Performance status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceStatus {
    /// Well under budget
    Excellent,
    /// Normal operation
    Good,
    /// Getting close to the budget
    Warning,
    /// At or over budget, new players are turned away
    Critical,
}

impl PerformanceStatus {
    pub fn can_accept_players(&self) -> bool {
        !matches!(self, PerformanceStatus::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceStatus::Excellent => "excellent",
            PerformanceStatus::Good => "good",
            PerformanceStatus::Warning => "warning",
            PerformanceStatus::Critical => "critical",
        }
    }
}

/// Performance monitor that tracks tick durations
pub struct PerformanceMonitor {
    /// Rolling window of tick durations
    tick_durations: VecDeque<Duration>,
    max_samples: usize,
    /// Target tick duration (budget)
    target_tick_duration: Duration,
    /// Below this fraction of budget = excellent
    excellent_threshold: f32,
    /// Above this fraction of budget = warning
    warning_threshold: f32,
    /// Above this fraction of budget = critical
    critical_threshold: f32,
    status: PerformanceStatus,
    tick_start: Option<Instant>,
    /// Entity count (players + food) at last measurement
    last_entity_count: usize,
}

impl PerformanceMonitor {
    pub fn new(tick_rate: u32) -> Self {
        let target_tick_duration = Duration::from_secs_f32(1.0 / tick_rate.max(1) as f32);
        // ~5 seconds of history
        let max_samples = (tick_rate.max(1) as usize * 5).max(MIN_SAMPLES);

        Self {
            tick_durations: VecDeque::with_capacity(max_samples),
            max_samples,
            target_tick_duration,
            excellent_threshold: 0.3,
            warning_threshold: 0.7,
            critical_threshold: 0.9,
            status: PerformanceStatus::Excellent,
            tick_start: None,
            last_entity_count: 0,
        }
    }

    /// Start timing a tick
    pub fn tick_start(&mut self) {
        self.tick_start = Some(Instant::now());
    }

    /// End timing a tick and record the duration
    pub fn tick_end(&mut self, entity_count: usize) -> Option<Duration> {
        let start = self.tick_start.take()?;
        let duration = start.elapsed();
        self.record_tick(duration);
        self.last_entity_count = entity_count;
        Some(duration)
    }

    fn record_tick(&mut self, duration: Duration) {
        self.tick_durations.push_back(duration);
        while self.tick_durations.len() > self.max_samples {
            self.tick_durations.pop_front();
        }
        self.update_status();
    }

    fn update_status(&mut self) {
        if self.tick_durations.len() < MIN_SAMPLES {
            return;
        }

        let ratio = self.budget_usage_percent() / 100.0;
        let next = if ratio < self.excellent_threshold {
            PerformanceStatus::Excellent
        } else if ratio < self.warning_threshold {
            PerformanceStatus::Good
        } else if ratio < self.critical_threshold {
            PerformanceStatus::Warning
        } else {
            PerformanceStatus::Critical
        };

        if next != self.status {
            if next == PerformanceStatus::Critical {
                tracing::warn!("Tick budget exhausted: {}", self.describe(next));
            } else {
                tracing::debug!("Performance status {:?} -> {:?}", self.status, next);
            }
            self.status = next;
        }
    }

    pub fn average_tick_duration(&self) -> Duration {
        if self.tick_durations.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.tick_durations.iter().sum();
        sum / self.tick_durations.len() as u32
    }

    /// 95th percentile tick duration
    pub fn p95_tick_duration(&self) -> Duration {
        if self.tick_durations.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted: Vec<_> = self.tick_durations.iter().copied().collect();
        sorted.sort();
        let idx = (sorted.len() as f32 * 0.95) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    pub fn status(&self) -> PerformanceStatus {
        self.status
    }

    /// Budget usage as percentage (0-100+)
    pub fn budget_usage_percent(&self) -> f32 {
        let avg = self.average_tick_duration();
        (avg.as_secs_f32() / self.target_tick_duration.as_secs_f32()) * 100.0
    }

    pub fn can_accept_players(&self) -> bool {
        self.status.can_accept_players()
    }

    pub fn last_entity_count(&self) -> usize {
        self.last_entity_count
    }

    /// Human-readable status line for periodic logs
    pub fn status_message(&self) -> String {
        self.describe(self.status)
    }

    fn describe(&self, status: PerformanceStatus) -> String {
        format!(
            "{:?} - {:.1}% budget, p95 {:.2}ms, {} entities",
            status,
            self.budget_usage_percent(),
            self.p95_tick_duration().as_secs_f64() * 1000.0,
            self.last_entity_count
        )
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(crate::game::constants::tick::RATE)
    }
}
