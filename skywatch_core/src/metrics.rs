//! Fleet and field metrics.
//!
//! Two different "coverage" numbers are reported and kept apart by name:
//! - `field_area_above_threshold`: how much of the grid currently carries an
//!   anomaly above the detection threshold (a property of the environment)
//! - `agent_coverage_fraction`: how much of the grid any drone has flown over
//!   since the last reset (a property of the fleet)

use crate::agent::Agent;
use crate::field::AnomalyField;
use crate::lifecycle::AgentMode;
use serde::{Deserialize, Serialize};
use skywatch_env::EntropySource;

/// Metrics at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Simulation time (ms)
    pub time_ms: u64,

    /// Fraction of cells above the detection threshold, in [0, 1]
    pub field_area_above_threshold: f64,

    /// Live anomaly sources
    pub live_anomalies: usize,

    pub roaming_agents: usize,
    pub sensing_agents: usize,
    pub returning_agents: usize,
    pub charging_agents: usize,

    /// Fraction of cells visited by any drone, in [0, 1]
    pub agent_coverage_fraction: f64,
}

impl MetricsSnapshot {
    /// Measures the field and fleet at `time_ms`.
    pub fn measure<E: EntropySource>(
        time_ms: u64,
        field: &AnomalyField<E>,
        agents: &[Agent],
        detection_threshold: f64,
        agent_coverage_fraction: f64,
    ) -> Self {
        let cells = field.cells();
        let above = cells.iter().filter(|&&v| v > detection_threshold).count();
        let field_area_above_threshold = if cells.is_empty() {
            0.0
        } else {
            above as f64 / cells.len() as f64
        };

        let count = |mode: AgentMode| agents.iter().filter(|a| a.mode() == mode).count();

        Self {
            time_ms,
            field_area_above_threshold,
            live_anomalies: field.live_count(),
            roaming_agents: count(AgentMode::Roaming),
            sensing_agents: count(AgentMode::Sensing),
            returning_agents: count(AgentMode::Returning),
            charging_agents: count(AgentMode::Charging),
            agent_coverage_fraction,
        }
    }

    pub fn time_secs(&self) -> f64 {
        self.time_ms as f64 / 1000.0
    }
}

/// Current metrics plus a history sampled at a fixed simulated interval.
#[derive(Debug, Clone, PartialEq)]
pub struct SimMetrics {
    current: MetricsSnapshot,
    history: Vec<MetricsSnapshot>,
    interval_ms: u64,

    /// Interval bucket of the last history entry
    last_bucket: Option<u64>,
}

impl SimMetrics {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            current: MetricsSnapshot::default(),
            history: Vec::new(),
            interval_ms: interval_ms.max(1),
            last_bucket: None,
        }
    }

    /// Replaces the current metrics; appends to history when the snapshot's
    /// time has crossed into a new interval.
    ///
    /// Returns true if the snapshot was appended.
    pub fn record(&mut self, snapshot: MetricsSnapshot) -> bool {
        let bucket = snapshot.time_ms / self.interval_ms;
        let crossed = self.last_bucket.map_or(true, |last| bucket > last);

        if crossed {
            self.history.push(snapshot.clone());
            self.last_bucket = Some(bucket);
        }
        self.current = snapshot;
        crossed
    }

    pub fn current(&self) -> &MetricsSnapshot {
        &self.current
    }

    pub fn history(&self) -> &[MetricsSnapshot] {
        &self.history
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn reset(&mut self) {
        self.current = MetricsSnapshot::default();
        self.history.clear();
        self.last_bucket = None;
    }
}
