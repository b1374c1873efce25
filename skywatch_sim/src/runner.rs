//! Scenario runner - drives an engine through one anomaly regime.

use crate::scenarios::ScenarioId;

use skywatch_core::{ConfigError, Engine, MetricsSnapshot, SimConfig};
use skywatch_env::SeededEntropy;
use tracing::{debug, info};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Live anomaly sources at the end
    pub live_anomalies: usize,

    /// Measurements taken, in flight or uploaded
    pub detections: usize,

    /// Measurements that reached the base station
    pub uploads: usize,

    /// Re-task assignments issued
    pub retasks: usize,

    /// Largest field area above threshold seen on any tick
    pub peak_field_area: f64,

    /// Metrics after the last tick
    pub final_metrics: MetricsSnapshot,
}

/// Runs scenarios against a base configuration.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Number of drones
    num_agents: usize,

    /// Simulated duration in seconds
    max_duration_secs: f64,

    /// Everything not set by the scenario or the runner
    base_config: SimConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_agents: usize) -> Self {
        Self {
            seed,
            num_agents,
            max_duration_secs: 60.0,
            base_config: SimConfig::default(),
        }
    }

    /// Sets the simulated duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Sets the configuration the scenario is applied on top of.
    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.base_config = config;
        self
    }

    /// The configuration a run of `scenario` uses.
    pub fn config_for(&self, scenario: ScenarioId) -> SimConfig {
        let mut config = self.base_config.clone();
        scenario.apply(&mut config);
        config.seed = self.seed;
        config.num_agents = self.num_agents;
        config
    }

    /// Number of ticks covering the configured duration.
    pub fn target_ticks(&self, tick_duration_ms: u64) -> u64 {
        let total_ms = (self.max_duration_secs.max(0.0) * 1000.0).ceil();
        (total_ms / tick_duration_ms.max(1) as f64).ceil() as u64
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> Result<ScenarioResult, ConfigError> {
        self.execute(scenario).map(|(result, _)| result)
    }

    /// Runs a scenario and hands back the finished engine along with the
    /// result, for exporting.
    pub fn execute(
        &self,
        scenario: ScenarioId,
    ) -> Result<(ScenarioResult, Engine<SeededEntropy>), ConfigError> {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let config = self.config_for(scenario);
        let tick_ms = config.tick_duration_ms;
        let target_ticks = self.target_ticks(tick_ms);

        let mut engine = Engine::seeded(config)?;
        engine.start();

        let mut peak_field_area: f64 = 0.0;

        for tick in 0..target_ticks {
            engine.tick();

            let metrics = engine.metrics().current();
            peak_field_area = peak_field_area.max(metrics.field_area_above_threshold);

            if tick % 300 == 0 {
                debug!(
                    "  t={:.1}s | anomalies={} | area={:.2}% | roaming={} | charging={}",
                    metrics.time_secs(),
                    metrics.live_anomalies,
                    metrics.field_area_above_threshold * 100.0,
                    metrics.roaming_agents,
                    metrics.charging_agents
                );
            }
        }
        engine.stop();

        let in_flight: usize = engine.agents().iter().map(|a| a.measurements().len()).sum();
        let uploads = engine.uploaded_total() as usize;

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            total_ticks: target_ticks,
            final_time_secs: engine.time_secs(),
            live_anomalies: engine.field().live_count(),
            detections: in_flight + uploads,
            uploads,
            retasks: engine.retask_count() as usize,
            peak_field_area,
            final_metrics: engine.metrics().current().clone(),
        };

        info!(
            "Finished {}: {} ticks, {} detections, {} uploaded, {} re-tasks",
            scenario.name(),
            result.total_ticks,
            result.detections,
            result.uploads,
            result.retasks
        );
        Ok((result, engine))
    }
}
