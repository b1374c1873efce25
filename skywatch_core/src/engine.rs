//! Engine - owns the simulation and drives it one tick at a time.
//!
//! Each tick runs in a fixed order:
//!
//! ```text
//! field.update ─► agents.advance + passive detection ─► retask (every N ticks)
//!      ─► metrics ─► clock += tick
//! ```
//!
//! Nothing advances on its own. A caller (CLI loop, scenario runner, test)
//! calls [`Engine::tick`] as often as it likes; simulated time moves by
//! exactly one tick duration per call while the engine is running.

use crate::agent::{Agent, Measurement};
use crate::config::SimConfig;
use crate::coordinator::{Coordinator, CoordinatorParams, Retask};
use crate::error::ConfigError;
use crate::events::{EventKind, EventLog, SimEvent};
use crate::field::{AnomalyField, AnomalySource, GridSnapshot};
use crate::lifecycle::{AgentMode, AgentState};
use crate::metrics::{MetricsSnapshot, SimMetrics};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use skywatch_env::{EntropySource, SeededEntropy, SimClock};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Entropy stream for anomaly spawning.
const FIELD_STREAM: u64 = 1;

/// Entropy stream for measurement jitter.
const NOISE_STREAM: u64 = 2;

/// A measurement that reached the base station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedMeasurement {
    pub agent_id: usize,
    /// Simulation time of the upload (ms)
    pub uploaded_ms: u64,
    pub measurement: Measurement,
}

/// Read-only view of a drone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub target_x: f64,
    pub target_y: f64,
    pub state: AgentState,
    pub energy_ms: i64,
    pub pending_waypoints: usize,
    pub measurements: Vec<Measurement>,
}

impl AgentSnapshot {
    fn of(agent: &Agent) -> Self {
        Self {
            id: agent.id(),
            x: agent.position().x,
            y: agent.position().y,
            target_x: agent.target().x,
            target_y: agent.target().y,
            state: agent.state(),
            energy_ms: agent.energy_ms(),
            pending_waypoints: agent.path().len(),
            measurements: agent.measurements().to_vec(),
        }
    }

    pub fn mode(&self) -> AgentMode {
        self.state.mode()
    }
}

/// Everything an observer can see, in one comparable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub time_ms: u64,
    pub tick_count: u64,
    pub running: bool,
    pub grid: GridSnapshot,
    pub sources: Vec<AnomalySource>,
    pub agents: Vec<AgentSnapshot>,
    pub metrics: MetricsSnapshot,
    pub history: Vec<MetricsSnapshot>,
    pub events: Vec<SimEvent>,
    pub uploads: Vec<UploadedMeasurement>,
}

/// The simulation engine.
pub struct Engine<E: EntropySource> {
    config: SimConfig,

    /// Master entropy; subsystem streams are forked from it
    entropy: E,

    field: AnomalyField<E>,
    agents: Vec<Agent>,
    coordinator: Coordinator,

    /// RNG for measurement jitter
    noise: E,

    clock: SimClock,
    running: bool,
    tick_count: u64,

    metrics: SimMetrics,
    events: EventLog,

    /// Recent positions per drone, indexed like `agents`
    trajectories: Vec<VecDeque<Vector2<f64>>>,

    /// Base-station archive of uploaded measurements, oldest dropped first
    uploads: VecDeque<UploadedMeasurement>,

    /// Measurements uploaded since the last reset, including any the
    /// archive has since dropped
    uploaded_total: u64,

    /// Re-task assignments issued since the last reset
    retask_count: u64,
}

impl Engine<SeededEntropy> {
    /// Creates an engine whose entropy is derived from `config.seed`.
    pub fn seeded(config: SimConfig) -> Result<Self, ConfigError> {
        let entropy = SeededEntropy::new(config.seed);
        Self::new(config, entropy)
    }
}

impl<E: EntropySource> Engine<E> {
    /// Validates `config` and builds a stopped engine with the initial
    /// coverage plan assigned.
    pub fn new(config: SimConfig, entropy: E) -> Result<Self, ConfigError> {
        config.validate()?;

        let field = AnomalyField::new(config.field_params(), entropy.fork(FIELD_STREAM));
        let noise = entropy.fork(NOISE_STREAM);

        let agent_params = config.agent_params();
        let agents = (0..config.num_agents)
            .map(|id| Agent::new(id, agent_params))
            .collect();

        let coordinator = Coordinator::new(
            CoordinatorParams {
                hotspot_threshold: config.hotspot_threshold,
                retask_radius: config.retask_radius,
            },
            config.grid_width,
            config.grid_height,
        );

        let mut engine = Self {
            metrics: SimMetrics::new(config.snapshot_interval_ms),
            events: EventLog::new(config.event_log_capacity),
            trajectories: vec![VecDeque::new(); config.num_agents],
            entropy,
            field,
            agents,
            coordinator,
            noise,
            clock: SimClock::new(),
            running: false,
            tick_count: 0,
            uploads: VecDeque::new(),
            uploaded_total: 0,
            retask_count: 0,
            config,
        };
        engine.assign_coverage();

        info!(
            agents = engine.config.num_agents,
            width = engine.config.grid_width,
            height = engine.config.grid_height,
            seed = ?engine.entropy.seed(),
            "Engine created"
        );
        Ok(engine)
    }

    /// Resumes ticking.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.events.push(self.clock.now_ms(), EventKind::Started);
        info!(time_secs = self.clock.secs(), "Simulation started");
    }

    /// Pauses; subsequent ticks are no-ops until [`start`](Self::start).
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.events.push(self.clock.now_ms(), EventKind::Stopped);
        info!(time_secs = self.clock.secs(), "Simulation stopped");
    }

    /// Advances the simulation by one tick.
    ///
    /// Returns false (and does nothing) while stopped.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }

        let dt = self.config.tick_duration_ms;
        let now = self.clock.now_ms();

        // 1. Environment
        let update = self.field.update(dt);
        if let Some(source) = update.spawned {
            debug!(x = source.x, y = source.y, intensity = source.intensity, "Anomaly spawned");
            self.events.push(
                now,
                EventKind::AnomalySpawned {
                    x: source.x,
                    y: source.y,
                    intensity: source.intensity,
                },
            );
        }

        // 2. Drones, passive detection, trajectories
        self.advance_agents(now, dt);
        self.coordinator.observe(&self.agents);

        // 3. Periodic re-tasking
        if self.tick_count % self.config.retask_interval_ticks == 0 {
            let assignments = self.coordinator.retask(&mut self.agents, &self.field);
            self.log_retasks(now, &assignments);
        }
        self.tick_count += 1;

        // 4. Metrics
        let snapshot = MetricsSnapshot::measure(
            now,
            &self.field,
            &self.agents,
            self.config.detection_threshold,
            self.coordinator.coverage().fraction(),
        );
        self.metrics.record(snapshot);

        // 5. Clock
        self.clock.advance_ms(dt);
        true
    }

    /// Returns the engine to its freshly constructed state.
    ///
    /// Entropy streams are re-derived from the master source, so with seeded
    /// entropy a reset run replays the previous run exactly.
    pub fn reset(&mut self) {
        self.running = false;
        self.tick_count = 0;
        self.clock.reset();

        self.field = AnomalyField::new(self.config.field_params(), self.entropy.fork(FIELD_STREAM));
        self.noise = self.entropy.fork(NOISE_STREAM);

        for agent in &mut self.agents {
            agent.reset();
        }
        for trail in &mut self.trajectories {
            trail.clear();
        }

        self.coordinator.reset();
        self.metrics.reset();
        self.events.clear();
        self.uploads.clear();
        self.uploaded_total = 0;
        self.retask_count = 0;

        self.assign_coverage();
        info!("Simulation reset");
    }

    /// Puts a roaming drone into a sensing hold.
    ///
    /// Returns false for unknown ids or drones that are not roaming.
    pub fn trigger_sensing(&mut self, agent_id: usize) -> bool {
        let Some(agent) = self.agents.get_mut(agent_id) else {
            return false;
        };
        if !agent.begin_sensing() {
            return false;
        }
        self.events
            .push(self.clock.now_ms(), EventKind::SensingStarted { agent_id });
        debug!(agent = agent_id, "Sensing hold started");
        true
    }

    /// Adds an anomaly source directly to the field.
    pub fn inject_anomaly(&mut self, x: f64, y: f64, intensity: f64) {
        self.field.inject(x, y, intensity);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn field(&self) -> &AnomalyField<E> {
        &self.field
    }

    /// Copy of the current intensity grid.
    pub fn grid(&self) -> GridSnapshot {
        self.field.snapshot()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, agent_id: usize) -> Option<&Agent> {
        self.agents.get(agent_id)
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn time_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn time_secs(&self) -> f64 {
        self.clock.secs()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &SimMetrics {
        &self.metrics
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Recent positions of one drone, oldest first.
    pub fn trajectory(&self, agent_id: usize) -> Option<&VecDeque<Vector2<f64>>> {
        self.trajectories.get(agent_id)
    }

    /// Archived uploads, oldest first; at most `upload_archive_capacity`.
    pub fn uploads(&self) -> &VecDeque<UploadedMeasurement> {
        &self.uploads
    }

    /// Measurements delivered to the base station since the last reset.
    pub fn uploaded_total(&self) -> u64 {
        self.uploaded_total
    }

    /// Re-task assignments issued since the last reset.
    pub fn retask_count(&self) -> u64 {
        self.retask_count
    }

    /// Captures the full observable state.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            time_ms: self.clock.now_ms(),
            tick_count: self.tick_count,
            running: self.running,
            grid: self.field.snapshot(),
            sources: self.field.sources().to_vec(),
            agents: self.agents.iter().map(AgentSnapshot::of).collect(),
            metrics: self.metrics.current().clone(),
            history: self.metrics.history().to_vec(),
            events: self.events.to_vec(),
            uploads: self.uploads.iter().cloned().collect(),
        }
    }

    fn assign_coverage(&mut self) {
        let (width, height) = (self.config.grid_width, self.config.grid_height);
        self.coordinator.assign_coverage(&mut self.agents, width, height);
    }

    fn advance_agents(&mut self, now: u64, dt: u64) {
        let threshold = self.config.detection_threshold;
        let amplitude = self.config.noise_amplitude;
        let capacity = self.config.trajectory_capacity;
        let archive_capacity = self.config.upload_archive_capacity;

        for (agent, trail) in self.agents.iter_mut().zip(self.trajectories.iter_mut()) {
            let report = agent.advance(dt);
            let id = agent.id();

            if let Some((from, to)) = report.transition {
                debug!(agent = id, %from, %to, "Drone state changed");
                self.events.push(now, EventKind::StateChanged { agent_id: id, from, to });
            }

            if !report.uploaded.is_empty() {
                debug!(agent = id, count = report.uploaded.len(), "Measurements uploaded");
                self.events.push(
                    now,
                    EventKind::Uploaded {
                        agent_id: id,
                        count: report.uploaded.len(),
                    },
                );
                self.uploaded_total += report.uploaded.len() as u64;
                for measurement in report.uploaded {
                    if archive_capacity == 0 {
                        break;
                    }
                    if self.uploads.len() == archive_capacity {
                        self.uploads.pop_front();
                    }
                    self.uploads.push_back(UploadedMeasurement {
                        agent_id: id,
                        uploaded_ms: now,
                        measurement,
                    });
                }
            }

            if agent.mode() == AgentMode::Roaming {
                let pos = agent.position();
                let intensity = self.field.sample_at(pos.x, pos.y);
                if intensity > threshold {
                    let measured = intensity + self.noise.uniform(-amplitude, amplitude);
                    agent.record_measurement(measured, now, pos.x, pos.y);
                    self.events.push(
                        now,
                        EventKind::Detection {
                            agent_id: id,
                            intensity: measured,
                            x: pos.x,
                            y: pos.y,
                        },
                    );
                }
            }

            if capacity > 0 {
                if trail.len() == capacity {
                    trail.pop_front();
                }
                trail.push_back(agent.position());
            }
        }
    }

    fn log_retasks(&mut self, now: u64, assignments: &[Retask]) {
        self.retask_count += assignments.len() as u64;
        for retask in assignments {
            self.events.push(
                now,
                EventKind::Retasked {
                    agent_id: retask.agent_id,
                    hotspot_x: retask.hotspot.0,
                    hotspot_y: retask.hotspot.1,
                },
            );
        }
    }
}
