//! Simulation configuration.

use crate::agent::AgentParams;
use crate::error::ConfigError;
use crate::field::FieldParams;
use serde::{Deserialize, Serialize};

/// Configuration for a simulation run.
///
/// Every tunable of the engine lives here so that scenario presets are just
/// different bundles of values. Missing fields in a JSON document fall back
/// to [`SimConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Grid width in cells
    pub grid_width: usize,

    /// Grid height in cells
    pub grid_height: usize,

    /// Number of drones in the fleet
    pub num_agents: usize,

    /// Simulated time per tick (ms)
    pub tick_duration_ms: u64,

    /// Drone speed in cells per simulated second
    pub agent_speed: f64,

    /// Flight autonomy on a full charge (ms)
    pub energy_capacity_ms: u64,

    /// Time spent on the charging pad (ms)
    pub recharge_duration_ms: u64,

    /// Duration of an explicit sensing hold (ms)
    pub measurement_duration_ms: u64,

    /// Probability of a new anomaly source per tick
    pub spawn_probability: f64,

    /// Per-tick intensity multiplier for live sources
    pub decay_rate: f64,

    /// Fraction of a cell's intensity spread over its 8 neighbours
    pub diffusion_factor: f64,

    /// Intensity above which a roaming drone logs a measurement
    pub detection_threshold: f64,

    /// Intensity above which a cell counts as a re-tasking hotspot
    pub hotspot_threshold: f64,

    /// A hotspot with a roaming drone closer than this is considered covered
    pub retask_radius: f64,

    /// Re-tasking cadence in ticks
    pub retask_interval_ticks: u64,

    /// Metrics history cadence (ms of simulated time)
    pub snapshot_interval_ms: u64,

    /// Distance at which a waypoint (or the base) counts as reached
    pub arrival_tolerance: f64,

    /// Half-width of the uniform jitter added to measurements
    pub noise_amplitude: f64,

    /// Positions kept per drone trajectory
    pub trajectory_capacity: usize,

    /// Events kept in the log before the oldest are dropped
    pub event_log_capacity: usize,

    /// Uploaded measurements kept in the base-station archive
    pub upload_archive_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            grid_width: 50,
            grid_height: 50,
            num_agents: 7,
            tick_duration_ms: 200,
            agent_speed: 2.0,
            energy_capacity_ms: 30 * 60 * 1000,
            recharge_duration_ms: 10 * 60 * 1000,
            measurement_duration_ms: 10 * 1000,
            spawn_probability: 0.05,
            decay_rate: 0.95,
            diffusion_factor: 0.10,
            detection_threshold: 0.3,
            hotspot_threshold: 0.7,
            retask_radius: 5.0,
            retask_interval_ticks: 30,
            snapshot_interval_ms: 5_000,
            arrival_tolerance: 0.5,
            noise_amplitude: 0.05,
            trajectory_capacity: 512,
            event_log_capacity: 10_000,
            upload_archive_capacity: 100_000,
        }
    }
}

impl SimConfig {
    /// Parses a JSON document, then validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every parameter against its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::EmptyGrid {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        if self.num_agents == 0 {
            return Err(ConfigError::NoAgents);
        }
        if self.tick_duration_ms == 0 {
            return Err(ConfigError::ZeroDuration("tick_duration_ms"));
        }
        if self.energy_capacity_ms == 0 {
            return Err(ConfigError::ZeroDuration("energy_capacity_ms"));
        }
        if self.snapshot_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("snapshot_interval_ms"));
        }
        if self.retask_interval_ticks == 0 {
            return Err(ConfigError::ZeroDuration("retask_interval_ticks"));
        }

        check_millis("tick_duration_ms", self.tick_duration_ms)?;
        check_millis("energy_capacity_ms", self.energy_capacity_ms)?;
        check_millis("recharge_duration_ms", self.recharge_duration_ms)?;
        check_millis("measurement_duration_ms", self.measurement_duration_ms)?;

        check_unit("spawn_probability", self.spawn_probability)?;
        check_unit("diffusion_factor", self.diffusion_factor)?;
        check_unit("detection_threshold", self.detection_threshold)?;
        check_unit("hotspot_threshold", self.hotspot_threshold)?;

        if !(self.decay_rate > 0.0 && self.decay_rate < 1.0) {
            return Err(ConfigError::out_of_range("decay_rate", self.decay_rate, "(0, 1)"));
        }
        if !(self.agent_speed.is_finite() && self.agent_speed > 0.0) {
            return Err(ConfigError::out_of_range("agent_speed", self.agent_speed, "(0, inf)"));
        }
        if !(self.arrival_tolerance.is_finite() && self.arrival_tolerance > 0.0) {
            return Err(ConfigError::out_of_range(
                "arrival_tolerance",
                self.arrival_tolerance,
                "(0, inf)",
            ));
        }
        if !(self.retask_radius.is_finite() && self.retask_radius >= 0.0) {
            return Err(ConfigError::out_of_range("retask_radius", self.retask_radius, "[0, inf)"));
        }
        if !(self.noise_amplitude.is_finite() && self.noise_amplitude >= 0.0) {
            return Err(ConfigError::out_of_range(
                "noise_amplitude",
                self.noise_amplitude,
                "[0, inf)",
            ));
        }

        Ok(())
    }

    /// Field dynamics parameters.
    pub fn field_params(&self) -> FieldParams {
        FieldParams {
            width: self.grid_width,
            height: self.grid_height,
            spawn_probability: self.spawn_probability,
            decay_rate: self.decay_rate,
            diffusion_factor: self.diffusion_factor,
        }
    }

    /// Per-drone motion and energy parameters.
    pub fn agent_params(&self) -> AgentParams {
        AgentParams {
            speed: self.agent_speed,
            energy_capacity_ms: clamp_millis(self.energy_capacity_ms),
            recharge_duration_ms: clamp_millis(self.recharge_duration_ms),
            measurement_duration_ms: clamp_millis(self.measurement_duration_ms),
            arrival_tolerance: self.arrival_tolerance,
        }
    }

    /// Total number of grid cells.
    pub fn cell_count(&self) -> usize {
        self.grid_width * self.grid_height
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(name, value, "[0, 1]"))
    }
}

/// Durations feed signed millisecond budgets, so they must fit in an `i64`.
fn check_millis(name: &'static str, value: u64) -> Result<(), ConfigError> {
    match i64::try_from(value) {
        Ok(_) => Ok(()),
        Err(_) => Err(ConfigError::out_of_range(name, value as f64, "[0, i64::MAX]")),
    }
}

/// Signed view of a validated duration.
pub(crate) fn clamp_millis(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
