//! Drone agent: motion, energy budget and measurement log.

use crate::lifecycle::{self, AgentMode, AgentState, Effect, StepInputs};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The charging base sits at the grid origin.
pub fn base() -> Vector2<f64> {
    Vector2::zeros()
}

/// Per-drone motion and energy parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentParams {
    /// Cells per simulated second
    pub speed: f64,

    /// Energy budget on a full charge (ms of flight)
    pub energy_capacity_ms: i64,

    /// Time on the pad before the drone flies again (ms)
    pub recharge_duration_ms: i64,

    /// Length of an explicit sensing hold (ms)
    pub measurement_duration_ms: i64,

    /// Distance at which a waypoint counts as reached
    pub arrival_tolerance: f64,
}

/// A single sensor reading held by a drone until it docks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub intensity: f64,
    /// Simulation time of the reading (ms)
    pub timestamp_ms: u64,
    pub x: f64,
    pub y: f64,
}

/// Outcome of one [`Agent::advance`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvanceReport {
    /// `(from, to)` when the lifecycle state changed
    pub transition: Option<(AgentMode, AgentMode)>,

    /// Measurements handed to the base station on docking
    pub uploaded: Vec<Measurement>,
}

/// A drone.
#[derive(Debug, Clone)]
pub struct Agent {
    id: usize,
    position: Vector2<f64>,

    /// Point the drone is currently flying toward
    target: Vector2<f64>,

    state: AgentState,

    /// Remaining flight time; may dip below zero for one tick
    energy_ms: i64,

    path: VecDeque<Vector2<f64>>,
    measurements: Vec<Measurement>,
    params: AgentParams,
}

impl Agent {
    /// Creates a fully charged, roaming drone parked at base.
    pub fn new(id: usize, params: AgentParams) -> Self {
        Self {
            id,
            position: base(),
            target: base(),
            state: AgentState::Roaming,
            energy_ms: params.energy_capacity_ms,
            path: VecDeque::new(),
            measurements: Vec::new(),
            params,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn position(&self) -> Vector2<f64> {
        self.position
    }

    pub fn target(&self) -> Vector2<f64> {
        self.target
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn mode(&self) -> AgentMode {
        self.state.mode()
    }

    /// Remaining energy, never negative.
    pub fn energy_ms(&self) -> i64 {
        self.energy_ms.max(0)
    }

    /// Remaining energy as a fraction of capacity.
    pub fn energy_fraction(&self) -> f64 {
        self.energy_ms() as f64 / self.params.energy_capacity_ms as f64
    }

    pub fn params(&self) -> &AgentParams {
        &self.params
    }

    /// Pending waypoints, head first.
    pub fn path(&self) -> &VecDeque<Vector2<f64>> {
        &self.path
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Within arrival tolerance of the base.
    pub fn is_at_base(&self) -> bool {
        self.position.norm() < self.params.arrival_tolerance
    }

    /// Replaces the waypoint queue.
    ///
    /// Whatever remained of the previous path is discarded. A non-empty path
    /// that does not already end at the base gets the base appended, so the
    /// queue always drains back home.
    pub fn assign_path<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = Vector2<f64>>,
    {
        self.path.clear();
        self.path.extend(points);

        if let Some(last) = self.path.back() {
            if *last != base() {
                self.path.push_back(base());
            }
        }
    }

    pub fn record_measurement(&mut self, intensity: f64, timestamp_ms: u64, x: f64, y: f64) {
        self.measurements.push(Measurement {
            intensity,
            timestamp_ms,
            x,
            y,
        });
    }

    pub fn clear_measurements(&mut self) {
        self.measurements.clear();
    }

    /// Holds position for a measurement.
    ///
    /// Only a roaming drone can start sensing; returns false otherwise.
    pub fn begin_sensing(&mut self) -> bool {
        if self.state != AgentState::Roaming {
            return false;
        }
        self.state = AgentState::Sensing {
            remaining_ms: self.params.measurement_duration_ms,
        };
        true
    }

    /// Advances motion, energy and lifecycle by `dt_ms`.
    pub fn advance(&mut self, dt_ms: u64) -> AdvanceReport {
        let inputs = StepInputs {
            dt_ms: crate::config::clamp_millis(dt_ms),
            energy_ms: self.energy_ms,
            at_base: self.is_at_base(),
            recharge_ms: self.params.recharge_duration_ms,
        };
        let dt_secs = dt_ms as f64 / 1000.0;

        let before = self.state.mode();
        let (next, effects) = lifecycle::step(self.state, inputs);

        let mut report = AdvanceReport::default();
        for effect in effects {
            match effect {
                Effect::FollowPath => {
                    self.refresh_target();
                    self.move_toward(self.target, dt_secs);
                }
                Effect::MoveToBase => {
                    self.target = base();
                    self.move_toward(base(), dt_secs);
                }
                Effect::Consume(ms) => self.energy_ms = self.energy_ms.saturating_sub(ms),
                Effect::TargetBase => self.target = base(),
                Effect::Upload => report.uploaded = std::mem::take(&mut self.measurements),
                Effect::Recharge => self.energy_ms = self.params.energy_capacity_ms,
            }
        }

        self.state = next;
        if next.mode() != before {
            report.transition = Some((before, next.mode()));
        }
        report
    }

    /// Restores the drone to its freshly constructed state.
    pub fn reset(&mut self) {
        *self = Self::new(self.id, self.params);
    }

    /// Drops reached waypoints and points `target` at the next one.
    ///
    /// With an empty queue the target stays where it was.
    fn refresh_target(&mut self) {
        while let Some(&head) = self.path.front() {
            if (head - self.position).norm() < self.params.arrival_tolerance {
                self.path.pop_front();
                continue;
            }
            self.target = head;
            return;
        }
    }

    /// Moves toward `goal` at fixed speed without overshooting.
    fn move_toward(&mut self, goal: Vector2<f64>, dt_secs: f64) {
        let delta = goal - self.position;
        let dist = delta.norm();
        if dist <= f64::EPSILON {
            return;
        }
        let travel = (self.params.speed * dt_secs).min(dist);
        self.position += delta * (travel / dist);
    }
}
