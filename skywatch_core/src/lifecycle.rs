//! Drone lifecycle state machine.
//!
//! The transition function is pure: given the current state and what the
//! drone observed this tick, it returns the next state and the list of
//! effects the drone must apply. Motion and bookkeeping live in
//! [`Agent`](crate::Agent); the decisions live here.
//!
//! ```text
//!            energy <= 0                 at base
//!  ROAMING ───────────────► RETURNING ───────────► CHARGING
//!   ▲   │                      ▲                      │
//!   │   │ trigger              │ energy <= 0          │ recharge done
//!   │   ▼                      │                      │
//!   └─ SENSING ────────────────┘                      │
//!   ▲  (timer done)                                   │
//!   └─────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle state with its timers.
///
/// Timers are remaining milliseconds and only exist in the states that use
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    /// Following the waypoint queue
    Roaming,

    /// Holding position for an explicit measurement
    Sensing { remaining_ms: i64 },

    /// Flying back to base on an exhausted budget
    Returning,

    /// On the pad
    Charging { remaining_ms: i64 },
}

/// Timer-free view of [`AgentState`], for counting and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentMode {
    Roaming,
    Sensing,
    Returning,
    Charging,
}

impl AgentState {
    pub fn mode(&self) -> AgentMode {
        match self {
            AgentState::Roaming => AgentMode::Roaming,
            AgentState::Sensing { .. } => AgentMode::Sensing,
            AgentState::Returning => AgentMode::Returning,
            AgentState::Charging { .. } => AgentMode::Charging,
        }
    }
}

impl AgentMode {
    pub fn name(&self) -> &'static str {
        match self {
            AgentMode::Roaming => "ROAMING",
            AgentMode::Sensing => "SENSING",
            AgentMode::Returning => "RETURNING",
            AgentMode::Charging => "CHARGING",
        }
    }
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What the drone knows at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInputs {
    /// Elapsed time this tick (ms)
    pub dt_ms: i64,

    /// Energy before this tick's consumption (ms)
    pub energy_ms: i64,

    /// Within arrival tolerance of the base
    pub at_base: bool,

    /// Recharge duration to load when docking (ms)
    pub recharge_ms: i64,
}

/// Side effects requested by a transition, applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Advance along the waypoint queue
    FollowPath,

    /// Move toward the base
    MoveToBase,

    /// Subtract this many ms from the energy budget
    Consume(i64),

    /// Point the current target at the base
    TargetBase,

    /// Hand the measurement log to the base station
    Upload,

    /// Refill the energy budget
    Recharge,
}

/// Computes the next state and the effects to apply.
pub fn step(state: AgentState, inputs: StepInputs) -> (AgentState, Vec<Effect>) {
    let dt = inputs.dt_ms;
    let exhausted = inputs.energy_ms.saturating_sub(dt) <= 0;

    match state {
        AgentState::Roaming => {
            if exhausted {
                (
                    AgentState::Returning,
                    vec![Effect::FollowPath, Effect::Consume(dt), Effect::TargetBase],
                )
            } else {
                (AgentState::Roaming, vec![Effect::FollowPath, Effect::Consume(dt)])
            }
        }

        AgentState::Sensing { remaining_ms } => {
            let remaining = remaining_ms.saturating_sub(dt);
            let next = if exhausted {
                // Energy wins over an unfinished measurement
                AgentState::Returning
            } else if remaining <= 0 {
                AgentState::Roaming
            } else {
                AgentState::Sensing { remaining_ms: remaining }
            };
            let mut effects = vec![Effect::Consume(dt)];
            if exhausted {
                effects.push(Effect::TargetBase);
            }
            (next, effects)
        }

        AgentState::Returning => {
            if inputs.at_base {
                (
                    AgentState::Charging {
                        remaining_ms: inputs.recharge_ms,
                    },
                    vec![Effect::Upload],
                )
            } else {
                (AgentState::Returning, vec![Effect::MoveToBase, Effect::Consume(dt)])
            }
        }

        AgentState::Charging { remaining_ms } => {
            let remaining = remaining_ms.saturating_sub(dt);
            if remaining <= 0 {
                (AgentState::Roaming, vec![Effect::Recharge])
            } else {
                (AgentState::Charging { remaining_ms: remaining }, Vec::new())
            }
        }
    }
}
