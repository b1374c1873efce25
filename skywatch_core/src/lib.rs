//! SkyWatch Core - Drone Swarm Anomaly Coverage
//!
//! A fleet of battery-limited drones sweeps a rectangular grid in which
//! pollution-like anomalies spawn, decay and diffuse. The crate is split along
//! the three things that change every tick:
//! 1. **Environment**: [`AnomalyField`] owns anomaly sources and the derived intensity grid
//! 2. **Fleet**: [`Agent`] moves along waypoint queues under the [`lifecycle`] state machine
//! 3. **Coordination**: [`Coordinator`] plans coverage sweeps and re-tasks drones to hotspots
//!
//! [`Engine`] composes them, advancing a simulated clock one tick per call.
//!
//! # Usage
//!
//! ```
//! use skywatch_core::{Engine, SimConfig};
//!
//! let mut engine = Engine::seeded(SimConfig::default()).unwrap();
//! engine.start();
//! for _ in 0..10 {
//!     engine.tick();
//! }
//! assert_eq!(engine.time_ms(), 2_000);
//! ```

pub mod agent;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod field;
pub mod lifecycle;
pub mod metrics;

// Re-export key types for convenience
pub use agent::{base, AdvanceReport, Agent, AgentParams, Measurement};
pub use config::SimConfig;
pub use coordinator::{plan_coverage, Coordinator, CoordinatorParams, Retask};
pub use engine::{AgentSnapshot, Engine, EngineSnapshot, UploadedMeasurement};
pub use error::ConfigError;
pub use events::{EventKind, EventLog, SimEvent};
pub use field::{AnomalyField, AnomalySource, FieldParams, GridSnapshot};
pub use lifecycle::{AgentMode, AgentState};
pub use metrics::{MetricsSnapshot, SimMetrics};
