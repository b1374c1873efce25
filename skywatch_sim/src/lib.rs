//! SkyWatch Simulation Harness
//!
//! Runs the core engine under named anomaly regimes and writes the results
//! out for offline analysis.
//!
//! # Usage
//!
//! ```no_run
//! use skywatch_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 7)
//!     .with_duration(120.0)
//!     .run(ScenarioId::HeavyPollution)
//!     .unwrap();
//! println!("{} detections", result.detections);
//! ```

pub mod exporter;
mod runner;
pub mod scenarios;

pub use exporter::{ExportError, RunExport};
pub use runner::{ScenarioResult, ScenarioRunner};
