//! Anomaly regimes.
//!
//! A scenario is a bundle of field parameters applied on top of a
//! [`SimConfig`]; fleet and grid settings are left alone.

use skywatch_core::SimConfig;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// Empty sky, nothing ever spawns
    NoAnomalies,

    /// Rare, short-lived anomalies
    SparseAnomalies,

    /// Default regime
    Normal,

    /// Frequent, widely spreading anomalies
    HeavyPollution,

    /// Fewer spawns but fast decay and strong diffusion
    RapidlySpreading,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::NoAnomalies,
            ScenarioId::SparseAnomalies,
            ScenarioId::Normal,
            ScenarioId::HeavyPollution,
            ScenarioId::RapidlySpreading,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::NoAnomalies => "no_anomalies",
            ScenarioId::SparseAnomalies => "sparse_anomalies",
            ScenarioId::Normal => "normal",
            ScenarioId::HeavyPollution => "heavy_pollution",
            ScenarioId::RapidlySpreading => "rapidly_spreading",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::NoAnomalies => "No anomalies: baseline patrol with an empty field",
            ScenarioId::SparseAnomalies => "Sparse anomalies: low spawn rate, slow spread",
            ScenarioId::Normal => "Normal conditions: moderate spawn, decay and diffusion",
            ScenarioId::HeavyPollution => "Heavy pollution: frequent spawns spreading widely",
            ScenarioId::RapidlySpreading => "Rapidly spreading: quick decay, strong diffusion",
        }
    }

    /// `(spawn_probability, decay_rate, diffusion_factor)`
    pub fn field_parameters(&self) -> (f64, f64, f64) {
        match self {
            ScenarioId::NoAnomalies => (0.0, 0.90, 0.05),
            ScenarioId::SparseAnomalies => (0.02, 0.93, 0.08),
            ScenarioId::Normal => (0.05, 0.95, 0.10),
            ScenarioId::HeavyPollution => (0.15, 0.92, 0.15),
            ScenarioId::RapidlySpreading => (0.08, 0.90, 0.20),
        }
    }

    /// Overwrites the field parameters of `config` with this regime's.
    pub fn apply(&self, config: &mut SimConfig) {
        let (spawn, decay, diffusion) = self.field_parameters();
        config.spawn_probability = spawn;
        config.decay_rate = decay;
        config.diffusion_factor = diffusion;
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "no_anomalies" | "none" => Ok(ScenarioId::NoAnomalies),
            "sparse_anomalies" | "sparse" => Ok(ScenarioId::SparseAnomalies),
            "normal" => Ok(ScenarioId::Normal),
            "heavy_pollution" | "heavy" => Ok(ScenarioId::HeavyPollution),
            "rapidly_spreading" | "rapid" => Ok(ScenarioId::RapidlySpreading),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
