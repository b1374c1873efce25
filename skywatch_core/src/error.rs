//! Error types for the simulation core.

use thiserror::Error;

/// Reasons a [`SimConfig`](crate::SimConfig) is rejected at construction.
///
/// The running simulation itself never fails; every degenerate input that
/// could otherwise surface as a division by zero or a runaway field is
/// caught here instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Grid must have at least one cell in each dimension
    #[error("Grid dimensions must be non-zero (got {width}x{height})")]
    EmptyGrid { width: usize, height: usize },

    /// A fleet of zero agents cannot cover anything
    #[error("Agent count must be at least 1")]
    NoAgents,

    /// A duration parameter that must be positive was zero
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// A parameter fell outside its valid range
    #[error("{name} = {value} is outside {range}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        range: &'static str,
    },

    /// Configuration text could not be parsed
    #[error("Configuration parse error: {0}")]
    Parse(String),
}

impl ConfigError {
    /// Creates an out-of-range error.
    pub fn out_of_range(name: &'static str, value: f64, range: &'static str) -> Self {
        Self::OutOfRange { name, value, range }
    }
}
