//! Skywatch Environment Abstraction Layer
//!
//! Every source of non-determinism the simulation core touches is routed
//! through this crate:
//! - **Randomness**: anomaly spawning and sensor jitter draw from an
//!   [`EntropySource`] handed to the engine at construction
//! - **Time**: the simulation clock is a [`SimClock`] that only moves when
//!   the engine ticks it, never with the wall clock
//!
//! By deriving all entropy from a single 64-bit seed, any run becomes
//! reproducible from its seed number.
//!
//! # Example
//!
//! ```
//! use skywatch_env::{EntropySource, SeededEntropy};
//!
//! let mut a = SeededEntropy::new(42);
//! let mut b = SeededEntropy::new(42);
//! assert_eq!(a.unit(), b.unit());
//! ```

mod clock;
mod entropy;

pub use clock::SimClock;
pub use entropy::{EntropySource, OsEntropy, SeededEntropy};
