//! Traveling network: a branching tree driven by a Gillespie process.
//!
//! This module provides:
//! - NetworkConfig: rates, target length and seed of one run
//! - RateModel / Propensities: per-leaf rates with adaptive switching
//! - TravelingNetwork: the engine (`step` / `snapshot`)
//! - Snapshot / SnapshotAccumulator: statistics read off the engine

pub mod config;
pub mod engine;
pub mod rates;
pub mod snapshot;

pub use config::NetworkConfig;
pub use engine::{StepOutcome, TravelingNetwork};
pub use rates::{EventKind, Propensities, RateModel, Selection};
pub use snapshot::{MeanSnapshot, Snapshot, SnapshotAccumulator, StepDelta};
