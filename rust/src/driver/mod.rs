//! Trial driver around the engine.
//!
//! - equilibrium: Newton solver for the steady-state tip count, run plans
//! - stats: Student-t confidence intervals
//! - trials: burn-in/sampling runs and parallel repetition over seeds

pub mod equilibrium;
pub mod stats;
pub mod trials;

pub use equilibrium::{solve_n1_from_ne, solve_n1_scaled, RunPlan};
pub use stats::{confidence_interval, ConfidenceInterval};
pub use trials::{is_collapsed, run_once, run_trials, TrialResult, TrialSummary, OBSERVABLE_COLUMNS};
