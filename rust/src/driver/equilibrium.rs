//! Equilibrium tip count and the run lengths derived from it.
//!
//! In steady state the number of edges NE and the number of tips N1 satisfy
//!
//! ```text
//! NE = N1 (2 ln 2N1 + 2γ - 3)
//! ```
//!
//! with γ the Euler-Mascheroni constant. Solving for N1 gives the
//! retraction time scale τ_r = N1 / (2 k_b), which sizes burn-in and
//! sampling windows.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SolverError;

/// Euler-Mascheroni constant.
pub const EULER_GAMMA: f64 = 0.5772156649;

pub const DEFAULT_TOLERANCE: f64 = 1e-10;
pub const DEFAULT_MAX_ITER: usize = 60;

/// Burn-in floor, in steps.
pub const MIN_BURN_IN_STEPS: u64 = 2_000;
/// Sampling-window floor, in steps.
pub const MIN_SAMPLE_STEPS: u64 = 50_000;

/// Solve for N1 with the default tolerance and iteration cap.
pub fn solve_n1_from_ne(edge_count: f64) -> Result<f64, SolverError> {
    solve_n1_with(edge_count, DEFAULT_TOLERANCE, DEFAULT_MAX_ITER)
}

/// Newton-Raphson on f(x) = x (2 ln 2x + 2γ - 3) - NE.
///
/// Starts from NE / max(ln NE, 1.2). Gives up with `NotConverged` after
/// `max_iter` updates or as soon as an iterate leaves the domain of ln.
pub fn solve_n1_with(edge_count: f64, tol: f64, max_iter: usize) -> Result<f64, SolverError> {
    if !edge_count.is_finite() || edge_count <= 0.0 {
        return Err(SolverError::InvalidInput(format!(
            "edge count must be positive and finite, got {edge_count}"
        )));
    }

    let mut x = edge_count / edge_count.ln().max(1.2);
    for iteration in 0..max_iter {
        let log_term = 2.0 * (2.0 * x).ln() + 2.0 * EULER_GAMMA;
        let f = x * (log_term - 3.0) - edge_count;
        let df = log_term - 1.0;
        let x_new = x - f / df;

        if !x_new.is_finite() || x_new <= 0.0 {
            return Err(SolverError::NotConverged {
                iterations: iteration + 1,
                last: x_new,
            });
        }
        if (x_new - x).abs() < tol {
            return Ok(x_new);
        }
        x = x_new;
    }

    Err(SolverError::NotConverged {
        iterations: max_iter,
        last: x,
    })
}

/// Mean edge length implied by the rates: (2k_b + k_g) / (2k_b) · dL.
pub fn equilibrium_mean_length(
    branch_rate: f64,
    growth_rate: f64,
    length_increment: f64,
) -> Result<f64, SolverError> {
    if branch_rate <= 0.0 {
        return Err(SolverError::InvalidInput(format!(
            "branch rate must be positive, got {branch_rate}"
        )));
    }
    Ok((2.0 * branch_rate + growth_rate) / (2.0 * branch_rate) * length_increment)
}

/// N1 for a network of total length `target_length`.
pub fn solve_n1_scaled(
    target_length: f64,
    branch_rate: f64,
    growth_rate: f64,
    length_increment: f64,
) -> Result<f64, SolverError> {
    let mean_length = equilibrium_mean_length(branch_rate, growth_rate, length_increment)?;
    solve_n1_from_ne(target_length / mean_length)
}

/// Step counts for a single trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    /// Steps discarded before sampling.
    pub burn_in_steps: u64,
    /// Steps sampled (one snapshot per step).
    pub sample_steps: u64,
}

impl Default for RunPlan {
    fn default() -> Self {
        Self {
            burn_in_steps: MIN_BURN_IN_STEPS,
            sample_steps: MIN_SAMPLE_STEPS,
        }
    }
}

impl RunPlan {
    pub fn new(burn_in_steps: u64, sample_steps: u64) -> Self {
        Self {
            burn_in_steps,
            sample_steps,
        }
    }

    /// Burn-in of 10 τ_r and sampling of 40 τ_r, each with its floor.
    pub fn from_equilibrium(
        target_length: f64,
        branch_rate: f64,
        growth_rate: f64,
        length_increment: f64,
    ) -> Result<Self, SolverError> {
        let n1 = solve_n1_scaled(target_length, branch_rate, growth_rate, length_increment)?;
        let tau_r = n1 / (2.0 * branch_rate);

        let plan = Self {
            burn_in_steps: ((10.0 * tau_r) as u64).max(MIN_BURN_IN_STEPS),
            sample_steps: ((40.0 * tau_r) as u64).max(MIN_SAMPLE_STEPS),
        };
        debug!(n1, tau_r, burn_in = plan.burn_in_steps, sample = plan.sample_steps, "run plan");
        Ok(plan)
    }
}
