//! Repeated trials: burn-in, sampling window, collapse filtering, intervals.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::equilibrium::RunPlan;
use super::stats::{confidence_interval, ConfidenceInterval};
use crate::error::DriverError;
use crate::network::{
    MeanSnapshot, NetworkConfig, Snapshot, SnapshotAccumulator, StepOutcome, TravelingNetwork,
};

/// Column order of `TrialSummary::per_trial`.
pub const OBSERVABLE_COLUMNS: [&str; 4] = ["L_bar", "NE", "NF", "NR"];

/// Outcome of one trial.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub seed: Option<u64>,
    /// Mean over the sampling window.
    pub mean: MeanSnapshot,
    pub final_snapshot: Snapshot,
    /// Steps that found no event to fire.
    pub absorbed_steps: u64,
    pub collapsed: bool,
}

/// A trial collapsed if it ended with a bare root and averaged less than one
/// free tip over the sampling window.
///
/// A bare root alone is not terminal: the root frees itself on its next
/// retract event and can branch again.
pub fn is_collapsed(mean: &MeanSnapshot, final_snapshot: &Snapshot) -> bool {
    final_snapshot.edge_count == 0 && mean.free_leaves < 1.0
}

/// Run one engine through burn-in and a sampling window.
pub fn run_once(config: &NetworkConfig, plan: &RunPlan) -> Result<TrialResult, DriverError> {
    if plan.sample_steps == 0 {
        return Err(DriverError::EmptySampleWindow);
    }

    let mut network = TravelingNetwork::new(config.clone())?;
    let mut absorbed_steps = 0;

    for _ in 0..plan.burn_in_steps {
        if network.step()? == StepOutcome::Absorbed {
            absorbed_steps += 1;
        }
    }

    let mut accumulator = SnapshotAccumulator::new();
    for _ in 0..plan.sample_steps {
        if network.step()? == StepOutcome::Absorbed {
            absorbed_steps += 1;
        }
        accumulator.record(&network.snapshot());
    }

    let mean = accumulator.mean().ok_or(DriverError::EmptySampleWindow)?;
    let final_snapshot = network.snapshot();
    let collapsed = is_collapsed(&mean, &final_snapshot);

    debug!(
        seed = ?config.seed,
        l_bar = mean.mean_edge_length,
        nf = mean.free_leaves,
        nr = mean.retract_leaves,
        collapsed,
        "trial finished"
    );

    Ok(TrialResult {
        seed: config.seed,
        mean,
        final_snapshot,
        absorbed_steps,
        collapsed,
    })
}

/// Aggregate over the trials that did not collapse.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialSummary {
    pub trials: usize,
    pub collapsed: usize,
    pub free_leaves: ConfidenceInterval,
    pub retract_leaves: ConfidenceInterval,
    pub mean_edge_length: ConfidenceInterval,
    /// NF + NR, the tip count N1.
    pub tip_count: f64,
    /// S / L_bar, the edge count implied by the target length.
    pub implied_edge_count: f64,
    /// One row per surviving trial, columns `OBSERVABLE_COLUMNS`.
    pub per_trial: Array2<f64>,
    /// Seeds of the surviving trials, row-aligned with `per_trial`.
    pub seeds: Vec<u64>,
}

/// Run `n_trials` independent trials in parallel.
///
/// Trial `i` uses seed `base_seed + i`; collapsed trials are dropped.
pub fn run_trials(
    config: &NetworkConfig,
    plan: &RunPlan,
    n_trials: usize,
    base_seed: u64,
    level: f64,
) -> Result<TrialSummary, DriverError> {
    info!(
        target_length = config.target_length,
        k_b = config.branch_rate,
        k_g = config.growth_rate,
        burn_in = plan.burn_in_steps,
        sample = plan.sample_steps,
        n_trials,
        "running trials"
    );

    let results: Vec<TrialResult> = (0..n_trials)
        .into_par_iter()
        .map(|i| {
            let trial_config = config.clone().with_seed(base_seed.wrapping_add(i as u64));
            run_once(&trial_config, plan)
        })
        .collect::<Result<_, _>>()?;

    let mut survivors = Vec::with_capacity(results.len());
    for result in results {
        if result.collapsed {
            warn!(seed = ?result.seed, "trial collapsed, discarding");
        } else {
            survivors.push(result);
        }
    }

    if survivors.len() < 2 {
        return Err(DriverError::TooFewSurvivors {
            survivors: survivors.len(),
            trials: n_trials,
        });
    }

    let per_trial = Array2::from_shape_fn((survivors.len(), OBSERVABLE_COLUMNS.len()), |(i, j)| {
        survivors[i].mean.observables()[j]
    });

    let mean_edge_length = confidence_interval(per_trial.column(0), level)?;
    let free_leaves = confidence_interval(per_trial.column(2), level)?;
    let retract_leaves = confidence_interval(per_trial.column(3), level)?;

    let summary = TrialSummary {
        trials: n_trials,
        collapsed: n_trials - survivors.len(),
        tip_count: free_leaves.mean + retract_leaves.mean,
        implied_edge_count: config.target_length / mean_edge_length.mean,
        free_leaves,
        retract_leaves,
        mean_edge_length,
        seeds: survivors.iter().filter_map(|r| r.seed).collect(),
        per_trial,
    };

    info!(
        survivors = survivors.len(),
        collapsed = summary.collapsed,
        nf = summary.free_leaves.mean,
        nr = summary.retract_leaves.mean,
        l_bar = summary.mean_edge_length.mean,
        "trials aggregated"
    );

    Ok(summary)
}
