//! Stochastic simulation of a traveling (branching and retracting) network.
//!
//! The core is `network::TravelingNetwork`, a Gillespie engine over an arena
//! tree. `driver` wraps it with run plans, parallel trials and confidence
//! intervals. With the `python` feature the crate builds the
//! `traveling_network_rust` extension module.

pub mod driver;
pub mod error;
pub mod logging;
pub mod network;
pub mod tree;

pub use driver::{run_once, run_trials, RunPlan, TrialResult, TrialSummary};
pub use error::{ConfigError, DriverError, NetworkError, SolverError, StatsError};
pub use network::{EventKind, NetworkConfig, Snapshot, StepOutcome, TravelingNetwork};
pub use tree::{EdgeId, NodeId, NodeState, Tree};

#[cfg(feature = "python")]
mod python {
    use numpy::{PyArray2, PyReadonlyArray1};
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;
    use pyo3::wrap_pyfunction;

    use crate::driver::{self, ConfidenceInterval, RunPlan};
    use crate::error::{DriverError, NetworkError, SolverError, StatsError};
    use crate::network::{MeanSnapshot, NetworkConfig, Snapshot, TravelingNetwork};

    fn network_err(e: NetworkError) -> PyErr {
        match e {
            NetworkError::Config(_) => PyErr::new::<PyValueError, _>(e.to_string()),
            _ => PyErr::new::<PyRuntimeError, _>(e.to_string()),
        }
    }

    fn solver_err(e: SolverError) -> PyErr {
        match e {
            SolverError::InvalidInput(_) => PyErr::new::<PyValueError, _>(e.to_string()),
            SolverError::NotConverged { .. } => PyErr::new::<PyRuntimeError, _>(e.to_string()),
        }
    }

    fn stats_err(e: StatsError) -> PyErr {
        PyErr::new::<PyValueError, _>(e.to_string())
    }

    fn driver_err(e: DriverError) -> PyErr {
        match e {
            DriverError::Network(inner) => network_err(inner),
            DriverError::Solver(inner) => solver_err(inner),
            DriverError::Stats(inner) => stats_err(inner),
            DriverError::EmptySampleWindow => PyErr::new::<PyValueError, _>(e.to_string()),
            DriverError::TooFewSurvivors { .. } => PyErr::new::<PyRuntimeError, _>(e.to_string()),
        }
    }

    #[allow(non_snake_case)]
    fn make_config(
        S: f64,
        k_b: f64,
        k_g: f64,
        k_r: f64,
        alpha: f64,
        dL: f64,
        seed: Option<u64>,
    ) -> NetworkConfig {
        NetworkConfig::new(S, k_b, k_g, k_r, alpha, dL, seed)
    }

    fn snapshot_dict<'py>(py: Python<'py>, s: &Snapshot) -> PyResult<&'py PyDict> {
        let dict = PyDict::new(py);
        dict.set_item("time", s.time)?;
        dict.set_item("L_bar", s.mean_edge_length)?;
        dict.set_item("NE", s.edge_count)?;
        dict.set_item("NF", s.free_leaves)?;
        dict.set_item("NR", s.retract_leaves)?;
        Ok(dict)
    }

    fn mean_dict<'py>(py: Python<'py>, m: &MeanSnapshot) -> PyResult<&'py PyDict> {
        let dict = PyDict::new(py);
        dict.set_item("time", m.time)?;
        dict.set_item("L_bar", m.mean_edge_length)?;
        dict.set_item("NE", m.edge_count)?;
        dict.set_item("NF", m.free_leaves)?;
        dict.set_item("NR", m.retract_leaves)?;
        Ok(dict)
    }

    fn interval_dict<'py>(py: Python<'py>, ci: &ConfidenceInterval) -> PyResult<&'py PyDict> {
        let dict = PyDict::new(py);
        dict.set_item("mean", ci.mean)?;
        dict.set_item("lower", ci.lower)?;
        dict.set_item("upper", ci.upper)?;
        dict.set_item("std_error", ci.std_error)?;
        dict.set_item("n", ci.n)?;
        Ok(dict)
    }

    /// Traveling network engine.
    ///
    /// # Arguments
    /// * `S` - Target total length
    /// * `k_b`, `k_g`, `k_r` - Branch, growth and retraction rates (k_s = k_b)
    /// * `alpha` - Opening angle between sibling branches (radians)
    /// * `dL` - Unit length increment
    /// * `seed` - RNG seed (None for OS entropy)
    #[pyclass(name = "TravelingNetwork")]
    struct PyTravelingNetwork {
        inner: TravelingNetwork,
    }

    #[pymethods]
    impl PyTravelingNetwork {
        #[new]
        #[allow(non_snake_case)]
        #[pyo3(signature = (S=200.0, k_b=0.05, k_g=0.25, k_r=1.0, alpha=std::f64::consts::FRAC_PI_3, dL=1.0, seed=None))]
        fn new(
            S: f64,
            k_b: f64,
            k_g: f64,
            k_r: f64,
            alpha: f64,
            dL: f64,
            seed: Option<u64>,
        ) -> PyResult<Self> {
            let config = make_config(S, k_b, k_g, k_r, alpha, dL, seed);
            let inner = TravelingNetwork::new(config).map_err(network_err)?;
            Ok(Self { inner })
        }

        /// Advance by one Gillespie event (no-op in an absorbing state).
        fn step(&mut self) -> PyResult<()> {
            self.inner.step().map_err(network_err)?;
            Ok(())
        }

        /// Advance by `n` events.
        fn run(&mut self, n: u64) -> PyResult<()> {
            for _ in 0..n {
                self.inner.step().map_err(network_err)?;
            }
            Ok(())
        }

        /// Dict with keys time, L_bar, NE, NF, NR.
        fn snapshot(&self, py: Python<'_>) -> PyResult<PyObject> {
            Ok(snapshot_dict(py, &self.inner.snapshot())?.into())
        }

        /// Node ids (added, removed) by the most recent step.
        fn last_delta(&self) -> (Vec<u64>, Vec<u64>) {
            let delta = self.inner.last_delta();
            (
                delta.added.iter().map(|n| n.0).collect(),
                delta.removed.iter().map(|n| n.0).collect(),
            )
        }

        #[getter]
        fn time(&self) -> f64 {
            self.inner.time()
        }

        #[getter]
        fn total_length(&self) -> f64 {
            self.inner.total_length()
        }
    }

    /// Run one trial: burn-in steps, then a sampling window averaged per key.
    #[pyfunction]
    #[allow(non_snake_case, clippy::too_many_arguments)]
    #[pyo3(signature = (S, k_b, k_g, k_r, alpha, dL, seed, burn_in_steps, sample_steps))]
    fn run_once(
        py: Python<'_>,
        S: f64,
        k_b: f64,
        k_g: f64,
        k_r: f64,
        alpha: f64,
        dL: f64,
        seed: Option<u64>,
        burn_in_steps: u64,
        sample_steps: u64,
    ) -> PyResult<PyObject> {
        let config = make_config(S, k_b, k_g, k_r, alpha, dL, seed);
        let plan = RunPlan::new(burn_in_steps, sample_steps);
        let result = py
            .allow_threads(|| driver::run_once(&config, &plan))
            .map_err(driver_err)?;

        let dict = mean_dict(py, &result.mean)?;
        dict.set_item("collapsed", result.collapsed)?;
        Ok(dict.into())
    }

    /// Run `n_trials` trials in parallel and aggregate the survivors.
    ///
    /// When step counts are omitted they are derived from the equilibrium
    /// tip count (10 and 40 retraction times, floored at 2000 / 50000).
    ///
    /// # Returns
    /// * Dict with intervals for NF, NR, L_bar, plus `N1`, `S_over_L_bar`,
    ///   `collapsed`, `seeds` and `per_trial` (numpy, columns L_bar, NE, NF, NR)
    #[pyfunction]
    #[allow(non_snake_case, clippy::too_many_arguments)]
    #[pyo3(signature = (S=800.0, k_b=0.1, k_g=0.01, k_r=1.0, alpha=std::f64::consts::FRAC_PI_3, dL=1.0, n_trials=50, base_seed=0, level=0.95, burn_in_steps=None, sample_steps=None))]
    fn run_trials(
        py: Python<'_>,
        S: f64,
        k_b: f64,
        k_g: f64,
        k_r: f64,
        alpha: f64,
        dL: f64,
        n_trials: usize,
        base_seed: u64,
        level: f64,
        burn_in_steps: Option<u64>,
        sample_steps: Option<u64>,
    ) -> PyResult<PyObject> {
        let config = make_config(S, k_b, k_g, k_r, alpha, dL, None);
        let plan = match (burn_in_steps, sample_steps) {
            (Some(burn), Some(sample)) => RunPlan::new(burn, sample),
            (burn, sample) => {
                let derived = RunPlan::from_equilibrium(S, k_b, k_g, dL).map_err(solver_err)?;
                RunPlan::new(
                    burn.unwrap_or(derived.burn_in_steps),
                    sample.unwrap_or(derived.sample_steps),
                )
            }
        };

        let summary = py
            .allow_threads(|| driver::run_trials(&config, &plan, n_trials, base_seed, level))
            .map_err(driver_err)?;

        let dict = PyDict::new(py);
        dict.set_item("NF", interval_dict(py, &summary.free_leaves)?)?;
        dict.set_item("NR", interval_dict(py, &summary.retract_leaves)?)?;
        dict.set_item("L_bar", interval_dict(py, &summary.mean_edge_length)?)?;
        dict.set_item("N1", summary.tip_count)?;
        dict.set_item("S_over_L_bar", summary.implied_edge_count)?;
        dict.set_item("trials", summary.trials)?;
        dict.set_item("collapsed", summary.collapsed)?;
        dict.set_item("burn_in_steps", plan.burn_in_steps)?;
        dict.set_item("sample_steps", plan.sample_steps)?;
        dict.set_item("seeds", summary.seeds.clone())?;
        dict.set_item("per_trial", PyArray2::from_owned_array(py, summary.per_trial))?;
        Ok(dict.into())
    }

    /// Equilibrium tip count N1 for target length `S`.
    #[pyfunction]
    #[allow(non_snake_case)]
    #[pyo3(signature = (S, k_b, k_g, dL=1.0))]
    fn solve_n1_scaled(S: f64, k_b: f64, k_g: f64, dL: f64) -> PyResult<f64> {
        driver::solve_n1_scaled(S, k_b, k_g, dL).map_err(solver_err)
    }

    /// Student-t confidence interval.
    ///
    /// # Returns
    /// * Tuple of (mean, lower, upper)
    #[pyfunction]
    #[pyo3(signature = (data, level=0.95))]
    fn compute_confidence_interval(
        data: PyReadonlyArray1<f64>,
        level: f64,
    ) -> PyResult<(f64, f64, f64)> {
        let ci = driver::confidence_interval(data.as_array(), level).map_err(stats_err)?;
        Ok((ci.mean, ci.lower, ci.upper))
    }

    /// Python module definition
    #[pymodule]
    fn traveling_network_rust(_py: Python, m: &PyModule) -> PyResult<()> {
        crate::logging::init();
        m.add_class::<PyTravelingNetwork>()?;
        m.add_function(wrap_pyfunction!(run_once, m)?)?;
        m.add_function(wrap_pyfunction!(run_trials, m)?)?;
        m.add_function(wrap_pyfunction!(solve_n1_scaled, m)?)?;
        m.add_function(wrap_pyfunction!(compute_confidence_interval, m)?)?;
        Ok(())
    }
}
