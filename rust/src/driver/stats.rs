//! Student-t confidence intervals over per-trial means.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::StatsError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    /// s / sqrt(n), with s the unbiased standard deviation.
    pub std_error: f64,
    pub level: f64,
    pub n: usize,
}

impl ConfidenceInterval {
    #[inline]
    pub fn half_width(&self) -> f64 {
        self.upper - self.mean
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Two-sided interval mean ± t_{(1+level)/2, n-1} · SE.
pub fn confidence_interval(
    data: ArrayView1<f64>,
    level: f64,
) -> Result<ConfidenceInterval, StatsError> {
    let n = data.len();
    if n < 2 {
        return Err(StatsError::TooFewSamples(n));
    }
    if !(level > 0.0 && level < 1.0) {
        return Err(StatsError::InvalidLevel(level));
    }

    let mean = data.mean().ok_or(StatsError::TooFewSamples(n))?;
    let std_error = data.std(1.0) / (n as f64).sqrt();

    let t = StudentsT::new(0.0, 1.0, (n - 1) as f64)?;
    let t_value = t.inverse_cdf(0.5 * (1.0 + level));

    Ok(ConfidenceInterval {
        mean,
        lower: mean - t_value * std_error,
        upper: mean + t_value * std_error,
        std_error,
        level,
        n,
    })
}

/// 95% interval.
pub fn confidence_interval_95(data: ArrayView1<f64>) -> Result<ConfidenceInterval, StatsError> {
    confidence_interval(data, 0.95)
}
