//! Parameters of a traveling network run.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a single engine instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Target total edge length S.
    pub target_length: f64,
    /// Branching rate per free leaf (k_b).
    pub branch_rate: f64,
    /// Growth rate per free leaf (k_g).
    pub growth_rate: f64,
    /// Retraction rate per retracting leaf (k_r).
    pub retract_rate: f64,
    /// Free -> retract switching rate (k_s). `None` means k_s = k_b, the
    /// size-conserving choice.
    pub switch_rate: Option<f64>,
    /// Full opening angle between two sibling branches (alpha), radians.
    pub branch_angle: f64,
    /// Unit length increment dL.
    pub length_increment: f64,
    /// RNG seed; `None` draws one from OS entropy.
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            target_length: 200.0,
            branch_rate: 0.05,
            growth_rate: 0.25,
            retract_rate: 1.0,
            switch_rate: None,
            branch_angle: PI / 3.0,
            length_increment: 1.0,
            seed: None,
        }
    }
}

impl NetworkConfig {
    /// Create a configuration with the given rates, k_s = k_b.
    pub fn new(
        target_length: f64,
        branch_rate: f64,
        growth_rate: f64,
        retract_rate: f64,
        branch_angle: f64,
        length_increment: f64,
        seed: Option<u64>,
    ) -> Self {
        Self {
            target_length,
            branch_rate,
            growth_rate,
            retract_rate,
            switch_rate: None,
            branch_angle,
            length_increment,
            seed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_switch_rate(mut self, switch_rate: f64) -> Self {
        self.switch_rate = Some(switch_rate);
        self
    }

    /// Base switching rate before size control.
    #[inline]
    pub fn base_switch_rate(&self) -> f64 {
        self.switch_rate.unwrap_or(self.branch_rate)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [
            ("target_length", self.target_length),
            ("branch_rate", self.branch_rate),
            ("growth_rate", self.growth_rate),
            ("retract_rate", self.retract_rate),
            ("switch_rate", self.base_switch_rate()),
            ("branch_angle", self.branch_angle),
            ("length_increment", self.length_increment),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }

        if self.target_length <= 0.0 {
            return Err(ConfigError::NonPositiveTarget(self.target_length));
        }

        let rates = [
            ("branch_rate", self.branch_rate),
            ("growth_rate", self.growth_rate),
            ("retract_rate", self.retract_rate),
            ("switch_rate", self.base_switch_rate()),
        ];
        for (name, value) in rates {
            if value < 0.0 {
                return Err(ConfigError::NegativeRate { name, value });
            }
        }

        if self.length_increment <= 0.0 {
            return Err(ConfigError::NonPositiveIncrement(self.length_increment));
        }

        Ok(())
    }
}
