//! Event propensities with adaptive size control.
//!
//! Each free leaf carries three independent exponential clocks (branch,
//! grow, switch) and each retracting leaf one (retract). The switch clock is
//! biased by how far the network's total length sits from its target:
//!
//! ```text
//! k_s_eff = 1.2 k_s   if S_total > S + dL
//!         = 0.8 k_s   if S_total < S - dL
//!         = k_s       otherwise
//! ```

use serde::{Deserialize, Serialize};

use super::config::NetworkConfig;

/// Switch-rate multiplier when the network is too long.
pub const OVERSIZE_SWITCH_FACTOR: f64 = 1.2;
/// Switch-rate multiplier when the network is too short.
pub const UNDERSIZE_SWITCH_FACTOR: f64 = 0.8;

/// Leaf event types, in roulette-wheel selection order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Free leaf splits into two free children.
    Branch,
    /// Free leaf extends its incoming edge.
    Grow,
    /// Free leaf starts retracting.
    Switch,
    /// Retracting leaf shortens its incoming edge.
    Retract,
}

impl EventKind {
    pub const ORDER: [EventKind; 4] = [
        EventKind::Branch,
        EventKind::Grow,
        EventKind::Switch,
        EventKind::Retract,
    ];

    pub fn as_key(&self) -> &'static str {
        match self {
            EventKind::Branch => "branch",
            EventKind::Grow => "grow",
            EventKind::Switch => "switch",
            EventKind::Retract => "retract",
        }
    }

    /// Whether this event acts on a free leaf.
    #[inline]
    pub fn is_free_event(&self) -> bool {
        !matches!(self, EventKind::Retract)
    }
}

/// Per-leaf rates.
#[derive(Clone, Debug, PartialEq)]
pub struct RateModel {
    pub branch_rate: f64,
    pub growth_rate: f64,
    pub switch_rate: f64,
    pub retract_rate: f64,
    pub target_length: f64,
    pub length_increment: f64,
}

impl RateModel {
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            branch_rate: config.branch_rate,
            growth_rate: config.growth_rate,
            switch_rate: config.base_switch_rate(),
            retract_rate: config.retract_rate,
            target_length: config.target_length,
            length_increment: config.length_increment,
        }
    }

    /// Switching rate after size control.
    pub fn effective_switch_rate(&self, total_length: f64) -> f64 {
        if total_length > self.target_length + self.length_increment {
            self.switch_rate * OVERSIZE_SWITCH_FACTOR
        } else if total_length < self.target_length - self.length_increment {
            self.switch_rate * UNDERSIZE_SWITCH_FACTOR
        } else {
            self.switch_rate
        }
    }

    /// Aggregate propensities for the current leaf populations.
    pub fn propensities(&self, total_length: f64, n_free: usize, n_retract: usize) -> Propensities {
        let free = n_free as f64;
        let spans = [
            self.branch_rate * free,
            self.growth_rate * free,
            self.effective_switch_rate(total_length) * free,
            self.retract_rate * n_retract as f64,
        ];

        Propensities {
            spans,
            total: spans.iter().sum(),
            retract_rate: self.retract_rate,
        }
    }
}

/// Span of `[0, total)` owned by each event kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Propensities {
    spans: [f64; 4],
    total: f64,
    retract_rate: f64,
}

/// Outcome of the roulette-wheel draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection {
    pub kind: EventKind,
    /// Position of the draw inside the chosen span.
    pub offset: f64,
}

impl Propensities {
    /// Total propensity lam.
    #[inline]
    pub fn total(&self) -> f64 {
        self.total
    }

    #[inline]
    pub fn span(&self, kind: EventKind) -> f64 {
        self.spans[kind as usize]
    }

    /// No event can fire.
    #[inline]
    pub fn is_absorbing(&self) -> bool {
        self.total <= 0.0
    }

    /// Locate `r` in `[0, total)`; spans are tried in `EventKind::ORDER`.
    ///
    /// A draw that floating-point rounding pushes past the last non-empty
    /// span lands in that span.
    pub fn select(&self, r: f64) -> Option<Selection> {
        let mut cumulative = 0.0;
        let mut last = None;

        for kind in EventKind::ORDER {
            let span = self.span(kind);
            if span <= 0.0 {
                continue;
            }
            if r < cumulative + span {
                return Some(Selection { kind, offset: r - cumulative });
            }
            last = Some(Selection { kind, offset: span });
            cumulative += span;
        }

        last
    }

    /// Retract-leaf index addressed by an offset into the retract span.
    pub fn retract_index(&self, offset: f64, n_retract: usize) -> usize {
        let idx = (offset / self.retract_rate).floor() as usize;
        idx.min(n_retract.saturating_sub(1))
    }
}
