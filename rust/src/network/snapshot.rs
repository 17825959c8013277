//! Aggregate statistics read off the engine.

use serde::{Deserialize, Serialize};

use crate::tree::NodeId;

/// Point-in-time statistics of a network.
///
/// Serialized with the short keys used by the analysis scripts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time: f64,
    /// total_length / edge_count, 0 without edges.
    #[serde(rename = "L_bar")]
    pub mean_edge_length: f64,
    #[serde(rename = "NE")]
    pub edge_count: usize,
    #[serde(rename = "NF")]
    pub free_leaves: usize,
    #[serde(rename = "NR")]
    pub retract_leaves: usize,
    #[serde(rename = "S")]
    pub total_length: f64,
}

impl Snapshot {
    /// `[L_bar, NE, NF, NR]` as floats.
    pub fn observables(&self) -> [f64; 4] {
        [
            self.mean_edge_length,
            self.edge_count as f64,
            self.free_leaves as f64,
            self.retract_leaves as f64,
        ]
    }
}

/// Nodes created and destroyed by the most recent step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDelta {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl StepDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.added.clear();
        self.removed.clear();
    }
}

/// Per-key mean of a window of snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeanSnapshot {
    pub time: f64,
    #[serde(rename = "L_bar")]
    pub mean_edge_length: f64,
    #[serde(rename = "NE")]
    pub edge_count: f64,
    #[serde(rename = "NF")]
    pub free_leaves: f64,
    #[serde(rename = "NR")]
    pub retract_leaves: f64,
    #[serde(rename = "S")]
    pub total_length: f64,
}

impl MeanSnapshot {
    /// `[L_bar, NE, NF, NR]`.
    pub fn observables(&self) -> [f64; 4] {
        [
            self.mean_edge_length,
            self.edge_count,
            self.free_leaves,
            self.retract_leaves,
        ]
    }
}

/// Running sum over sampled snapshots.
#[derive(Clone, Debug, Default)]
pub struct SnapshotAccumulator {
    sums: [f64; 6],
    count: usize,
}

impl SnapshotAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, snapshot: &Snapshot) {
        let values = [
            snapshot.time,
            snapshot.mean_edge_length,
            snapshot.edge_count as f64,
            snapshot.free_leaves as f64,
            snapshot.retract_leaves as f64,
            snapshot.total_length,
        ];
        for (sum, value) in self.sums.iter_mut().zip(values) {
            *sum += value;
        }
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean of everything recorded, `None` before the first record.
    pub fn mean(&self) -> Option<MeanSnapshot> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let [time, l_bar, ne, nf, nr, s] = self.sums.map(|sum| sum / n);
        Some(MeanSnapshot {
            time,
            mean_edge_length: l_bar,
            edge_count: ne,
            free_leaves: nf,
            retract_leaves: nr,
            total_length: s,
        })
    }
}
