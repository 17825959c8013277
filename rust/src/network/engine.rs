//! Gillespie engine for the traveling network.
//!
//! One call to `step` is one jump of the continuous-time Markov chain:
//! - classify leaves into free and retracting populations
//! - compute propensities (with adaptive switch rate)
//! - draw the holding time dt ~ Exp(lam) and advance the clock
//! - pick the event by roulette wheel and apply it to the tree
//!
//! The engine owns its RNG; the same seed reproduces the same trajectory.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use super::config::NetworkConfig;
use super::rates::{EventKind, RateModel};
use super::snapshot::{Snapshot, StepDelta};
use crate::error::NetworkError;
use crate::tree::{NodeId, NodeState, Tree};

/// Tolerance for the cached total length against a fresh sum.
const LENGTH_TOLERANCE: f64 = 1e-6;

/// Result of a single `step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// An event fired on `node`.
    Fired { kind: EventKind, node: NodeId },
    /// Total propensity is zero; nothing changed.
    Absorbed,
}

impl StepOutcome {
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            StepOutcome::Fired { kind, .. } => Some(*kind),
            StepOutcome::Absorbed => None,
        }
    }
}

/// Stochastic branching/retracting tree.
#[derive(Clone, Debug)]
pub struct TravelingNetwork {
    config: NetworkConfig,
    rates: RateModel,
    tree: Tree,
    rng: StdRng,
    time: f64,
    total_length: f64,
    delta: StepDelta,
    events: u64,
}

impl TravelingNetwork {
    /// Root at the origin with a single free leaf one increment away at angle 0.
    pub fn new(config: NetworkConfig) -> Result<Self, NetworkError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut tree = Tree::with_root();
        let leaf = tree.attach_child(tree.root(), config.length_increment, 0.0)?;
        let total_length = tree.total_length();

        debug!(
            target_length = config.target_length,
            k_b = config.branch_rate,
            k_g = config.growth_rate,
            k_s = config.base_switch_rate(),
            k_r = config.retract_rate,
            seed = ?config.seed,
            "initialized traveling network"
        );

        Ok(Self {
            rates: RateModel::from_config(&config),
            config,
            tree,
            rng,
            time: 0.0,
            total_length,
            delta: StepDelta {
                added: vec![leaf],
                removed: Vec::new(),
            },
            events: 0,
        })
    }

    /// Advance the chain by one event.
    pub fn step(&mut self) -> Result<StepOutcome, NetworkError> {
        self.delta.clear();
        let free = self.tree.leaves(NodeState::Free);
        let retracting = self.tree.leaves(NodeState::Retract);
        self.total_length = self.tree.total_length();

        let propensities = self
            .rates
            .propensities(self.total_length, free.len(), retracting.len());
        if propensities.is_absorbing() {
            return Ok(StepOutcome::Absorbed);
        }

        let lam = propensities.total();
        // Inversion on (0, 1] keeps dt finite.
        let u: f64 = self.rng.gen();
        self.time += -(1.0 - u).ln() / lam;

        let r = self.rng.gen::<f64>() * lam;
        let selection = propensities.select(r).ok_or_else(|| {
            NetworkError::Invariant(format!("draw {r} fell outside total propensity {lam}"))
        })?;

        let node = if selection.kind.is_free_event() {
            if free.is_empty() {
                return Err(NetworkError::Invariant(
                    "free event selected without free leaves".to_string(),
                ));
            }
            free[self.rng.gen_range(0..free.len())]
        } else {
            let idx = propensities.retract_index(selection.offset, retracting.len());
            *retracting.get(idx).ok_or_else(|| {
                NetworkError::Invariant(format!("retract index {idx} out of range"))
            })?
        };

        match selection.kind {
            EventKind::Branch => self.branch(node)?,
            EventKind::Grow => self.grow(node)?,
            EventKind::Switch => self.switch(node)?,
            EventKind::Retract => self.retract(node)?,
        }
        self.total_length = self.tree.total_length();
        self.events += 1;

        trace!(
            time = self.time,
            event = selection.kind.as_key(),
            node = node.0,
            total_length = self.total_length,
            "event"
        );

        Ok(StepOutcome::Fired { kind: selection.kind, node })
    }

    /// Extend the node's incoming edge by one increment.
    fn grow(&mut self, node: NodeId) -> Result<(), NetworkError> {
        if self.tree.node(node)?.edge_from_parent.is_none() {
            return Ok(());
        }
        self.tree.adjust_length(node, self.config.length_increment)?;
        Ok(())
    }

    /// Split a leaf into two children at base_angle ± alpha/2.
    fn branch(&mut self, node: NodeId) -> Result<(), NetworkError> {
        let base_angle = self.tree.incoming_edge(node)?.map_or(0.0, |e| e.angle);

        for sign in [-0.5, 0.5] {
            let child = self.tree.attach_child(
                node,
                self.config.length_increment,
                base_angle + sign * self.config.branch_angle,
            )?;
            self.delta.added.push(child);
        }
        Ok(())
    }

    fn switch(&mut self, node: NodeId) -> Result<(), NetworkError> {
        self.tree.node_mut(node)?.state = NodeState::Retract;
        Ok(())
    }

    /// Shorten the node's incoming edge; prune node and edge once it is gone.
    ///
    /// The root never retracts; targeting it just frees it again.
    fn retract(&mut self, node: NodeId) -> Result<(), NetworkError> {
        let target = self.tree.node_mut(node)?;
        if target.is_root() {
            target.state = NodeState::Free;
            return Ok(());
        }

        let length = self.tree.adjust_length(node, -self.config.length_increment)?;
        if length <= 0.0 {
            let detached = self.tree.detach_leaf(node)?;
            self.delta.removed.push(detached.node);
            if detached.parent_became_leaf {
                trace!(parent = detached.parent.0, "parent became a retracting leaf");
            }
        }
        Ok(())
    }

    /// Current aggregate statistics.
    pub fn snapshot(&self) -> Snapshot {
        let edge_count = self.tree.edge_count();
        let mut free_leaves = 0;
        let mut retract_leaves = 0;
        for node in self.tree.nodes().filter(|n| n.is_leaf) {
            match node.state {
                NodeState::Free => free_leaves += 1,
                NodeState::Retract => retract_leaves += 1,
                NodeState::Internal => {}
            }
        }

        Snapshot {
            time: self.time,
            mean_edge_length: if edge_count > 0 {
                self.total_length / edge_count as f64
            } else {
                0.0
            },
            edge_count,
            free_leaves,
            retract_leaves,
            total_length: self.total_length,
        }
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[inline]
    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    /// Number of events fired so far (absorbed steps excluded).
    #[inline]
    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Nodes added/removed by the most recent event.
    pub fn last_delta(&self) -> &StepDelta {
        &self.delta
    }

    /// Structural invariants plus the cached total length.
    pub fn check_invariants(&self) -> Result<(), NetworkError> {
        self.tree.check_invariants()?;
        let exact = self.tree.total_length();
        if (exact - self.total_length).abs() > LENGTH_TOLERANCE {
            return Err(NetworkError::Invariant(format!(
                "cached total length {} differs from edge sum {}",
                self.total_length, exact
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn config(k_b: f64, k_g: f64, k_r: f64, seed: u64) -> NetworkConfig {
        NetworkConfig {
            target_length: 10.0,
            branch_rate: k_b,
            growth_rate: k_g,
            retract_rate: k_r,
            switch_rate: None,
            branch_angle: PI / 3.0,
            length_increment: 1.0,
            seed: Some(seed),
        }
    }

    #[test]
    fn test_initial_state() {
        let net = TravelingNetwork::new(config(0.1, 0.2, 1.0, 1)).unwrap();
        let snap = net.snapshot();

        assert_eq!(net.tree().node_count(), 2);
        assert_eq!(snap.edge_count, 1);
        assert_eq!(snap.free_leaves, 1);
        assert_eq!(snap.retract_leaves, 0);
        assert_eq!(snap.mean_edge_length, 1.0);
        assert_eq!(snap.time, 0.0);
        let root = net.tree().node(net.tree().root()).unwrap();
        assert_eq!(root.state, NodeState::Internal);
        assert_eq!((root.x, root.y), (0.0, 0.0));
        net.check_invariants().unwrap();
    }

    #[test]
    fn test_rejects_invalid_config() {
        let bad = NetworkConfig { target_length: -1.0, ..config(0.1, 0.1, 1.0, 1) };
        assert!(matches!(TravelingNetwork::new(bad), Err(NetworkError::Config(_))));
    }

    #[test]
    fn test_single_branch() {
        let cfg = config(0.1, 0.0, 0.0, 7).with_switch_rate(0.0);
        let mut net = TravelingNetwork::new(cfg).unwrap();
        let leaf = net.tree().leaves(NodeState::Free)[0];

        let outcome = net.step().unwrap();
        assert_eq!(outcome, StepOutcome::Fired { kind: EventKind::Branch, node: leaf });
        assert!(net.time() > 0.0);

        let tree = net.tree();
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.edge_count(), 3);
        let branched = tree.node(leaf).unwrap();
        assert!(!branched.is_leaf);
        assert_eq!(branched.state, NodeState::Internal);

        let children = branched.children.clone();
        assert_eq!(children.len(), 2);
        assert_eq!(net.last_delta().added, children);
        let mut angles: Vec<f64> = children
            .iter()
            .map(|&c| tree.incoming_edge(c).unwrap().unwrap().angle)
            .collect();
        angles.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((angles[0] + PI / 6.0).abs() < 1e-12);
        assert!((angles[1] - PI / 6.0).abs() < 1e-12);
        for &c in &children {
            let child = tree.node(c).unwrap();
            assert!(child.is_leaf);
            assert_eq!(child.state, NodeState::Free);
        }

        assert_eq!(net.snapshot().free_leaves, 2);
        assert!((net.total_length() - 3.0).abs() < 1e-12);
        net.check_invariants().unwrap();
    }

    #[test]
    fn test_grow_moves_tip() {
        let cfg = config(0.0, 1.0, 0.0, 3).with_switch_rate(0.0);
        let mut net = TravelingNetwork::new(cfg).unwrap();
        let leaf = net.tree().leaves(NodeState::Free)[0];

        for _ in 0..4 {
            assert_eq!(net.step().unwrap().kind(), Some(EventKind::Grow));
        }
        let node = net.tree().node(leaf).unwrap();
        assert!((node.x - 5.0).abs() < 1e-12);
        assert!(node.y.abs() < 1e-12);
        assert_eq!(net.snapshot().mean_edge_length, 5.0);
        assert!(net.last_delta().is_empty());
    }

    #[test]
    fn test_retract_prunes_and_promotes_parent() {
        let cfg = config(0.0, 0.0, 1.0, 11).with_switch_rate(0.0);
        let mut net = TravelingNetwork::new(cfg).unwrap();
        let root = net.tree().root();
        let leaf = net.tree().leaves(NodeState::Free)[0];
        net.tree.node_mut(leaf).unwrap().state = NodeState::Retract;

        let outcome = net.step().unwrap();
        assert_eq!(outcome, StepOutcome::Fired { kind: EventKind::Retract, node: leaf });
        assert!(!net.tree().contains(leaf));
        assert_eq!(net.tree().edge_count(), 0);
        assert_eq!(net.last_delta().removed, vec![leaf]);

        let parent = net.tree().node(root).unwrap();
        assert!(parent.is_leaf);
        assert_eq!(parent.state, NodeState::Retract);
        assert_eq!(net.snapshot().retract_leaves, 1);
        assert_eq!(net.snapshot().mean_edge_length, 0.0);
        net.check_invariants().unwrap();
    }

    #[test]
    fn test_root_is_protected_then_absorbing() {
        let cfg = config(0.0, 0.0, 1.0, 5).with_switch_rate(0.0);
        let mut net = TravelingNetwork::new(cfg).unwrap();
        let leaf = net.tree().leaves(NodeState::Free)[0];
        net.tree.node_mut(leaf).unwrap().state = NodeState::Retract;

        net.step().unwrap();
        let outcome = net.step().unwrap();
        let root = net.tree().root();
        assert_eq!(outcome, StepOutcome::Fired { kind: EventKind::Retract, node: root });
        assert_eq!(net.tree().node(root).unwrap().state, NodeState::Free);

        // Only free-leaf rates remain and they are all zero.
        let before = net.snapshot();
        for _ in 0..10 {
            assert_eq!(net.step().unwrap(), StepOutcome::Absorbed);
        }
        assert_eq!(net.snapshot(), before);
        assert_eq!(net.tree().node_count(), 1);
    }

    #[test]
    fn test_multi_step_retraction() {
        let cfg = config(0.0, 1.0, 0.0, 9).with_switch_rate(0.0);
        let mut net = TravelingNetwork::new(cfg).unwrap();
        let leaf = net.tree().leaves(NodeState::Free)[0];
        net.step().unwrap();
        net.step().unwrap();
        assert!((net.total_length() - 3.0).abs() < 1e-12);

        net.rates.growth_rate = 0.0;
        net.rates.retract_rate = 1.0;
        net.tree.node_mut(leaf).unwrap().state = NodeState::Retract;

        net.step().unwrap();
        net.step().unwrap();
        assert!(net.tree().contains(leaf));
        assert!((net.total_length() - 1.0).abs() < 1e-12);
        net.step().unwrap();
        assert!(!net.tree().contains(leaf));
        assert_eq!(net.total_length(), 0.0);
    }

    #[test]
    fn test_retract_picks_leaf_by_offset() {
        let k_r = 0.7;
        let mut picked = [false; 3];

        for seed in 0..32 {
            let cfg = config(0.0, 0.0, k_r, seed).with_switch_rate(0.0);
            let mut net = TravelingNetwork::new(cfg).unwrap();
            let tip = net.tree().leaves(NodeState::Free)[0];
            for angle in [-0.5, 0.0, 0.5] {
                let child = net.tree.attach_child(tip, 1.0, angle).unwrap();
                net.tree.node_mut(child).unwrap().state = NodeState::Retract;
            }
            let retracting = net.tree().leaves(NodeState::Retract);
            assert_eq!(retracting.len(), 3);

            // Replay the step's two draws: holding time, then roulette.
            let propensities = net.rates.propensities(net.tree().total_length(), 0, 3);
            let lam = propensities.total();
            let mut rng = net.rng.clone();
            let _holding: f64 = rng.gen();
            let r = rng.gen::<f64>() * lam;
            let selection = propensities.select(r).unwrap();
            assert_eq!(selection.kind, EventKind::Retract);
            let idx = ((selection.offset / k_r).floor() as usize).min(2);

            let outcome = net.step().unwrap();
            assert_eq!(
                outcome,
                StepOutcome::Fired { kind: EventKind::Retract, node: retracting[idx] }
            );
            assert!(!net.tree().contains(retracting[idx]));
            assert_eq!(net.tree().leaves(NodeState::Retract).len(), 2);
            picked[idx] = true;
        }
        assert_eq!(picked, [true; 3]);
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let mut a = TravelingNetwork::new(config(0.1, 0.3, 1.0, 42)).unwrap();
        let mut b = TravelingNetwork::new(config(0.1, 0.3, 1.0, 42)).unwrap();

        for _ in 0..2_000 {
            assert_eq!(a.step().unwrap(), b.step().unwrap());
            assert_eq!(a.snapshot(), b.snapshot());
        }
    }

    #[test]
    fn test_invariants_hold_over_long_run() {
        let mut net = TravelingNetwork::new(config(0.1, 0.3, 1.0, 2024)).unwrap();
        let mut last_time = 0.0;
        for _ in 0..5_000 {
            net.step().unwrap();
            net.check_invariants().unwrap();
            assert!(net.time() >= last_time);
            last_time = net.time();
        }
        assert!(net.tree().contains(net.tree().root()));
    }

    #[test]
    fn test_unseeded_engine_runs() {
        let cfg = NetworkConfig { seed: None, ..config(0.1, 0.3, 1.0, 0) };
        let mut net = TravelingNetwork::new(cfg).unwrap();
        for _ in 0..100 {
            net.step().unwrap();
        }
        net.check_invariants().unwrap();
    }
}
