//! Structural properties of the engine over random parameters and seeds.

use proptest::prelude::*;

use traveling_network_rust::network::{EventKind, NetworkConfig, StepOutcome, TravelingNetwork};
use traveling_network_rust::tree::NodeState;

fn arb_config() -> impl Strategy<Value = NetworkConfig> {
    (
        5.0f64..60.0,
        0.0f64..0.5,
        0.0f64..0.5,
        0.1f64..2.0,
        0.1f64..3.0,
        prop_oneof![Just(1.0f64), Just(0.5f64), Just(2.0f64)],
        any::<u64>(),
    )
        .prop_map(|(s, k_b, k_g, k_r, alpha, dl, seed)| {
            NetworkConfig::new(s, k_b, k_g, k_r, alpha, dl, Some(seed))
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn invariants_hold_after_every_step(config in arb_config(), steps in 1usize..400) {
        let mut network = TravelingNetwork::new(config).unwrap();
        let root = network.tree().root();
        let mut last_time = network.time();

        for _ in 0..steps {
            let outcome = network.step().unwrap();
            network.check_invariants().unwrap();

            let tree = network.tree();
            prop_assert!(tree.contains(root));
            prop_assert_eq!(tree.node_count(), tree.edge_count() + 1);
            if outcome == (StepOutcome::Fired { kind: EventKind::Retract, node: root }) {
                prop_assert_eq!(tree.node(root).unwrap().state, NodeState::Free);
            }
            for edge in tree.edges() {
                prop_assert!(edge.length >= 0.0);
                let child = tree.node(edge.child).unwrap();
                prop_assert_eq!(child.edge_from_parent, Some(edge.id));
            }
            for node in tree.nodes() {
                prop_assert_eq!(node.is_leaf, node.children.is_empty());
            }

            let exact: f64 = tree.edges().map(|e| e.length).sum();
            prop_assert!((exact - network.total_length()).abs() < 1e-9);
            prop_assert!(network.time() >= last_time);
            last_time = network.time();
        }
    }

    #[test]
    fn same_seed_gives_identical_snapshots(config in arb_config(), steps in 1usize..300) {
        let mut a = TravelingNetwork::new(config.clone()).unwrap();
        let mut b = TravelingNetwork::new(config).unwrap();

        for _ in 0..steps {
            let outcome_a = a.step().unwrap();
            let outcome_b = b.step().unwrap();
            prop_assert_eq!(outcome_a, outcome_b);
            prop_assert_eq!(a.snapshot(), b.snapshot());
            prop_assert_eq!(a.last_delta(), b.last_delta());
        }
    }

    #[test]
    fn mean_edge_length_matches_totals(config in arb_config(), steps in 1usize..300) {
        let mut network = TravelingNetwork::new(config).unwrap();
        for _ in 0..steps {
            network.step().unwrap();
        }
        let snap = network.snapshot();
        if snap.edge_count == 0 {
            prop_assert_eq!(snap.mean_edge_length, 0.0);
        } else {
            let expected = snap.total_length / snap.edge_count as f64;
            prop_assert!((snap.mean_edge_length - expected).abs() < 1e-12);
        }
        let tree = network.tree();
        prop_assert_eq!(snap.free_leaves, tree.leaves(NodeState::Free).len());
        prop_assert_eq!(snap.retract_leaves, tree.leaves(NodeState::Retract).len());
    }
}

#[test]
fn zero_propensity_is_absorbing() {
    let config = NetworkConfig {
        branch_rate: 0.0,
        growth_rate: 0.0,
        switch_rate: Some(0.0),
        seed: Some(1),
        ..Default::default()
    };
    let mut network = TravelingNetwork::new(config).unwrap();
    let before = network.snapshot();

    for _ in 0..100 {
        assert_eq!(network.step().unwrap(), StepOutcome::Absorbed);
    }
    assert_eq!(network.snapshot(), before);
    assert_eq!(network.time(), 0.0);
    assert_eq!(network.tree().node_count(), 2);
    assert_eq!(network.events(), 0);
}

#[test]
fn snapshot_serializes_with_fixed_keys() {
    let network = TravelingNetwork::new(NetworkConfig::default().with_seed(8)).unwrap();
    let value = serde_json::to_value(network.snapshot()).unwrap();
    let object = value.as_object().unwrap();

    for key in ["time", "L_bar", "NE", "NF", "NR"] {
        assert!(object.contains_key(key), "missing key {key}");
    }
    assert_eq!(object["NE"], 1);
    assert_eq!(object["NF"], 1);
}

#[test]
fn config_round_trips_through_json() {
    let json = r#"{"target_length": 50.0, "branch_rate": 0.2, "seed": 4}"#;
    let config: NetworkConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.target_length, 50.0);
    assert_eq!(config.branch_rate, 0.2);
    assert_eq!(config.base_switch_rate(), 0.2);
    assert_eq!(config.growth_rate, NetworkConfig::default().growth_rate);
    assert!(TravelingNetwork::new(config).is_ok());
}
