//! Property-based invariants for sanitizing, aggregation, indexing and navigation.

use budgetmap::aggregate::{count_nodes, percentage_share, total_for, UNAVAILABLE};
use budgetmap::{sanitize, BudgetTree, Dataset, DatasetOrigin, Navigator, Sanitizer, SearchIndex};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

// ── Strategy helpers ──────────────────────────────────────────────────

fn arb_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Ministry of Finance".to_string()),
        Just("Customs".to_string()),
        Just("Education".to_string()),
        "[a-z]{1,8}",
    ]
}

fn arb_raw_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!("")),
        Just(json!("n/a")),
        (-1_000_000i64..1_000_000).prop_map(|n| json!(n)),
        (-1000.0f64..1000.0).prop_map(|f| json!(f)),
        (0u32..100_000).prop_map(|n| json!(n.to_string())),
        any::<bool>().prop_map(Value::Bool),
    ]
}

fn arb_raw_tree() -> impl Strategy<Value = Value> {
    let leaf = (arb_name(), arb_raw_value())
        .prop_map(|(name, value)| json!({ "name": name, "value": value }));
    leaf.prop_recursive(4, 64, 6, |inner| {
        (
            arb_name(),
            arb_raw_value(),
            prop::collection::vec(inner, 0..6),
            any::<bool>(),
        )
            .prop_map(|(name, value, children, garbage_children)| {
                if garbage_children && children.is_empty() {
                    json!({ "name": name, "value": value, "children": "none", "desc": 0 })
                } else {
                    json!({ "name": name, "value": value, "children": children, "desc": name })
                }
            })
    })
}

fn all_nodes(tree: &BudgetTree) -> Vec<indextree::NodeId> {
    tree.root().descendants(tree.arena()).collect()
}

// ── Properties ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn sanitize_is_idempotent(raw in arb_raw_tree()) {
        let once = sanitize(&raw).unwrap();
        let twice = sanitize(&once.to_json()).unwrap();
        prop_assert_eq!(once.to_json(), twice.to_json());
    }

    #[test]
    fn sanitized_values_are_finite_or_none(raw in arb_raw_tree()) {
        let tree = sanitize(&raw).unwrap();
        for id in all_nodes(&tree) {
            let node = tree.node(id).unwrap();
            prop_assert!(node.value.map_or(true, f64::is_finite));
        }
    }

    #[test]
    fn explicit_value_is_the_total(raw in arb_raw_tree()) {
        let tree = sanitize(&raw).unwrap();
        for id in all_nodes(&tree) {
            if let Some(value) = tree.node(id).unwrap().value {
                prop_assert_eq!(total_for(&tree, id), Some(value));
            }
        }
    }

    #[test]
    fn derived_total_is_sum_of_children(raw in arb_raw_tree()) {
        let tree = sanitize(&raw).unwrap();
        for id in all_nodes(&tree) {
            if tree.node(id).unwrap().value.is_none() && tree.has_children(id) {
                let expected = tree
                    .children(id)
                    .map(|c| total_for(&tree, c).unwrap_or(0.0))
                    .fold(0.0, |acc, t| acc + t);
                prop_assert_eq!(total_for(&tree, id), Some(expected));
            }
        }
    }

    #[test]
    fn total_is_none_only_for_empty_leaves(raw in arb_raw_tree()) {
        let tree = sanitize(&raw).unwrap();
        for id in all_nodes(&tree) {
            let empty_leaf = tree.node(id).unwrap().value.is_none() && !tree.has_children(id);
            prop_assert_eq!(total_for(&tree, id).is_none(), empty_leaf);
        }
    }

    #[test]
    fn share_stays_within_bounds(value in 0.0f64..1e9, base in 1e-3f64..1e9) {
        let share: f64 = percentage_share(Some(value), Some(base)).parse().unwrap();
        let exact = value / base * 100.0;
        prop_assert!(share >= 0.0);
        prop_assert!((share - exact).abs() <= 0.005 + exact * 1e-12);
    }

    #[test]
    fn share_without_base_is_unavailable(value in proptest::option::of(-1e6f64..1e6)) {
        prop_assert_eq!(percentage_share(value, Some(0.0)), UNAVAILABLE);
        prop_assert_eq!(percentage_share(value, None), UNAVAILABLE);
    }

    #[test]
    fn index_covers_every_node(raw in arb_raw_tree()) {
        let tree = sanitize(&raw).unwrap();
        let index = SearchIndex::build(&tree);
        prop_assert_eq!(index.len(), count_nodes(&tree, tree.root()));
        for entry in index.entries() {
            prop_assert_eq!(&tree.path_of(entry.node), &entry.path);
            prop_assert_eq!(entry.total, total_for(&tree, entry.node));
        }
    }

    #[test]
    fn drill_then_back_restores_position(
        raw in arb_raw_tree(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..5),
    ) {
        let dataset = Dataset::from_value(&raw, &Sanitizer::default(), DatasetOrigin::Inline).unwrap();
        let entries: Vec<_> = dataset.index().entries().to_vec();
        let mut nav = Navigator::new(Arc::new(dataset));

        for pick in picks {
            let entry = pick.get(&entries);
            let before = nav.current().clone();
            let depth = nav.depth();
            nav.drill_to(entry.node, entry.path.clone());
            prop_assert_eq!(nav.depth(), depth + 1);
            prop_assert!(nav.go_back());
            prop_assert_eq!(nav.current(), &before);
            prop_assert_eq!(nav.depth(), depth);
            // leave the navigator somewhere new for the next round
            nav.drill_to(entry.node, entry.path.clone());
        }

        nav.reset();
        prop_assert_eq!(nav.depth(), 0);
        prop_assert_eq!(nav.current().node, nav.dataset().tree().root());
    }
}
