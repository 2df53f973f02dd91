use indextree::NodeId;
use std::collections::HashMap;

use crate::tree::BudgetTree;

/// Marker returned when a share cannot be computed.
pub const UNAVAILABLE: &str = "—";

/// Total for a node: its explicit value, otherwise the sum of its children's totals.
///
/// A child without a total contributes 0. The result is `None` only for a leaf
/// without an explicit value.
pub fn total_for(tree: &BudgetTree, id: NodeId) -> Option<f64> {
    let node = tree.node(id)?;
    if let Some(value) = node.value {
        return Some(value);
    }
    if !tree.has_children(id) {
        return None;
    }
    Some(
        tree.children(id)
            .map(|child| total_for(tree, child).unwrap_or(0.0))
            .sum(),
    )
}

/// `value / base * 100` with two decimals, or [`UNAVAILABLE`] when the base is
/// zero or missing, or either side is not finite (a sum can overflow).
pub fn percentage_share(value: Option<f64>, base: Option<f64>) -> String {
    match (value, base) {
        (Some(value), Some(base)) if base != 0.0 && value.is_finite() && base.is_finite() => {
            format!("{:.2}", value / base * 100.0)
        }
        _ => UNAVAILABLE.to_string(),
    }
}

/// A childless node counts as one leaf
pub fn count_leaves(tree: &BudgetTree, id: NodeId) -> usize {
    if !tree.has_children(id) {
        return 1;
    }
    tree.children(id).map(|child| count_leaves(tree, child)).sum()
}

/// The node itself plus all descendants
pub fn count_nodes(tree: &BudgetTree, id: NodeId) -> usize {
    id.descendants(tree.arena()).count()
}

/// Totals for every node, computed bottom-up in a single pass.
#[derive(Debug, Clone, Default)]
pub struct Totals {
    by_node: HashMap<NodeId, Option<f64>>,
}

impl Totals {
    pub fn compute(tree: &BudgetTree) -> Self {
        let mut totals = Self::default();
        totals.compute_recursive(tree, tree.root());
        totals
    }

    fn compute_recursive(&mut self, tree: &BudgetTree, id: NodeId) -> Option<f64> {
        // Collect children first so every descendant gets an entry
        let children: Vec<NodeId> = tree.children(id).collect();
        let mut sum = 0.0;
        for child in &children {
            sum += self.compute_recursive(tree, *child).unwrap_or(0.0);
        }

        let explicit = tree.node(id).and_then(|n| n.value);
        let total = match explicit {
            Some(value) => Some(value),
            None if children.is_empty() => None,
            None => Some(sum),
        };
        self.by_node.insert(id, total);
        total
    }

    pub fn get(&self, id: NodeId) -> Option<f64> {
        self.by_node.get(&id).copied().flatten()
    }
}
