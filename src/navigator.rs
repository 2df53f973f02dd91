//! Drill-down navigation over one loaded dataset.
//!
//! A [`Navigator`] is constructed per dataset and owned by the caller. Its
//! position is a `(node, path)` frame; `drill_to` pushes the previous frame onto
//! a back-stack, `go_back` pops it, `reset` clears it and returns to the root.

use indextree::NodeId;
use std::sync::Arc;
use tracing::debug;

use crate::aggregate::{percentage_share, total_for, UNAVAILABLE};
use crate::dataset::Dataset;
use crate::error::NavigationError;
use crate::format::{format_share, format_total};
use crate::index::SearchEntry;

/// A position in the tree: the centered node and the names leading to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationFrame {
    pub node: NodeId,
    pub path: Vec<String>,
}

/// Root-to-node names joined with `/`, with a leading slash
pub fn path_string(path: &[String]) -> String {
    format!("/{}", path.join("/"))
}

/// Values shown in the details panel for a selected node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDetails {
    pub name: String,
    pub total: Option<f64>,
    pub parent_total: Option<f64>,
    pub path: Vec<String>,
    pub desc: String,
}

impl NodeDetails {
    pub fn title(&self) -> String {
        format!("Center: {}", self.name)
    }

    pub fn total_text(&self) -> String {
        format_total(self.total)
    }

    /// Share of the parent total, as a bare two-decimal number or the unavailable marker
    pub fn share(&self) -> String {
        percentage_share(self.total, self.parent_total)
    }

    pub fn share_text(&self) -> String {
        format_share(self.total, self.parent_total)
    }

    pub fn path_string(&self) -> String {
        path_string(&self.path)
    }

    pub fn desc_text(&self) -> &str {
        if self.desc.is_empty() {
            UNAVAILABLE
        } else {
            &self.desc
        }
    }
}

/// Outcome of clicking a node in the diagram
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub details: NodeDetails,
    /// Whether the click moved the center (only nodes with children are drilled into)
    pub drilled: bool,
}

pub struct Navigator {
    dataset: Arc<Dataset>,
    current: NavigationFrame,
    stack: Vec<NavigationFrame>,
}

impl Navigator {
    /// Start at the dataset root with an empty back-stack
    pub fn new(dataset: Arc<Dataset>) -> Self {
        let current = root_frame(&dataset);
        Self {
            dataset,
            current,
            stack: Vec::new(),
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn current(&self) -> &NavigationFrame {
        &self.current
    }

    /// Number of frames on the back-stack
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn can_go_back(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Walk from the root matching one name per level.
    ///
    /// The root name is prepended when the caller omitted it. Among siblings
    /// sharing a name, the first one wins.
    pub fn resolve_by_path<S: AsRef<str>>(
        &self,
        path: &[S],
    ) -> Result<NavigationFrame, NavigationError> {
        let tree = self.dataset.tree();
        let root = tree.root();
        let root_name = tree.name(root);

        let first = path.first().ok_or(NavigationError::EmptyPath)?;
        let rest = if first.as_ref() == root_name {
            &path[1..]
        } else {
            path
        };

        let mut node = root;
        let mut resolved = vec![root_name.to_string()];
        for segment in rest {
            let segment = segment.as_ref();
            node = tree
                .find_child(node, segment)
                .ok_or_else(|| NavigationError::PathNotFound {
                    segment: segment.to_string(),
                })?;
            resolved.push(segment.to_string());
        }

        Ok(NavigationFrame {
            node,
            path: resolved,
        })
    }

    /// Exact case-insensitive name match first, then the first substring match in pre-order
    pub fn resolve_by_query(&self, query: &str) -> Result<&SearchEntry, NavigationError> {
        self.dataset.index().lookup(query)
    }

    /// Push the current position and center on `node`
    pub fn drill_to(&mut self, node: NodeId, path: Vec<String>) {
        let next = NavigationFrame { node, path };
        let previous = std::mem::replace(&mut self.current, next);
        self.stack.push(previous);
        debug!(depth = self.stack.len(), path = %path_string(&self.current.path), "drilled");
    }

    /// Resolve a query and drill to the hit. State is unchanged on a miss.
    pub fn search(&mut self, query: &str) -> Result<NavigationFrame, NavigationError> {
        let entry = self.resolve_by_query(query)?;
        let frame = NavigationFrame {
            node: entry.node,
            path: entry.path.clone(),
        };
        self.drill_to(frame.node, frame.path.clone());
        Ok(frame)
    }

    /// Resolve a path and drill to it. State is unchanged on a miss.
    pub fn open_path<S: AsRef<str>>(
        &mut self,
        path: &[S],
    ) -> Result<NavigationFrame, NavigationError> {
        let frame = self.resolve_by_path(path)?;
        self.drill_to(frame.node, frame.path.clone());
        Ok(frame)
    }

    /// Pop the back-stack. Returns `false` when there is nowhere to go back to.
    pub fn go_back(&mut self) -> bool {
        match self.stack.pop() {
            Some(frame) => {
                self.current = frame;
                true
            }
            None => false,
        }
    }

    /// Clear the back-stack and return to the dataset root
    pub fn reset(&mut self) {
        self.stack.clear();
        self.current = root_frame(&self.dataset);
    }

    /// Details for `node`, with its share measured against `parent_total`
    pub fn details(
        &self,
        node: NodeId,
        path: Vec<String>,
        parent_total: Option<f64>,
    ) -> NodeDetails {
        let tree = self.dataset.tree();
        let (name, desc) = tree
            .node(node)
            .map(|n| (n.name.clone(), n.desc.clone()))
            .unwrap_or_default();
        NodeDetails {
            name,
            total: total_for(tree, node),
            parent_total,
            path,
            desc,
        }
    }

    /// Details of the current center; the center has no share
    pub fn current_details(&self) -> NodeDetails {
        self.details(self.current.node, self.current.path.clone(), None)
    }

    /// Select a clicked node and drill into it when it has children
    pub fn click(&mut self, node: NodeId, path: Vec<String>) -> Selection {
        let tree = self.dataset.tree();
        let parent_total = tree.parent(node).and_then(|p| total_for(tree, p));
        let details = self.details(node, path.clone(), parent_total);
        let drilled = tree.has_children(node);
        if drilled {
            self.drill_to(node, path);
        }
        Selection { details, drilled }
    }
}

fn root_frame(dataset: &Dataset) -> NavigationFrame {
    let root = dataset.tree().root();
    NavigationFrame {
        node: root,
        path: vec![dataset.root_name().to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetOrigin;
    use crate::sanitize::Sanitizer;
    use serde_json::json;

    fn navigator() -> Navigator {
        let raw = json!({
            "name": "Budget",
            "children": [
                { "name": "Finance", "desc": "Treasury", "children": [
                    { "name": "Customs", "value": 30 },
                    { "name": "Excise", "value": 10 }
                ]},
                { "name": "Education", "value": 60 },
                { "name": "Finance", "value": 1 }
            ]
        });
        let dataset =
            Dataset::from_value(&raw, &Sanitizer::default(), DatasetOrigin::Inline).unwrap();
        Navigator::new(Arc::new(dataset))
    }

    #[test]
    fn test_starts_at_root() {
        let nav = navigator();
        assert_eq!(nav.current().path, vec!["Budget"]);
        assert_eq!(nav.depth(), 0);
        assert!(!nav.can_go_back());
    }

    #[test]
    fn test_resolve_by_path_with_and_without_root() {
        let nav = navigator();
        let with_root = nav.resolve_by_path(&["Budget", "Finance", "Excise"]).unwrap();
        let without_root = nav.resolve_by_path(&["Finance", "Excise"]).unwrap();
        assert_eq!(with_root, without_root);
        assert_eq!(with_root.path, vec!["Budget", "Finance", "Excise"]);

        // first sibling named "Finance" is the one with children
        let finance = nav.resolve_by_path(&["Finance"]).unwrap();
        assert!(nav.dataset().tree().has_children(finance.node));
    }

    #[test]
    fn test_resolve_by_path_misses() {
        let nav = navigator();
        assert_eq!(
            nav.resolve_by_path(&["Finance", "Lottery"]).unwrap_err(),
            NavigationError::PathNotFound {
                segment: "Lottery".to_string()
            }
        );
        let empty: [&str; 0] = [];
        assert_eq!(nav.resolve_by_path(&empty).unwrap_err(), NavigationError::EmptyPath);
    }

    #[test]
    fn test_drill_and_back_round_trip() {
        let mut nav = navigator();
        let before = nav.current().clone();
        let target = nav.resolve_by_path(&["Finance"]).unwrap();
        nav.drill_to(target.node, target.path.clone());
        assert_eq!(nav.current(), &target);
        assert_eq!(nav.depth(), 1);

        assert!(nav.go_back());
        assert_eq!(nav.current(), &before);
        assert!(!nav.go_back());
        assert_eq!(nav.current(), &before);
    }

    #[test]
    fn test_reset_clears_stack() {
        let mut nav = navigator();
        nav.open_path(&["Finance"]).unwrap();
        nav.open_path(&["Finance", "Customs"]).unwrap();
        assert_eq!(nav.depth(), 2);
        nav.reset();
        assert_eq!(nav.depth(), 0);
        assert_eq!(nav.current().path, vec!["Budget"]);
    }

    #[test]
    fn test_search_miss_leaves_state() {
        let mut nav = navigator();
        nav.open_path(&["Finance"]).unwrap();
        let before = nav.current().clone();
        assert!(nav.search("zzz-no-such-node").is_err());
        assert!(nav.search("  ").is_err());
        assert_eq!(nav.current(), &before);
        assert_eq!(nav.depth(), 1);
    }

    #[test]
    fn test_click_drills_only_into_branches() {
        let mut nav = navigator();
        let customs = nav.resolve_by_path(&["Finance", "Customs"]).unwrap();
        let selection = nav.click(customs.node, customs.path.clone());
        assert!(!selection.drilled);
        assert_eq!(selection.details.share(), "75.00");
        assert_eq!(nav.depth(), 0);

        let finance = nav.resolve_by_path(&["Finance"]).unwrap();
        let selection = nav.click(finance.node, finance.path.clone());
        assert!(selection.drilled);
        assert_eq!(selection.details.total, Some(40.0));
        assert_eq!(selection.details.share_text(), "39.60%");
        assert_eq!(nav.current(), &finance);
    }

    #[test]
    fn test_current_details() {
        let mut nav = navigator();
        nav.open_path(&["Finance"]).unwrap();
        let details = nav.current_details();
        assert_eq!(details.title(), "Center: Finance");
        assert_eq!(details.total_text(), "40 THB");
        assert_eq!(details.share_text(), "—");
        assert_eq!(details.path_string(), "/Budget/Finance");
        assert_eq!(details.desc_text(), "Treasury");
    }
}
