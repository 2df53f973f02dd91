use indextree::NodeId;
use tracing::debug;

use crate::aggregate::Totals;
use crate::error::NavigationError;
use crate::tree::BudgetTree;

/// One flattened node of the search index
#[derive(Debug, Clone, PartialEq)]
pub struct SearchEntry {
    pub name: String,
    /// Names from the root down to this node, inclusive
    pub path: Vec<String>,
    pub total: Option<f64>,
    /// Total of the immediate parent; `None` for the root entry
    pub parent_total: Option<f64>,
    pub node: NodeId,
}

/// Pre-order list of every node in a tree. Rebuilt wholesale, never patched.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    entries: Vec<SearchEntry>,
}

impl SearchIndex {
    pub fn build(tree: &BudgetTree) -> Self {
        let totals = Totals::compute(tree);
        let mut entries = Vec::new();
        let root = tree.root();
        collect(tree, &totals, root, vec![tree.name(root).to_string()], None, &mut entries);
        debug!(entries = entries.len(), "built search index");
        Self { entries }
    }

    pub fn entries(&self) -> &[SearchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive lookup: exact name match first, then the first substring
    /// match in pre-order.
    pub fn lookup(&self, query: &str) -> Result<&SearchEntry, NavigationError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(NavigationError::EmptyQuery);
        }

        let exact = self
            .entries
            .iter()
            .find(|e| e.name.to_lowercase() == needle);
        exact
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|e| e.name.to_lowercase().contains(&needle))
            })
            .ok_or_else(|| NavigationError::NotFound {
                query: query.trim().to_string(),
            })
    }

    /// Every entry whose name contains the query, in pre-order
    pub fn matches<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a SearchEntry> + 'a {
        let needle = query.trim().to_lowercase();
        self.entries
            .iter()
            .filter(move |e| !needle.is_empty() && e.name.to_lowercase().contains(&needle))
    }
}

fn collect(
    tree: &BudgetTree,
    totals: &Totals,
    id: NodeId,
    path: Vec<String>,
    parent_total: Option<f64>,
    out: &mut Vec<SearchEntry>,
) {
    let total = totals.get(id);
    out.push(SearchEntry {
        name: tree.name(id).to_string(),
        path: path.clone(),
        total,
        parent_total,
        node: id,
    });

    for child in tree.children(id) {
        let mut child_path = path.clone();
        child_path.push(tree.name(child).to_string());
        collect(tree, totals, child, child_path, total, out);
    }
}
