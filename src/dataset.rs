use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::aggregate::{count_leaves, count_nodes, total_for};
use crate::error::LoadError;
use crate::index::SearchIndex;
use crate::sanitize::Sanitizer;
use crate::tree::{BudgetTree, Meta};

/// Where a dataset came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetOrigin {
    /// The configured default file
    Default(PathBuf),
    /// Built-in demo set used when the default file is unavailable
    Demo,
    /// A file chosen by the user
    File(PathBuf),
    /// JSON handed over in memory
    Inline,
}

impl fmt::Display for DatasetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetOrigin::Default(path) => write!(f, "default ({})", path.display()),
            DatasetOrigin::Demo => write!(f, "built-in demo"),
            DatasetOrigin::File(path) => write!(f, "{}", path.display()),
            DatasetOrigin::Inline => write!(f, "inline"),
        }
    }
}

/// A loaded dataset: canonical tree plus its search index.
///
/// Both halves are built together and never mutated afterwards; a new load
/// produces a new `Dataset`.
#[derive(Debug, Clone)]
pub struct Dataset {
    tree: BudgetTree,
    index: SearchIndex,
    origin: DatasetOrigin,
}

/// Size and total overview of a dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub origin: String,
    pub node_count: usize,
    pub leaf_count: usize,
    pub total: Option<f64>,
    pub meta: Option<Meta>,
}

impl Dataset {
    pub fn from_tree(tree: BudgetTree, origin: DatasetOrigin) -> Self {
        let index = SearchIndex::build(&tree);
        Self {
            tree,
            index,
            origin,
        }
    }

    pub fn from_value(
        raw: &Value,
        sanitizer: &Sanitizer,
        origin: DatasetOrigin,
    ) -> Result<Self, LoadError> {
        let tree = sanitizer.sanitize(raw)?;
        Ok(Self::from_tree(tree, origin))
    }

    /// Parse and sanitize a JSON document in one step.
    pub fn from_json_str(
        text: &str,
        sanitizer: &Sanitizer,
        origin: DatasetOrigin,
    ) -> Result<Self, LoadError> {
        let raw: Value = serde_json::from_str(text)?;
        Self::from_value(&raw, sanitizer, origin)
    }

    pub fn from_path(path: &Path, sanitizer: &Sanitizer) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
        Self::from_json_str(&text, sanitizer, DatasetOrigin::File(path.to_path_buf()))
    }

    /// Built-in demo dataset, sanitized like any other source
    pub fn demo(sanitizer: &Sanitizer) -> Result<Self, LoadError> {
        Self::from_value(&demo_json(), sanitizer, DatasetOrigin::Demo)
    }

    /// Load the default file, falling back to the demo set on any failure.
    ///
    /// Errors only when the demo set is rejected as well.
    pub fn load_default(path: &Path, sanitizer: &Sanitizer) -> Result<Self, LoadError> {
        match Self::from_path(path, sanitizer) {
            Ok(mut dataset) => {
                dataset.origin = DatasetOrigin::Default(path.to_path_buf());
                info!(path = %path.display(), nodes = dataset.index.len(), "loaded default dataset");
                Ok(dataset)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to load default dataset, using demo set");
                Self::demo(sanitizer)
            }
        }
    }

    pub fn tree(&self) -> &BudgetTree {
        &self.tree
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn origin(&self) -> &DatasetOrigin {
        &self.origin
    }

    pub fn root_name(&self) -> &str {
        self.tree.name(self.tree.root())
    }

    pub fn summary(&self) -> DatasetSummary {
        let root = self.tree.root();
        DatasetSummary {
            name: self.root_name().to_string(),
            origin: self.origin.to_string(),
            node_count: count_nodes(&self.tree, root),
            leaf_count: count_leaves(&self.tree, root),
            total: total_for(&self.tree, root),
            meta: self.tree.meta().cloned(),
        }
    }

    /// Canonical JSON, pretty-printed
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.tree.to_json())
    }
}

pub const DEMO_ROOT_NAME: &str = "Thailand National Budget (FY2025)";

fn demo_json() -> Value {
    json!({
        "name": DEMO_ROOT_NAME,
        "value": 0,
        "children": [
            { "name": "Ministry of Finance", "value": 0, "children": [
                { "name": "Customs Department", "value": 0 },
                { "name": "Excise Department", "value": 0 }
            ]},
            { "name": "Ministry of Education", "value": 0, "children": [] },
            { "name": "Ministry of Public Health", "value": 0, "children": [] },
            { "name": "Central Fund (งบกลาง)", "value": 0, "children": [] }
        ]
    })
}
