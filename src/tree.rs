use indextree::{Arena, NodeId};
use serde_json::{Map, Number, Value};

/// Opaque root metadata (fiscalYear, lastUpdated, source, ...), passed through unvalidated
pub type Meta = Map<String, Value>;

/// A canonical node in the budget tree
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetNode {
    pub name: String,
    /// Explicit allocation; `None` means "derive from children"
    pub value: Option<f64>,
    pub desc: String,
}

impl BudgetNode {
    pub fn new(name: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            name: name.into(),
            value,
            desc: String::new(),
        }
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }
}

/// Canonical budget hierarchy stored in an arena.
///
/// Children keep their insertion order. A tree is only ever produced by the
/// sanitizer (or built directly in tests) and is treated as read-only once a
/// dataset is installed.
#[derive(Debug, Clone)]
pub struct BudgetTree {
    arena: Arena<BudgetNode>,
    root: NodeId,
    meta: Option<Meta>,
}

impl BudgetTree {
    /// Create a new tree with a root node
    pub fn new(root: BudgetNode) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(root);
        Self {
            arena,
            root,
            meta: None,
        }
    }

    /// Append a node as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, node: BudgetNode) -> NodeId {
        let id = self.arena.new_node(node);
        parent.append(id, &mut self.arena);
        id
    }

    pub fn set_meta(&mut self, meta: Option<Meta>) {
        self.meta = meta;
    }

    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn arena(&self) -> &Arena<BudgetNode> {
        &self.arena
    }

    pub fn node(&self, id: NodeId) -> Option<&BudgetNode> {
        self.arena.get(id).map(|n| n.get())
    }

    pub fn name(&self, id: NodeId) -> &str {
        self.node(id).map(|n| n.name.as_str()).unwrap_or("")
    }

    /// Children of `id` in declaration order
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.children(id).next().is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|n| n.parent())
    }

    /// First child of `parent` whose name equals `name`
    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent).find(|&child| self.name(child) == name)
    }

    /// Names from the root down to `id`, inclusive
    pub fn path_of(&self, id: NodeId) -> Vec<String> {
        let mut path: Vec<String> = id
            .ancestors(&self.arena)
            .map(|a| self.name(a).to_string())
            .collect();
        path.reverse();
        path
    }

    /// Serialize back into the canonical JSON shape.
    ///
    /// Feeding the result to the sanitizer yields a structurally identical tree.
    pub fn to_json(&self) -> Value {
        let mut root = self.node_to_json(self.root);
        if let (Some(meta), Value::Object(obj)) = (&self.meta, &mut root) {
            obj.insert("meta".to_string(), Value::Object(meta.clone()));
        }
        root
    }

    fn node_to_json(&self, id: NodeId) -> Value {
        let mut obj = Map::new();
        if let Some(node) = self.node(id) {
            obj.insert("name".to_string(), Value::String(node.name.clone()));
            let value = node
                .value
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null);
            obj.insert("value".to_string(), value);
            obj.insert("desc".to_string(), Value::String(node.desc.clone()));
        }
        let children: Vec<Value> = self
            .children(id)
            .map(|child| self.node_to_json(child))
            .collect();
        obj.insert("children".to_string(), Value::Array(children));
        Value::Object(obj)
    }
}
