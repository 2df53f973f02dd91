//! Normalizes arbitrary JSON into a canonical [`BudgetTree`].
//!
//! Coercion rules per node:
//! - `value`: `""`, `null` or absent become `None`; numbers, numeric strings and
//!   booleans are coerced (blank text is 0, `0x`/`0o`/`0b` literals are read in
//!   their radix); anything that does not yield a finite number is `None`.
//! - `desc`: falsy values become `""`; strings are kept verbatim, other scalars are
//!   rendered as text.
//! - `children`: anything other than an array becomes empty; elements are
//!   sanitized recursively in order.

use indextree::NodeId;
use serde_json::Value;
use tracing::debug;

use crate::error::SanitizeError;
use crate::tree::{BudgetNode, BudgetTree};

/// Default nesting limit for incoming datasets.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Sanitizer with an explicit depth cap
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    max_depth: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Sanitizer {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Build a canonical tree from raw input. The input is never modified.
    pub fn sanitize(&self, raw: &Value) -> Result<BudgetTree, SanitizeError> {
        let Value::Object(obj) = raw else {
            return Err(SanitizeError::NotAnObject {
                found: json_kind(raw),
            });
        };

        let mut tree = BudgetTree::new(coerce_node(raw));
        let meta = obj.get("meta").and_then(Value::as_object).cloned();
        tree.set_meta(meta);

        let root = tree.root();
        self.append_children(&mut tree, root, raw, 1)?;
        debug!(max_depth = self.max_depth, "sanitized dataset");
        Ok(tree)
    }

    fn append_children(
        &self,
        tree: &mut BudgetTree,
        parent: NodeId,
        raw: &Value,
        depth: usize,
    ) -> Result<(), SanitizeError> {
        let Some(children) = raw.get("children").and_then(Value::as_array) else {
            return Ok(());
        };
        if children.is_empty() {
            return Ok(());
        }
        if depth >= self.max_depth {
            return Err(SanitizeError::TooDeep {
                limit: self.max_depth,
            });
        }

        for child in children {
            let id = tree.append_child(parent, coerce_node(child));
            self.append_children(tree, id, child, depth + 1)?;
        }
        Ok(())
    }
}

/// Sanitize with the default depth cap
pub fn sanitize(raw: &Value) -> Result<BudgetTree, SanitizeError> {
    Sanitizer::default().sanitize(raw)
}

/// Scalar fields of a single node; non-object input yields an empty node.
fn coerce_node(raw: &Value) -> BudgetNode {
    BudgetNode {
        name: coerce_name(raw.get("name")),
        value: coerce_value(raw.get("value")),
        desc: coerce_desc(raw.get("desc")),
    }
}

fn coerce_name(raw: Option<&Value>) -> String {
    match raw {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Coerce a raw `value` field to a finite number, or `None`.
pub fn coerce_value(raw: Option<&Value>) -> Option<f64> {
    let coerced = match raw? {
        Value::Null => return None,
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) if s.is_empty() => return None,
        Value::String(s) => parse_numeric(s)?,
        Value::Array(_) | Value::Object(_) => return None,
    };
    coerced.is_finite().then_some(coerced)
}

/// Numeric text: surrounding whitespace is ignored, blank text is 0, and unsigned
/// `0x`/`0o`/`0b` literals are read in their radix.
fn parse_numeric(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    let radix = match trimmed.get(..2).map(str::to_ascii_lowercase).as_deref() {
        Some("0x") => 16,
        Some("0o") => 8,
        Some("0b") => 2,
        _ => return trimmed.parse::<f64>().ok(),
    };
    let digits = &trimmed[2..];
    if digits.is_empty() {
        return None;
    }
    digits.chars().try_fold(0.0, |acc: f64, c| {
        c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
    })
}

fn coerce_desc(raw: Option<&Value>) -> String {
    match raw {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "true".to_string(),
        Some(Value::Number(n)) if n.as_f64().is_some_and(|f| f != 0.0) => n.to_string(),
        Some(v @ (Value::Array(_) | Value::Object(_))) => v.to_string(),
        _ => String::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
