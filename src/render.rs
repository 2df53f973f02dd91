use indextree::NodeId;
use std::io::Write;

use crate::aggregate::Totals;
use crate::dataset::Dataset;
use crate::error::RenderError;
use crate::format::node_label;
use crate::navigator::NavigationFrame;

/// Default file name for an exported diagram image.
pub const EXPORT_FILE_NAME: &str = "th_budget_mindmap.png";

/// Levels expanded below the center when a view is first drawn.
pub const INITIAL_TREE_DEPTH: usize = 2;

/// What a renderer is asked to draw: a subtree rooted at the current center,
/// with precomputed totals for every node.
pub struct View<'a> {
    dataset: &'a Dataset,
    center: &'a NavigationFrame,
    totals: Totals,
}

impl<'a> View<'a> {
    pub fn new(dataset: &'a Dataset, center: &'a NavigationFrame) -> Self {
        Self {
            dataset,
            center,
            totals: Totals::compute(dataset.tree()),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        self.dataset
    }

    pub fn center(&self) -> &NavigationFrame {
        self.center
    }

    pub fn total(&self, id: NodeId) -> Option<f64> {
        self.totals.get(id)
    }

    /// Label for a node; the center's share is measured against the center itself
    pub fn label(&self, id: NodeId) -> String {
        let tree = self.dataset.tree();
        let parent_total = if id == self.center.node {
            self.total(id)
        } else {
            tree.parent(id).and_then(|p| self.total(p))
        };
        node_label(tree.name(id), self.total(id), parent_total)
    }
}

/// Collaborator that turns a view into pixels (or text)
pub trait Renderer {
    fn render(&mut self, view: &View<'_>) -> Result<(), RenderError>;

    /// Rasterize the current view at `scale` times its on-screen size
    fn export_image(&mut self, _view: &View<'_>, _scale: f32) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::ExportUnsupported)
    }
}

/// Indented text outline of the centered subtree
pub struct OutlineRenderer<W: Write> {
    out: W,
    max_depth: usize,
}

impl<W: Write> OutlineRenderer<W> {
    pub fn new(out: W, max_depth: usize) -> Self {
        Self { out, max_depth }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_node(&mut self, view: &View<'_>, id: NodeId, depth: usize) -> Result<(), RenderError> {
        let tree = view.dataset().tree();
        let branch = if tree.has_children(id) && depth == self.max_depth {
            " …"
        } else {
            ""
        };
        writeln!(self.out, "{}{}{}", "  ".repeat(depth), view.label(id), branch)?;
        if depth < self.max_depth {
            let children: Vec<NodeId> = tree.children(id).collect();
            for child in children {
                self.write_node(view, child, depth + 1)?;
            }
        }
        Ok(())
    }
}

impl<W: Write> Renderer for OutlineRenderer<W> {
    fn render(&mut self, view: &View<'_>) -> Result<(), RenderError> {
        self.write_node(view, view.center().node, 0)?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetOrigin;
    use crate::navigator::Navigator;
    use crate::sanitize::Sanitizer;
    use serde_json::json;
    use std::sync::Arc;

    fn navigator() -> Navigator {
        let raw = json!({
            "name": "Budget",
            "children": [
                { "name": "Finance", "children": [
                    { "name": "Customs", "value": 300 },
                    { "name": "Excise", "value": 100 }
                ]},
                { "name": "Reserve", "value": 0 }
            ]
        });
        let dataset =
            Dataset::from_value(&raw, &Sanitizer::default(), DatasetOrigin::Inline).unwrap();
        Navigator::new(Arc::new(dataset))
    }

    #[test]
    fn test_outline_from_root() {
        let nav = navigator();
        let view = View::new(nav.dataset(), nav.current());
        let mut renderer = OutlineRenderer::new(Vec::new(), 1);
        renderer.render(&view).unwrap();
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(
            text,
            "Budget • 400 (100.00%)\n  Finance • 400 (100.00%) …\n  Reserve\n"
        );
    }

    #[test]
    fn test_outline_from_drilled_center() {
        let mut nav = navigator();
        nav.open_path(&["Finance"]).unwrap();
        let view = View::new(nav.dataset(), nav.current());
        let mut renderer = OutlineRenderer::new(Vec::new(), INITIAL_TREE_DEPTH);
        renderer.render(&view).unwrap();
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(
            text,
            "Finance • 400 (100.00%)\n  Customs • 300 (75.00%)\n  Excise • 100 (25.00%)\n"
        );
    }

    #[test]
    fn test_export_unsupported_by_default() {
        let nav = navigator();
        let view = View::new(nav.dataset(), nav.current());
        let mut renderer = OutlineRenderer::new(Vec::new(), 1);
        assert!(matches!(
            renderer.export_image(&view, 2.0),
            Err(RenderError::ExportUnsupported)
        ));
    }
}
