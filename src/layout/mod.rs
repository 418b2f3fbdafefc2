// Layout for computing element box widths
mod style;

use crate::dom::{Dom, NodeData};
use crate::error::DomError;
use taffy::prelude::*;
use taffy::TaffyTree;

use self::style::{element_style, viewport_style};

/// Builds a taffy tree mirroring the in-document nodes of a [`Dom`] and writes the
/// computed boxes back into each node's `final_layout`.
pub struct LayoutEngine {
    taffy: TaffyTree<usize>,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self {
            taffy: TaffyTree::new(),
        }
    }

    /// Compute layout for the whole document
    pub fn compute_layout(&mut self, dom: &mut Dom) -> Result<(), DomError> {
        self.taffy.clear();

        let viewport = dom.viewport();
        let root = dom.root_node().id;
        let Some(root_taffy_node) = self.build_taffy_tree(dom, root)? else {
            return Ok(());
        };

        self.taffy.compute_layout(
            root_taffy_node,
            Size {
                width: AvailableSpace::Definite(viewport.width),
                height: AvailableSpace::Definite(viewport.height),
            },
        )?;

        // Nodes outside the document or under display:none keep a zero layout
        let mut placed = Vec::new();
        self.collect_layouts(root_taffy_node, &mut placed)?;
        for node in dom.nodes.iter_mut().map(|(_, node)| node) {
            node.final_layout = Layout::new();
        }
        for (dom_id, layout) in placed {
            if let Some(node) = dom.nodes.get_mut(dom_id) {
                node.final_layout = layout;
            }
        }

        Ok(())
    }

    /// Build Taffy tree from DOM tree. Text and comment nodes have no box.
    fn build_taffy_tree(&mut self, dom: &Dom, node_id: usize) -> Result<Option<NodeId>, DomError> {
        let Some(node) = dom.get_node(node_id) else {
            return Ok(None);
        };

        let style = match &node.data {
            NodeData::Document => {
                let viewport = dom.viewport();
                viewport_style(viewport.width, viewport.height)
            }
            NodeData::Element(element) => element_style(element),
            NodeData::Text(_) | NodeData::Comment => return Ok(None),
        };

        let mut children = Vec::with_capacity(node.children.len());
        for &child_id in &node.children {
            if let Some(child) = self.build_taffy_tree(dom, child_id)? {
                children.push(child);
            }
        }

        let taffy_node = self.taffy.new_with_children(style, &children)?;
        self.taffy.set_node_context(taffy_node, Some(node_id))?;

        Ok(Some(taffy_node))
    }

    fn collect_layouts(
        &self,
        taffy_node: NodeId,
        placed: &mut Vec<(usize, Layout)>,
    ) -> Result<(), DomError> {
        if let Some(&dom_id) = self.taffy.get_node_context(taffy_node) {
            placed.push((dom_id, *self.taffy.layout(taffy_node)?));
        }
        for child in self.taffy.children(taffy_node)? {
            self.collect_layouts(child, placed)?;
        }
        Ok(())
    }
}

impl Dom {
    /// Recompute every box from the current attributes and viewport
    pub fn flush_layout(&mut self) -> Result<(), DomError> {
        LayoutEngine::new().compute_layout(self)?;
        self.layout_dirty = false;
        Ok(())
    }

    /// Flush layout only if something geometry-affecting changed since the last flush
    pub fn ensure_layout(&mut self) {
        if !self.layout_dirty {
            return;
        }
        if let Err(err) = self.flush_layout() {
            tracing::warn!("layout failed: {err}");
        }
    }

    pub fn needs_layout(&self) -> bool {
        self.layout_dirty
    }

    /// Rendered border-box width in whole pixels, as `offsetWidth` reports it.
    /// Detached nodes and nodes without a box measure 0.
    pub fn offset_width(&mut self, node_id: usize) -> f32 {
        self.ensure_layout();
        self.layout_width(node_id)
    }

    /// Width from the last layout flush without flushing
    pub fn layout_width(&self, node_id: usize) -> f32 {
        match self.nodes.get(node_id) {
            Some(node) if node.is_in_document() && node.is_element() => {
                node.final_layout.size.width.round()
            }
            _ => 0.0,
        }
    }
}
