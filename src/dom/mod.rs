// DOM module for parsing and representing HTML content
mod attr;
mod config;
pub(crate) mod events;
pub(crate) mod node;
mod parser;

pub use self::config::{DomConfig, Viewport};
pub use self::events::{
    Event, EventDispatcher, EventListenerRegistry, EventPhase, EventType, ListenerCallback,
};
pub use self::node::{
    attr_name, Attribute, AttributeMap, DomNode, DomNodeFlags, ElementData, NodeData,
    TextData,
};
pub use self::parser::HtmlParser;
use crate::error::DomError;
use hashbrown::{HashMap, HashSet};
use markup5ever::{ns, LocalName, QualName};
use slab::Slab;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Shared handle to a document. Everything runs on one thread, so listeners and
/// scheduled callbacks hold clones (or weak references) of this handle.
pub type DomRef = Rc<RefCell<Dom>>;

/// Represents a DOM tree
pub struct Dom {
    /// ID of the DOM
    pub(crate) id: usize,

    pub(crate) viewport: Viewport,

    pub(crate) nodes: Box<Slab<DomNode>>,
    pub(crate) nodes_to_id: HashMap<String, usize>,

    // Set by any mutation that can change geometry
    pub(crate) layout_dirty: bool,
}

impl Dom {
    /// Create a new empty DOM
    pub fn new(config: DomConfig) -> Self {
        static ID_GENERATOR: AtomicUsize = AtomicUsize::new(1);

        let id = ID_GENERATOR.fetch_add(1, Ordering::SeqCst);

        let mut dom = Self {
            id,
            viewport: config.viewport.unwrap_or_default(),
            nodes: Box::new(Slab::new()),
            nodes_to_id: HashMap::new(),
            layout_dirty: true,
        };

        // Create the root document node
        let root = dom.create_node(NodeData::Document);
        dom.nodes[root].flags.insert(DomNodeFlags::IS_IN_DOCUMENT);

        dom
    }

    pub fn into_ref(self) -> DomRef {
        Rc::new(RefCell::new(self))
    }

    pub(crate) fn create_node(&mut self, data: NodeData) -> usize {
        static SERIAL: AtomicU64 = AtomicU64::new(1);

        let entry = self.nodes.vacant_entry();
        let id = entry.key();
        entry.insert(DomNode::new(id, SERIAL.fetch_add(1, Ordering::Relaxed), data));

        id
    }

    pub fn create_element(&mut self, tag_name: QualName, attributes: AttributeMap) -> usize {
        let data = NodeData::Element(ElementData::new(tag_name, attributes));
        self.create_node(data)
    }

    /// Create an element in the HTML namespace
    pub fn create_html_element(&mut self, tag_name: &str, attributes: Vec<Attribute>) -> usize {
        let name = QualName::new(None, ns!(html), LocalName::from(tag_name));
        self.create_element(name, AttributeMap::new(attributes))
    }

    pub fn create_comment_node(&mut self) -> usize {
        self.create_node(NodeData::Comment)
    }

    pub fn create_text_node(&mut self, text: &str) -> usize {
        let data = NodeData::Text(TextData::new(text.to_string()));
        self.create_node(data)
    }

    pub fn append_text_to_node(&mut self, node_id: usize, text: &str) -> Result<(), DomError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or(DomError::NoSuchNode(node_id))?;
        match &mut node.data {
            NodeData::Text(data) => {
                data.content += text;
                Ok(())
            }
            _ => Err(DomError::NotTextNode(node_id)),
        }
    }

    pub fn tree(&self) -> &Slab<DomNode> {
        &self.nodes
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.viewport != viewport {
            self.viewport = viewport;
            self.layout_dirty = true;
        }
    }

    pub fn get_node(&self, node_id: usize) -> Option<&DomNode> {
        self.nodes.get(node_id)
    }

    pub fn root_node(&self) -> &DomNode {
        &self.nodes[0]
    }

    pub fn is_in_document(&self, node_id: usize) -> bool {
        self.nodes
            .get(node_id)
            .is_some_and(|node| node.is_in_document())
    }

    pub fn is_element(&self, node_id: usize) -> bool {
        self.nodes.get(node_id).is_some_and(|node| node.is_element())
    }

    pub fn parent_id(&self, node_id: usize) -> Option<usize> {
        self.nodes.get(node_id)?.parent
    }

    pub fn previous_sibling_id(&self, node_id: usize) -> Option<usize> {
        let parent = &self.nodes[self.parent_id(node_id)?];
        let index = parent.index_of_child(node_id)?;
        index.checked_sub(1).map(|index| parent.children[index])
    }

    pub fn next_sibling_id(&self, node_id: usize) -> Option<usize> {
        let parent = &self.nodes[self.parent_id(node_id)?];
        let index = parent.index_of_child(node_id)?;
        parent.children.get(index + 1).copied()
    }

    pub fn last_child_id(&self, node_id: usize) -> Option<usize> {
        self.nodes.get(node_id)?.children.last().copied()
    }

    pub fn child_ids(&self, node_id: usize) -> Vec<usize> {
        self.nodes
            .get(node_id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    /// Ancestors of a node, nearest first, ending at the document node.
    pub fn ancestor_ids(&self, node_id: usize) -> Vec<usize> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(node_id);

        let mut current = self.parent_id(node_id);
        while let Some(parent) = current {
            // Check for circular reference
            if !visited.insert(parent) {
                tracing::warn!(node_id, parent, "circular reference in DOM parent chain");
                break;
            }
            ancestors.push(parent);
            current = self.parent_id(parent);
        }

        ancestors
    }

    pub fn append_children(&mut self, parent_id: usize, child_ids: &[usize]) {
        self.add_children_to_parent(parent_id, child_ids, &|parent, child_ids| {
            parent.children.extend_from_slice(child_ids);
        })
    }

    pub fn insert_nodes_before(&mut self, anchor_node_id: usize, new_node_ids: &[usize]) {
        let Some(parent_id) = self.parent_id(anchor_node_id) else {
            tracing::warn!(anchor_node_id, "insert before a node without a parent");
            return;
        };
        self.add_children_to_parent(parent_id, new_node_ids, &|parent, child_ids| {
            let node_child_idx = parent
                .index_of_child(anchor_node_id)
                .unwrap_or(parent.children.len());
            parent
                .children
                .splice(node_child_idx..node_child_idx, child_ids.iter().copied());
        });
    }

    fn add_children_to_parent(
        &mut self,
        parent_id: usize,
        child_ids: &[usize],
        insert_children_fn: &dyn Fn(&mut DomNode, &[usize]),
    ) {
        // Detach first so a child moved within the same parent isn't removed after insertion
        for child_id in child_ids.iter().copied() {
            if let Some(old_parent_id) = self.nodes[child_id].parent.take() {
                self.nodes[old_parent_id]
                    .children
                    .retain(|id| *id != child_id);
            }
        }

        let new_parent = &mut self.nodes[parent_id];
        let new_parent_is_in_doc = new_parent.flags.is_in_document();
        insert_children_fn(new_parent, child_ids);

        for child_id in child_ids.iter().copied() {
            let child = &mut self.nodes[child_id];
            child.parent = Some(parent_id);

            if new_parent_is_in_doc != child.flags.is_in_document() {
                self.set_subtree_in_document(child_id, new_parent_is_in_doc);
            }
        }

        self.layout_dirty = true;
    }

    pub fn reparent_children(&mut self, old_parent_id: usize, new_parent_id: usize) {
        let child_ids = std::mem::take(&mut self.nodes[old_parent_id].children);
        for child_id in &child_ids {
            self.nodes[*child_id].parent = None;
        }
        self.append_children(new_parent_id, &child_ids);
    }

    /// Detach a node (and its subtree) from its parent. The node stays allocated and
    /// may be inserted again.
    pub fn remove_node(&mut self, node_id: usize) {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return;
        };

        if let Some(parent_id) = node.parent.take() {
            self.nodes[parent_id].children.retain(|id| *id != node_id);
        }

        self.set_subtree_in_document(node_id, false);
        self.layout_dirty = true;
    }

    /// Detach a node and free it and its subtree. Freed ids may be handed out again.
    pub fn remove_and_drop(&mut self, node_id: usize) -> Option<DomNode> {
        self.remove_node(node_id);

        fn drop_subtree(dom: &mut Dom, node_id: usize) -> Option<DomNode> {
            let node = dom.nodes.try_remove(node_id)?;
            for &child in &node.children {
                drop_subtree(dom, child);
            }
            Some(node)
        }

        drop_subtree(self, node_id)
    }

    fn set_subtree_in_document(&mut self, node_id: usize, in_document: bool) {
        let mut stack = vec![node_id];
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id];
            node.flags.set(DomNodeFlags::IS_IN_DOCUMENT, in_document);

            // Keep the ID map in sync with what is reachable from the document
            if let Some(id_attr) = node.attr("id").map(str::to_string) {
                if in_document {
                    self.nodes_to_id.insert(id_attr, id);
                } else if self.nodes_to_id.get(&id_attr) == Some(&id) {
                    self.nodes_to_id.remove(&id_attr);
                }
            }

            stack.extend(self.nodes[id].children.iter().copied());
        }
    }

    /// Pre-order traversal of the in-document subtree below the document node
    pub fn find_node_ids<F>(&self, predicate: F) -> Vec<usize>
    where
        F: Fn(&DomNode) -> bool,
    {
        let mut found = Vec::new();
        let mut stack: Vec<usize> = self.root_node().children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if predicate(node) {
                found.push(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        found
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<usize> {
        self.nodes_to_id
            .get(id)
            .copied()
            .or_else(|| self.find_node_ids(|node| node.attr("id") == Some(id)).first().copied())
    }

    /// Elements carrying `class_name`, in document order
    pub fn get_elements_by_class_name(&self, class_name: &str) -> Vec<usize> {
        self.find_node_ids(|node| node.has_class(class_name))
    }

    pub fn get_elements_by_tag_name(&self, tag_name: &str) -> Vec<usize> {
        self.find_node_ids(|node| node.data.is_element_with_tag_name(tag_name))
    }

    pub fn element_name(&self, node_id: usize) -> Option<&QualName> {
        self.nodes
            .get(node_id)?
            .element_data()
            .map(|el| &el.name)
    }

    pub fn add_event_listener(
        &mut self,
        node_id: usize,
        event_type: EventType,
        callback: ListenerCallback,
        use_capture: bool,
    ) -> Option<usize> {
        let node = self.nodes.get_mut(node_id)?;
        Some(node.event_listeners.add_listener(event_type, callback, use_capture))
    }

    pub fn remove_event_listener(
        &mut self,
        node_id: usize,
        event_type: &EventType,
        listener_id: usize,
    ) -> bool {
        self.nodes
            .get_mut(node_id)
            .is_some_and(|node| node.event_listeners.remove_listener_by_id(event_type, listener_id))
    }
}

/// Change the viewport and notify `resize` listeners on the document node, which
/// stands in for the window.
pub fn resize(dom: &DomRef, viewport: Viewport) {
    let root = {
        let mut dom = dom.borrow_mut();
        dom.set_viewport(viewport);
        dom.root_node().id
    };
    tracing::debug!(width = viewport.width, height = viewport.height, "viewport resized");
    EventDispatcher::dispatch_event(dom, root, Event::new(EventType::Resize).non_bubbling());
}
