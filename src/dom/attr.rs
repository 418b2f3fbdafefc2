use crate::dom::node::{attr_name, Attribute};
use crate::dom::Dom;
use hashbrown::HashSet;

/// Attributes whose value can move boxes around
const LAYOUT_ATTRS: &[&str] = &["style", "hidden", "width", "class"];

impl Dom {
    pub fn add_attrs_if_missing(&mut self, node_id: usize, attrs: Vec<Attribute>) {
        let Some(element_data) = self.nodes.get(node_id).and_then(|node| node.element_data()) else {
            return;
        };

        let existing_names = element_data
            .attributes
            .iter()
            .map(|e| e.name.clone())
            .collect::<HashSet<_>>();

        for attr in attrs
            .into_iter()
            .filter(|attr| !existing_names.contains(&attr.name))
        {
            self.set_attribute(node_id, attr.name.local.as_ref(), &attr.value);
        }
    }

    /// Set an attribute on an element. Returns `false` when the node is missing or not
    /// an element.
    pub fn set_attribute(&mut self, node_id: usize, name: &str, value: &str) -> bool {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return false;
        };
        let in_document = node.is_in_document();
        let Some(element) = node.element_data_mut() else {
            return false;
        };

        element.attributes.set(attr_name(name), value);

        if name == "id" && in_document {
            self.nodes_to_id.insert(value.to_string(), node_id);
        }
        if LAYOUT_ATTRS.contains(&name) {
            self.layout_dirty = true;
        }

        true
    }

    pub fn remove_attribute(&mut self, node_id: usize, name: &str) -> Option<String> {
        let element = self.nodes.get_mut(node_id)?.element_data_mut()?;
        let removed = element.attributes.remove(name)?;

        if name == "id" && self.nodes_to_id.get(&removed.value) == Some(&node_id) {
            self.nodes_to_id.remove(&removed.value);
        }
        if LAYOUT_ATTRS.contains(&name) {
            self.layout_dirty = true;
        }

        Some(removed.value)
    }

    pub fn get_attribute(&self, node_id: usize, name: &str) -> Option<&str> {
        self.nodes.get(node_id)?.attr(name)
    }

    pub fn has_class(&self, node_id: usize, class_name: &str) -> bool {
        self.nodes
            .get(node_id)
            .is_some_and(|node| node.has_class(class_name))
    }

    /// `classList.add`: appends the class unless the element already carries it.
    pub fn add_class(&mut self, node_id: usize, class_name: &str) -> bool {
        let Some(element) = self.nodes.get(node_id).and_then(|node| node.element_data()) else {
            return false;
        };
        if element.has_class(class_name) {
            return true;
        }

        let value = match element.attr("class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {class_name}"),
            _ => class_name.to_string(),
        };
        self.set_attribute(node_id, "class", &value)
    }
}
