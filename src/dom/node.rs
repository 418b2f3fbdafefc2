use crate::dom::events::EventListenerRegistry;
use bitflags::bitflags;
use markup5ever::{LocalName, QualName, ns};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use taffy::Layout;

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

impl Attribute {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: attr_name(name),
            value: value.to_string(),
        }
    }
}

/// Builds a namespace-less attribute name, the form html5ever produces for HTML attributes.
pub fn attr_name(name: &str) -> QualName {
    QualName::new(None, ns!(), LocalName::from(name))
}

/// A map of attribute names to values
#[derive(Clone, Debug, Default)]
pub struct AttributeMap {
    attrs: Vec<Attribute>,
}

impl AttributeMap {
    pub fn new(attrs: Vec<Attribute>) -> Self {
        Self { attrs }
    }

    pub fn empty() -> Self {
        Self { attrs: Vec::new() }
    }

    pub fn set(&mut self, name: QualName, value: &str) {
        // existing attribute
        let attr = self.attrs.iter_mut().find(|attr| attr.name == name);
        if let Some(attr) = attr {
            attr.value.clear();
            attr.value.push_str(value);
        } else {
            self.attrs.push(Attribute {
                name,
                value: value.to_string(),
            });
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name.local.as_ref() == name)
            .map(|attr| attr.value.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        let index = self
            .attrs
            .iter()
            .position(|attr| attr.name.local.as_ref() == name);
        index.map(|index| self.attrs.remove(index))
    }
}

impl Deref for AttributeMap {
    type Target = Vec<Attribute>;
    fn deref(&self) -> &Self::Target {
        &self.attrs
    }
}
impl DerefMut for AttributeMap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.attrs
    }
}

/// Represents the type of DOM node
#[derive(Debug, Clone)]
pub enum NodeData {
    /// The `Document` itself - the root node.
    Document,
    Text(TextData),
    Comment,
    Element(ElementData),
}

impl NodeData {
    pub fn element(&self) -> Option<&ElementData> {
        match self {
            NodeData::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn element_mut(&mut self) -> Option<&mut ElementData> {
        match self {
            NodeData::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.element()?.attr(name)
    }

    pub fn is_element_with_tag_name(&self, tag_name: &str) -> bool {
        self.element()
            .is_some_and(|element| element.name.local.as_ref() == tag_name)
    }
}

#[derive(Debug, Clone)]
pub struct TextData {
    pub content: String,
}

impl TextData {
    pub fn new(content: String) -> Self {
        Self { content }
    }
}

/// Data specific to element nodes
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Tag name of the element (e.g., "div", "img", "picture")
    pub name: QualName,

    /// Element attributes (e.g., id, class, sizes)
    pub attributes: AttributeMap,
}

impl ElementData {
    pub fn new(name: QualName, attrs: AttributeMap) -> Self {
        Self {
            name,
            attributes: attrs,
        }
    }

    pub fn tag_name(&self) -> &str {
        self.name.local.as_ref()
    }

    /// Get the ID attribute
    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Get the class attribute as a list of class names
    pub fn classes(&self) -> Vec<&str> {
        match self.attr("class") {
            Some(classlist) => classlist.split_whitespace().collect(),
            None => Vec::new(),
        }
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.attr("class")
            .is_some_and(|classlist| classlist.split_whitespace().any(|c| c == class_name))
    }

    pub fn attr(&self, attr_name: &str) -> Option<&str> {
        self.attributes.get(attr_name)
    }

    pub fn attr_parsed<T: FromStr>(&self, attr_name: &str) -> Option<T> {
        self.attr(attr_name)?.trim().parse::<T>().ok()
    }

    pub fn attrs(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn has_attr(&self, attr_name: &str) -> bool {
        self.attr(attr_name).is_some()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DomNodeFlags: u32 {
        const IS_IN_DOCUMENT = 0b00000001;
    }
}

impl DomNodeFlags {
    #[inline]
    pub fn is_in_document(&self) -> bool {
        self.contains(DomNodeFlags::IS_IN_DOCUMENT)
    }
}

/// A node in the DOM tree
pub struct DomNode {
    pub id: usize,
    /// Never reused, unlike `id` which the slab hands out again after a node is dropped.
    pub serial: u64,
    /// Parent node
    pub parent: Option<usize>,
    /// Child nodes
    pub children: Vec<usize>,

    pub flags: DomNodeFlags,

    /// The type of node
    pub data: NodeData,

    /// Layout computed by the last layout flush
    pub final_layout: Layout,

    /// Event listener registry
    pub event_listeners: EventListenerRegistry,
}

impl PartialEq for DomNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.serial == other.serial
    }
}

impl Eq for DomNode {}

impl DomNode {
    /// Create a new DOM node
    pub fn new(id: usize, serial: u64, data: NodeData) -> Self {
        Self {
            id,
            serial,
            parent: None,
            children: Vec::new(),
            flags: DomNodeFlags::empty(),
            data,
            final_layout: Layout::new(),
            event_listeners: EventListenerRegistry::new(),
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    pub fn is_in_document(&self) -> bool {
        self.flags.is_in_document()
    }

    pub fn element_data(&self) -> Option<&ElementData> {
        self.data.element()
    }

    pub fn element_data_mut(&mut self) -> Option<&mut ElementData> {
        self.data.element_mut()
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.data.attr(name)
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.element_data()
            .is_some_and(|element| element.has_class(class_name))
    }

    pub fn index_of_child(&self, child_id: usize) -> Option<usize> {
        self.children.iter().position(|id| *id == child_id)
    }
}

impl std::fmt::Debug for DomNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            NodeData::Element(element) => {
                write!(f, "<{}", element.tag_name())?;
                for attr in element.attrs().iter() {
                    write!(f, " {}=\"{}\"", attr.name.local.as_ref(), attr.value)?;
                }
                write!(f, "> #{}", self.id)
            }
            NodeData::Text(text) => write!(f, "#text {:?} #{}", text.content, self.id),
            NodeData::Comment => write!(f, "#comment #{}", self.id),
            NodeData::Document => write!(f, "#document"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markup5ever::local_name;

    fn img(attrs: &[(&str, &str)]) -> ElementData {
        let attrs = attrs.iter().map(|(k, v)| Attribute::new(k, v)).collect();
        ElementData::new(
            QualName::new(None, ns!(html), local_name!("img")),
            AttributeMap::new(attrs),
        )
    }

    #[test]
    fn attribute_map_overwrites_in_place() {
        let mut attrs = AttributeMap::empty();
        attrs.set(attr_name("sizes"), "auto");
        attrs.set(attr_name("class"), "autosizes");
        attrs.set(attr_name("sizes"), "450px");

        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get("sizes"), Some("450px"));
        assert_eq!(attrs[0].name.local.as_ref(), "sizes");
    }

    #[test]
    fn class_list_matches_whole_tokens() {
        let element = img(&[("class", "hero autosizes  wide")]);

        assert!(element.has_class("autosizes"));
        assert!(!element.has_class("auto"));
        assert_eq!(element.classes(), vec!["hero", "autosizes", "wide"]);
    }

    #[test]
    fn parsed_attribute_ignores_garbage() {
        let element = img(&[("width", " 300 "), ("height", "tall")]);

        assert_eq!(element.attr_parsed::<f32>("width"), Some(300.0));
        assert_eq!(element.attr_parsed::<f32>("height"), None);
    }
}
