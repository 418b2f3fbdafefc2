// HTML parser using html5ever
use super::Dom;
use crate::dom::config::DomConfig;
use crate::dom::node::Attribute;
use crate::error::DomError;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tokenizer::TokenizerOpts;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{parse_document, ParseOpts};
use markup5ever::interface::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use markup5ever::QualName;
use std::borrow::Cow;
use std::cell::{Cell, Ref, RefCell, RefMut};

/// HTML Parser for converting HTML strings into DOM structures
#[derive(Default)]
pub struct HtmlParser;

fn html5ever_to_dom(attribute: html5ever::Attribute) -> Attribute {
    Attribute {
        name: attribute.name,
        value: attribute.value.to_string(),
    }
}

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse HTML string into a DOM structure
    pub fn parse(&self, html: &str, config: DomConfig) -> Result<Dom, DomError> {
        let mut dom = Dom::new(config);

        DomHtmlParser::parse_dom(&mut dom, html)?;

        Ok(dom)
    }
}

pub struct DomHtmlParser<'m> {
    dom: RefCell<&'m mut Dom>,

    pub errors: RefCell<Vec<Cow<'static, str>>>,

    pub quirks_mode: Cell<QuirksMode>,
}

impl<'m> DomHtmlParser<'m> {
    pub fn new(dom: &'m mut Dom) -> Self {
        Self {
            dom: RefCell::new(dom),
            errors: RefCell::new(Vec::new()),
            quirks_mode: Cell::new(QuirksMode::NoQuirks),
        }
    }

    pub fn parse_dom(dom: &mut Dom, html: &str) -> Result<(), DomError> {
        let sink = DomHtmlParser::new(dom);

        let opts = ParseOpts {
            tokenizer: TokenizerOpts::default(),
            tree_builder: TreeBuilderOpts {
                exact_errors: false,
                scripting_enabled: false,
                iframe_srcdoc: false,
                drop_doctype: true,
                quirks_mode: QuirksMode::NoQuirks,
            },
        };
        parse_document(sink, opts)
            .from_utf8()
            .read_from(&mut html.as_bytes())?;

        Ok(())
    }

    /// Merge `text` into the adjacent text node, or create a node for it. Returns
    /// the node that still has to be inserted.
    fn text_node(&self, adjacent: Option<usize>, text: &str) -> Option<usize> {
        let mut dom = self.dom();
        if adjacent.is_some_and(|id| dom.append_text_to_node(id, text).is_ok()) {
            return None;
        }
        Some(dom.create_text_node(text))
    }

    #[track_caller]
    fn dom(&self) -> RefMut<'_, &'m mut Dom> {
        self.dom.borrow_mut()
    }
}

impl<'m> TreeSink for DomHtmlParser<'m> {
    type Output = ();

    type Handle = usize;

    type ElemName<'a>
        = Ref<'a, QualName>
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        for error in self.errors.borrow().iter() {
            tracing::trace!("html parse error: {error}");
        }
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        self.errors.borrow_mut().push(msg);
    }

    fn get_document(&self) -> Self::Handle {
        0
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        Ref::map(self.dom.borrow(), |dom| {
            dom.element_name(*target)
                .expect("TreeSink::elem_name called on non-element node")
        })
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<markup5ever::Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let attrs = attrs.into_iter().map(html5ever_to_dom).collect();
        self.dom().create_element(name, super::AttributeMap::new(attrs))
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        self.dom().create_comment_node()
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        self.dom().create_comment_node()
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let id = match child {
            NodeOrText::AppendNode(id) => id,
            NodeOrText::AppendText(text) => {
                let last = self.dom().last_child_id(*parent);
                let Some(id) = self.text_node(last, &text) else {
                    return;
                };
                id
            }
        };
        self.dom().append_children(*parent, &[id]);
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let id = match new_node {
            NodeOrText::AppendNode(id) => id,
            NodeOrText::AppendText(text) => {
                let previous = self.dom().previous_sibling_id(*sibling);
                let Some(id) = self.text_node(previous, &text) else {
                    return;
                };
                id
            }
        };
        self.dom().insert_nodes_before(*sibling, &[id]);
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if self.dom().parent_id(*element).is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        *target
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x == y
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        self.quirks_mode.set(mode);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<markup5ever::Attribute>) {
        let attrs = attrs.into_iter().map(html5ever_to_dom).collect();
        self.dom().add_attrs_if_missing(*target, attrs);
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.dom().remove_node(*target);
    }

    fn reparent_children(&self, old_parent: &Self::Handle, new_parent: &Self::Handle) {
        self.dom().reparent_children(*old_parent, *new_parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeData;

    const PICTURE: &str = r#"<!DOCTYPE html>
<html><body>
  <div id="wrap">
    <picture>
      <source srcset="a-400.webp 400w, a-800.webp 800w" type="image/webp">
      <img id="hero" class="autosizes" sizes="auto" srcset="a-400.jpg 400w, a-800.jpg 800w">
    </picture>
  </div>
</body></html>"#;

    #[test]
    fn parses_into_document_tree() {
        let dom = HtmlParser::new().parse(PICTURE, DomConfig::default()).unwrap();

        let hero = dom.get_element_by_id("hero").unwrap();
        let picture = dom.parent_id(hero).unwrap();
        assert_eq!(dom.element_name(picture).unwrap().local.as_ref(), "picture");
        assert_eq!(dom.get_attribute(hero, "sizes"), Some("auto"));
        assert!(dom.is_in_document(hero));
        assert_eq!(dom.get_elements_by_class_name("autosizes"), vec![hero]);
        assert_eq!(dom.get_elements_by_tag_name("source").len(), 1);
    }

    #[test]
    fn implied_elements_are_created() {
        let dom = HtmlParser::new()
            .parse("<img class=autosizes sizes=auto>", DomConfig::default())
            .unwrap();

        let root = dom.root_node().children[0];
        assert_eq!(dom.element_name(root).unwrap().local.as_ref(), "html");
        assert_eq!(dom.get_elements_by_tag_name("body").len(), 1);
        assert_eq!(dom.get_elements_by_class_name("autosizes").len(), 1);
    }

    #[test]
    fn every_parsed_child_links_back_to_its_parent() {
        let dom = HtmlParser::new().parse(PICTURE, DomConfig::default()).unwrap();

        let mut stack = vec![0];
        while let Some(id) = stack.pop() {
            let node = dom.get_node(id).unwrap();
            assert!(node.is_in_document());
            for &child in &node.children {
                assert_eq!(dom.parent_id(child), Some(id));
                stack.push(child);
            }
        }
    }

    #[test]
    fn adjacent_text_is_merged_into_one_node() {
        let dom = HtmlParser::new()
            .parse("<p id=p>a&amp;b</p>", DomConfig::default())
            .unwrap();

        let p = dom.get_element_by_id("p").unwrap();
        let children = &dom.get_node(p).unwrap().children;
        assert_eq!(children.len(), 1);
        assert!(matches!(
            &dom.get_node(children[0]).unwrap().data,
            NodeData::Text(text) if text.content == "a&b"
        ));
    }
}
