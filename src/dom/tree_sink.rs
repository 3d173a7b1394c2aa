//! html5ever TreeSink implementation for [`Dom`].

use std::borrow::Cow;
use std::cell::RefCell;

use html5ever::driver::ParseOpts;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute as Html5Attribute, QualName, parse_document};

use super::{Dom, NodeData, NodeId};

/// Parse an HTML/XHTML document leniently, the way browsers do.
pub fn parse_html(html: &str) -> Dom {
    parse_document(ArenaSink::new(), ParseOpts::default())
        .one(StrTendril::from(html))
        .into_dom()
}

/// Handle used by TreeSink to reference nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(pub NodeId);

/// TreeSink implementation that builds a [`Dom`].
///
/// html5ever's TreeSink takes `&self` everywhere, hence the RefCell.
pub struct ArenaSink {
    dom: RefCell<Dom>,
    quirks_mode: RefCell<QuirksMode>,
}

impl Default for ArenaSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaSink {
    pub fn new() -> Self {
        Self {
            dom: RefCell::new(Dom::new()),
            quirks_mode: RefCell::new(QuirksMode::NoQuirks),
        }
    }

    /// Consume the sink and return the DOM.
    pub fn into_dom(self) -> Dom {
        self.dom.into_inner()
    }

    fn append_child(dom: &mut Dom, parent: NodeId, child: NodeOrText<NodeHandle>) {
        match child {
            NodeOrText::AppendNode(node) => dom.append(parent, node.0),
            NodeOrText::AppendText(text) => dom.append_text(parent, &text),
        }
    }
}

fn convert_attrs(attrs: Vec<Html5Attribute>) -> Vec<(String, String)> {
    attrs
        .into_iter()
        .map(|a| (a.name.local.to_string(), a.value.to_string()))
        .collect()
}

impl TreeSink for ArenaSink {
    type Handle = NodeHandle;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {}

    fn get_document(&self) -> Self::Handle {
        NodeHandle(self.dom.borrow().document())
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static EMPTY: QualName = QualName {
            prefix: None,
            ns: html5ever::ns!(),
            local: html5ever::local_name!(""),
        };

        let dom = self.dom.borrow();
        match dom.get(target.0).map(|n| &n.data) {
            Some(NodeData::Element { name, .. }) => {
                let name: &QualName = name;
                // SAFETY: element names are boxed and nodes are never freed
                // before the sink is consumed, so the QualName outlives `self`
                // even if the arena reallocates.
                unsafe { &*(name as *const QualName) }
            }
            _ => &EMPTY,
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Html5Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let id = self
            .dom
            .borrow_mut()
            .create_qualified(name, convert_attrs(attrs));
        NodeHandle(id)
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        NodeHandle(self.dom.borrow_mut().create_other())
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        NodeHandle(self.dom.borrow_mut().create_other())
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        Self::append_child(&mut self.dom.borrow_mut(), parent.0, child);
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let parent = self
            .dom
            .borrow()
            .get(element.0)
            .map_or(NodeId::NONE, |n| n.parent);
        let target = if parent.is_some() {
            parent
        } else {
            prev_element.0
        };
        Self::append_child(&mut self.dom.borrow_mut(), target, child);
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        let mut dom = self.dom.borrow_mut();
        let doc = dom.document();
        let doctype = dom.create_other();
        dom.append(doc, doctype);
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        *target
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x.0 == y.0
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        *self.quirks_mode.borrow_mut() = mode;
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut dom = self.dom.borrow_mut();
        let node = match new_node {
            NodeOrText::AppendNode(node) => node.0,
            NodeOrText::AppendText(text) => dom.create_text(text.to_string()),
        };
        dom.insert_before(sibling.0, node);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Html5Attribute>) {
        self.dom
            .borrow_mut()
            .add_attrs_if_missing(target.0, convert_attrs(attrs));
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.dom.borrow_mut().detach(target.0);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut dom = self.dom.borrow_mut();
        let children: Vec<NodeId> = dom.children(node.0).collect();
        for child in children {
            dom.detach(child);
            dom.append(new_parent.0, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeKind;

    #[test]
    fn test_basic_parse() {
        let dom = parse_html("<html><body><p>Hello</p></body></html>");

        let p = dom.find_by_tag("p").expect("should find p");
        let text = dom.children(p).next().expect("p should have child");
        assert_eq!(dom.kind(text), NodeKind::Text("Hello"));
    }

    #[test]
    fn test_xhtml_with_declaration() {
        let dom = parse_html(
            r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Ignored</title></head>
<body><h1>One</h1><p>Body <b>text</b></p><img src="../images/a.png" alt=""/></body>
</html>"#,
        );

        let body = dom.find_by_tag("body").expect("body");
        let tags: Vec<_> = dom.children(body).filter_map(|c| dom.tag(c)).collect();
        assert_eq!(tags, vec!["h1", "p", "img"]);

        let img = dom.find_by_tag("img").unwrap();
        assert_eq!(dom.attr(img, "src"), Some("../images/a.png"));
        assert_eq!(dom.text_content(dom.find_by_tag("p").unwrap()), "Body text");
    }

    #[test]
    fn test_svg_image_href() {
        let dom = parse_html(
            r#"<body><svg xmlns:xlink="http://www.w3.org/1999/xlink"><image xlink:href="cover.jpg"/></svg></body>"#,
        );
        let image = dom.find_by_tag("image").expect("svg image");
        assert_eq!(dom.attr(image, "href"), Some("cover.jpg"));
    }
}
