//! Owned HTML tree built on top of `scraper`.
//!
//! Extraction and rendering never mutate a parsed document in place. Every
//! transform takes a tree and returns a new one, so the same page can be
//! inspected several times without aliasing surprises.

use scraper::{ElementRef, Html, Selector};

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq)]
pub enum HtmlNode {
    Text(String),
    Element(HtmlElement),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HtmlElement {
    pub tag_name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<HtmlNode>,
}

impl HtmlNode {
    pub fn as_element(&self) -> Option<&HtmlElement> {
        match self {
            HtmlNode::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text(&self) -> String {
        match self {
            HtmlNode::Text(text) => text.clone(),
            HtmlNode::Element(el) => el.text(),
            HtmlNode::Comment(_) => String::new(),
        }
    }
}

impl HtmlElement {
    pub fn new(tag_name: &str, attributes: Vec<(String, String)>, children: Vec<HtmlNode>) -> Self {
        Self {
            tag_name: tag_name.to_lowercase(),
            attributes,
            children,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|(key, _)| key == name)
    }

    /// Returns a copy of this element with `name` set to `value`.
    pub fn with_attr(&self, name: &str, value: &str) -> Self {
        let mut attributes = self.attributes.clone();
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
        Self {
            tag_name: self.tag_name.clone(),
            attributes,
            children: self.children.clone(),
        }
    }

    /// Returns a copy of this element with its children replaced.
    pub fn with_children(&self, children: Vec<HtmlNode>) -> Self {
        Self {
            tag_name: self.tag_name.clone(),
            attributes: self.attributes.clone(),
            children,
        }
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag_name.as_str())
    }

    pub fn is_heading(&self) -> bool {
        matches!(
            self.tag_name.as_str(),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
        )
    }

    pub fn text(&self) -> String {
        self.children.iter().map(HtmlNode::text).collect()
    }

    pub fn element_children(&self) -> impl Iterator<Item = &HtmlElement> {
        self.children.iter().filter_map(HtmlNode::as_element)
    }

    /// Depth-first search for the first descendant with the given tag.
    pub fn find_first(&self, tag_name: &str) -> Option<&HtmlElement> {
        for child in self.element_children() {
            if child.tag_name == tag_name {
                return Some(child);
            }
            if let Some(found) = child.find_first(tag_name) {
                return Some(found);
            }
        }
        None
    }

    /// First descendant element in document order.
    pub fn first_descendant(&self) -> Option<&HtmlElement> {
        self.element_children().next()
    }

    /// The opening tag only, e.g. `<pre class="x">`.
    pub fn opening_tag(&self) -> String {
        let mut out = String::new();
        write_opening_tag(self, &mut out);
        out
    }

    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

/// Parses a full document and returns its `<html>` element.
pub fn parse_document(raw: &str) -> HtmlElement {
    let doc = Html::parse_document(raw);
    convert_element(doc.root_element())
}

/// Parses a markup fragment and returns its top-level nodes.
pub fn parse_fragment(raw: &str) -> Vec<HtmlNode> {
    let fragment = Html::parse_fragment(raw);
    convert_element(fragment.root_element()).children
}

/// Raw `href` values of every anchor in the document, in document order.
pub fn parse_links_only(raw: &str) -> Vec<String> {
    let doc = Html::parse_document(raw);
    let link_selector = Selector::parse("a[href]").expect("static selector is valid");
    let links: Vec<String> = doc
        .select(&link_selector)
        .filter_map(|e| e.value().attr("href"))
        .map(|s| s.to_string())
        .collect();

    ::log::debug!("HTML parser found {} links", links.len());
    links
}

fn convert_element(element: ElementRef<'_>) -> HtmlElement {
    let value = element.value();
    let attributes = value
        .attrs()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    let mut children = Vec::new();
    for child in element.children() {
        match child.value() {
            scraper::Node::Text(text) => children.push(HtmlNode::Text((**text).to_owned())),
            scraper::Node::Comment(comment) => {
                children.push(HtmlNode::Comment((**comment).to_owned()))
            }
            scraper::Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    children.push(HtmlNode::Element(convert_element(child_ref)));
                }
            }
            _ => {}
        }
    }

    HtmlElement::new(value.name(), attributes, children)
}

fn write_node(node: &HtmlNode, out: &mut String) {
    match node {
        HtmlNode::Text(text) => out.push_str(&escape_text(text)),
        HtmlNode::Element(el) => write_element(el, out),
        HtmlNode::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
    }
}

fn write_opening_tag(el: &HtmlElement, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag_name);
    for (name, value) in &el.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');
}

fn write_element(el: &HtmlElement, out: &mut String) {
    write_opening_tag(el, out);
    if el.is_void() {
        return;
    }
    for child in &el.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&el.tag_name);
    out.push('>');
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_keeps_structure() {
        let root = parse_document(
            "<html><head><title>T</title></head><body><p class=\"a\">Hi <b>there</b></p><!-- c --></body></html>",
        );
        assert_eq!(root.tag_name, "html");
        let body = root.find_first("body").unwrap();
        let p = body.find_first("p").unwrap();
        assert_eq!(p.attr("class"), Some("a"));
        assert_eq!(p.text(), "Hi there");
        assert!(
            body.children
                .iter()
                .any(|n| matches!(n, HtmlNode::Comment(c) if c.trim() == "c"))
        );
    }

    #[test]
    fn test_parse_fragment_returns_top_level_nodes() {
        let nodes = parse_fragment("<p>one</p><p>two</p>");
        let tags: Vec<&str> = nodes
            .iter()
            .filter_map(HtmlNode::as_element)
            .map(|e| e.tag_name.as_str())
            .collect();
        assert_eq!(tags, vec!["p", "p"]);
    }

    #[test]
    fn test_serialization_escapes_and_void_elements() {
        let el = HtmlElement::new(
            "p",
            vec![("title".to_string(), "a \"b\"".to_string())],
            vec![
                HtmlNode::Text("1 < 2 & 3".to_string()),
                HtmlNode::Element(HtmlElement::new("br", vec![], vec![])),
            ],
        );
        assert_eq!(
            el.outer_html(),
            "<p title=\"a &quot;b&quot;\">1 &lt; 2 &amp; 3<br></p>"
        );
        assert_eq!(el.opening_tag(), "<p title=\"a &quot;b&quot;\">");
    }

    #[test]
    fn test_with_attr_does_not_touch_original() {
        let el = HtmlElement::new("a", vec![("href".to_string(), "x".to_string())], vec![]);
        let updated = el.with_attr("href", "y");
        assert_eq!(el.attr("href"), Some("x"));
        assert_eq!(updated.attr("href"), Some("y"));
    }

    #[test]
    fn test_parse_links_only() {
        let links = parse_links_only(
            "<html><body><a href=\"/a\">A</a><a>no href</a><a href=\"b#c\">B</a></body></html>",
        );
        assert_eq!(links, vec!["/a".to_string(), "b#c".to_string()]);
    }
}
