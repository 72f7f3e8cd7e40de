//! Tree-to-HTML serialization.

use std::borrow::Cow;

use super::{Element, Node};

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Escape text for HTML, borrowing when nothing needs escaping.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

pub fn render_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(&escape_html(text)),
        Node::Raw(raw) => out.push_str(raw),
        Node::Element(el) => render_element(el, out),
    }
}

/// Serialize only the children of an element, for callers that supply
/// their own wrapper tag.
pub fn render_children(el: &Element, out: &mut String) {
    for child in &el.children {
        render_node(child, out);
    }
}

fn render_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        if !value.is_empty() {
            out.push_str("=\"");
            out.push_str(&escape_html(value));
            out.push('"');
        }
    }
    if VOID_ELEMENTS.contains(&el.tag.as_str()) {
        out.push_str(" />");
        return;
    }
    out.push('>');
    render_children(el, out);
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}
