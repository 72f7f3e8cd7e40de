//! Mutable markup tree.
//!
//! The renderer builds this tree from markdown events, hooks rewrite it in
//! place, and [`render`] serializes it back to HTML. Attribute order is
//! preserved so output is byte-stable across runs.

mod render;

pub use render::render_node;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Verbatim passthrough (comments, doctypes, unparseable fragments).
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    /// Insertion-ordered attribute pairs.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place so the
    /// original position is kept.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Concatenated text of the subtree, markup stripped.
    pub fn text_content(&self) -> String {
        fn collect(node: &Node, out: &mut String) {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(el) => {
                    for child in &el.children {
                        collect(child, out);
                    }
                }
                Node::Raw(_) => {}
            }
        }
        let mut out = String::new();
        for child in &self.children {
            collect(child, &mut out);
        }
        out
    }

    /// Pre-order walk over every element in the subtree, self included.
    pub fn for_each_element_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for child in &mut self.children {
            if let Node::Element(el) = child {
                el.for_each_element_mut(f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Element {
        let mut root = Element::new("div");
        let mut p = Element::new("p");
        p.push(Node::Text("Hello ".into()));
        let mut em = Element::new("em");
        em.push(Node::Text("world".into()));
        p.push(Node::Element(em));
        root.push(Node::Element(p));
        root
    }

    #[test]
    fn test_text_content_recurses() {
        assert_eq!(tree().text_content(), "Hello world");
    }

    #[test]
    fn test_set_attr_replaces_in_place() {
        let mut el = Element::new("a");
        el.set_attr("href", "/a");
        el.set_attr("class", "link");
        el.set_attr("href", "/b");
        assert_eq!(el.attrs[0], ("href".to_string(), "/b".to_string()));
        assert_eq!(el.get_attr("class"), Some("link"));
    }

    #[test]
    fn test_deep_nesting() {
        let mut root = Element::new("div");
        root.push(Node::Text("leaf".into()));
        for _ in 0..256 {
            let mut outer = Element::new("span");
            std::mem::swap(&mut outer, &mut root);
            root.push(Node::Element(outer));
        }
        assert_eq!(root.text_content(), "leaf");
    }

    #[test]
    fn test_for_each_element_mut_visits_all() {
        let mut root = tree();
        let mut tags = Vec::new();
        root.for_each_element_mut(&mut |el| tags.push(el.tag.clone()));
        assert_eq!(tags, vec!["div", "p", "em"]);
    }
}
