//! Markdown to markup-tree conversion using pulldown-cmark.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::dom::{Element, Node};
use crate::utils::slugify;

/// Options for markdown conversion
#[derive(Debug, Clone, Default)]
pub struct MarkdownOptions {
    /// Enable tables extension
    pub tables: bool,
    /// Enable footnotes extension
    pub footnotes: bool,
    /// Enable strikethrough extension
    pub strikethrough: bool,
    /// Enable task lists extension
    pub task_lists: bool,
    /// Enable heading attributes extension (e.g., `# Heading {#custom-id}`)
    pub heading_attributes: bool,
    /// Append a self-link with this symbol to every heading.
    pub anchor_symbol: Option<String>,
}

impl MarkdownOptions {
    /// Create options with all extensions enabled
    pub fn all() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            task_lists: true,
            heading_attributes: true,
            anchor_symbol: None,
        }
    }

    /// Convert to pulldown-cmark Options
    fn to_pulldown_options(&self) -> Options {
        let mut opts = Options::empty();
        if self.tables {
            opts.insert(Options::ENABLE_TABLES);
        }
        if self.footnotes {
            opts.insert(Options::ENABLE_FOOTNOTES);
        }
        if self.strikethrough {
            opts.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.task_lists {
            opts.insert(Options::ENABLE_TASKLISTS);
        }
        if self.heading_attributes {
            opts.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        }
        opts
    }
}

/// Stack frame for tracking nested elements
struct StackFrame {
    element: Element,
    /// Transparent frames splice their children into the parent on pop
    /// (HTML blocks have no wrapper of their own).
    transparent: bool,
}

/// Markdown to tree converter
struct MarkdownConverter<'a> {
    options: &'a MarkdownOptions,
    /// Stack of open elements (for nested structures)
    stack: Vec<StackFrame>,
    /// Collected children of the wrapper element
    root_children: Vec<Node>,
    in_table_head: bool,
}

impl<'a> MarkdownConverter<'a> {
    fn new(options: &'a MarkdownOptions) -> Self {
        Self {
            options,
            stack: Vec::new(),
            root_children: Vec::new(),
            in_table_head: false,
        }
    }

    /// Convert a markdown string into the given wrapper element.
    fn convert(mut self, markdown: &str, wrapper: &str) -> Element {
        let parser = Parser::new_ext(markdown, self.options.to_pulldown_options());

        for event in parser {
            self.handle_event(event);
        }

        let mut root = Element::new(wrapper);
        root.children = self.root_children;
        root
    }

    /// Handle a single pulldown-cmark event
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.add_text(text.as_ref()),
            Event::Code(code) => self.add_inline_code(code.as_ref()),
            Event::Html(html) => self.add_raw_html(html.as_ref()),
            Event::InlineHtml(html) => self.add_raw_html(html.as_ref()),
            Event::SoftBreak => self.add_text("\n"),
            Event::HardBreak => self.add_node(Node::Element(Element::new("br"))),
            Event::Rule => self.add_node(Node::Element(Element::new("hr"))),
            Event::FootnoteReference(name) => self.add_footnote_ref(name.as_ref()),
            Event::TaskListMarker(checked) => self.add_task_marker(checked),
            Event::InlineMath(math) => self.add_math(math.as_ref(), false),
            Event::DisplayMath(math) => self.add_math(math.as_ref(), true),
        }
    }

    /// Start a new tag (push onto stack)
    fn start_tag(&mut self, tag: Tag) {
        match tag {
            Tag::CodeBlock(kind) => {
                // <pre><code class="language-x"> needs two frames
                self.push_frame(Element::new("pre"), false);
                let mut code = Element::new("code");
                if let CodeBlockKind::Fenced(lang) = kind
                    && !lang.is_empty()
                {
                    code.set_attr("class", format!("language-{lang}"));
                }
                self.push_frame(code, false);
            }
            Tag::HtmlBlock | Tag::MetadataBlock(_) => {
                self.push_frame(Element::new(""), true);
            }
            Tag::TableHead => {
                // header cells arrive directly inside TableHead with no
                // row event, so <thead><tr> needs two frames
                self.in_table_head = true;
                self.push_frame(Element::new("thead"), false);
                self.push_frame(Element::new("tr"), false);
            }
            other => {
                let element = tag_to_element(&other, self.in_table_head);
                self.push_frame(element, false);
            }
        }
    }

    fn push_frame(&mut self, element: Element, transparent: bool) {
        self.stack.push(StackFrame {
            element,
            transparent,
        });
    }

    /// End a tag (pop from stack)
    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::CodeBlock => {
                self.pop_frame();
                self.pop_frame();
            }
            TagEnd::TableHead => {
                self.in_table_head = false;
                self.pop_frame();
                self.pop_frame();
            }
            TagEnd::Heading(_) => {
                if let Some(frame) = self.stack.last_mut() {
                    anchor_heading(&mut frame.element, self.options.anchor_symbol.as_deref());
                }
                self.pop_frame();
            }
            TagEnd::Image => {
                // alt text arrives as children; fold it into the attribute
                if let Some(frame) = self.stack.last_mut() {
                    let alt = frame.element.text_content();
                    if !alt.is_empty() {
                        frame.element.set_attr("alt", alt);
                    }
                    frame.element.children.clear();
                }
                self.pop_frame();
            }
            _ => self.pop_frame(),
        }
    }

    fn pop_frame(&mut self) {
        if let Some(frame) = self.stack.pop() {
            if frame.transparent {
                for child in frame.element.children {
                    self.add_node(child);
                }
            } else {
                self.add_node(Node::Element(frame.element));
            }
        }
    }

    /// Add text content
    fn add_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.add_node(Node::Text(text.to_string()));
    }

    fn add_inline_code(&mut self, code: &str) {
        let mut elem = Element::new("code");
        elem.push(Node::Text(code.to_string()));
        self.add_node(Node::Element(elem));
    }

    /// Add raw HTML - parse with tl and convert to tree nodes
    fn add_raw_html(&mut self, html: &str) {
        let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
            // parse failed, pass the fragment through untouched
            self.add_node(Node::Raw(html.to_string()));
            return;
        };

        let parser = dom.parser();
        for handle in dom.children() {
            if let Some(node) = tl_node_to_tree(*handle, parser) {
                self.add_node(node);
            }
        }
    }

    /// Add footnote reference
    fn add_footnote_ref(&mut self, name: &str) {
        let mut sup = Element::new("sup");
        sup.set_attr("class", "footnote-ref");

        let mut link = Element::new("a");
        link.set_attr("href", format!("#fn-{name}"));
        link.set_attr("id", format!("fnref-{name}"));
        link.push(Node::Text(format!("[{name}]")));

        sup.push(Node::Element(link));
        self.add_node(Node::Element(sup));
    }

    /// Add task list marker
    fn add_task_marker(&mut self, checked: bool) {
        let mut input = Element::new("input");
        input.set_attr("type", "checkbox");
        input.set_attr("disabled", "");
        if checked {
            input.set_attr("checked", "");
        }
        self.add_node(Node::Element(input));
    }

    fn add_math(&mut self, formula: &str, display: bool) {
        let mut elem = Element::new(if display { "div" } else { "span" });
        elem.set_attr("class", if display { "math-display" } else { "math-inline" });
        elem.push(Node::Text(formula.to_string()));
        self.add_node(Node::Element(elem));
    }

    /// Add a node to current context (top of stack or root)
    fn add_node(&mut self, node: Node) {
        if let Some(frame) = self.stack.last_mut() {
            frame.element.children.push(node);
        } else {
            self.root_children.push(node);
        }
    }
}

/// Give a finished heading an id (slug of its text, unless one was set via
/// heading attributes) and optionally a trailing self-link.
fn anchor_heading(heading: &mut Element, symbol: Option<&str>) {
    let id = match heading.get_attr("id") {
        Some(id) => id.to_string(),
        None => {
            let slug = slugify(&heading.text_content());
            if slug.is_empty() {
                return;
            }
            heading.set_attr("id", slug.clone());
            slug
        }
    };

    if let Some(symbol) = symbol {
        let mut link = Element::new("a");
        link.set_attr("class", "anchor");
        link.set_attr("href", format!("#{id}"));
        link.push(Node::Text(symbol.to_string()));
        heading.push(Node::Element(link));
    }
}

/// Convert a tl node handle to a tree node
fn tl_node_to_tree(handle: tl::NodeHandle, parser: &tl::Parser) -> Option<Node> {
    let node = handle.get(parser)?;

    match node {
        tl::Node::Tag(tag) => {
            let mut elem = Element::new(tag.name().as_utf8_str().to_lowercase());

            for (key, value) in tag.attributes().iter() {
                let value = value.map(|v| v.to_string()).unwrap_or_default();
                elem.set_attr(key.as_ref(), value);
            }

            for child_handle in tag.children().top().iter() {
                if let Some(child) = tl_node_to_tree(*child_handle, parser) {
                    elem.push(child);
                }
            }

            Some(Node::Element(elem))
        }
        tl::Node::Raw(bytes) => {
            let text = bytes.as_utf8_str();
            if text.trim().is_empty() {
                None
            } else {
                Some(Node::Text(text.to_string()))
            }
        }
        // comments survive so excerpt markers stay visible in output
        tl::Node::Comment(bytes) => Some(Node::Raw(bytes.as_utf8_str().to_string())),
    }
}

/// Convert pulldown-cmark Tag to an empty element
fn tag_to_element(tag: &Tag, in_table_head: bool) -> Element {
    match tag {
        // Block elements
        Tag::Paragraph => Element::new("p"),
        Tag::Heading { level, id, .. } => {
            let mut el = Element::new(heading_level_to_tag(*level));
            if let Some(id) = id {
                el.set_attr("id", id.to_string());
            }
            el
        }
        Tag::BlockQuote(_) => Element::new("blockquote"),
        Tag::List(Some(start)) => {
            let mut el = Element::new("ol");
            if *start != 1 {
                el.set_attr("start", start.to_string());
            }
            el
        }
        Tag::List(None) => Element::new("ul"),
        Tag::Item => Element::new("li"),
        Tag::FootnoteDefinition(name) => {
            let mut el = Element::new("div");
            el.set_attr("class", "footnote");
            el.set_attr("id", format!("fn-{name}"));
            el
        }

        // Table elements
        Tag::Table(_) => Element::new("table"),
        Tag::TableRow => Element::new("tr"),
        Tag::TableCell => Element::new(if in_table_head { "th" } else { "td" }),

        // Inline elements
        Tag::Emphasis => Element::new("em"),
        Tag::Strong => Element::new("strong"),
        Tag::Strikethrough => Element::new("del"),
        Tag::Link {
            dest_url, title, ..
        } => {
            let mut el = Element::new("a");
            el.set_attr("href", dest_url.to_string());
            if !title.is_empty() {
                el.set_attr("title", title.to_string());
            }
            el
        }
        Tag::Image {
            dest_url, title, ..
        } => {
            let mut el = Element::new("img");
            el.set_attr("src", dest_url.to_string());
            if !title.is_empty() {
                el.set_attr("title", title.to_string());
            }
            el
        }

        // Definition list (extended syntax)
        Tag::DefinitionList => Element::new("dl"),
        Tag::DefinitionListTitle => Element::new("dt"),
        Tag::DefinitionListDefinition => Element::new("dd"),

        // Extended inline elements
        Tag::Superscript => Element::new("sup"),
        Tag::Subscript => Element::new("sub"),

        // handled by start_tag before reaching here
        Tag::CodeBlock(_) | Tag::HtmlBlock | Tag::MetadataBlock(_) | Tag::TableHead => {
            Element::new("")
        }
    }
}

/// Convert heading level to tag name
fn heading_level_to_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

/// Convert a markdown string into a tree rooted at `wrapper`.
pub fn from_markdown(markdown: &str, wrapper: &str, options: &MarkdownOptions) -> Element {
    MarkdownConverter::new(options).convert(markdown, wrapper)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(md: &str) -> Element {
        from_markdown(md, "div", &MarkdownOptions::all())
    }

    fn first_element(root: &Element) -> &Element {
        match &root.children[0] {
            Node::Element(el) => el,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_basic_paragraph() {
        let root = convert("Hello world");
        assert_eq!(root.tag, "div");
        assert_eq!(first_element(&root).tag, "p");
    }

    #[test]
    fn test_heading_gets_slug_id() {
        let root = convert("# Hello, World!");
        let h1 = first_element(&root);
        assert_eq!(h1.tag, "h1");
        assert_eq!(h1.get_attr("id"), Some("hello-world"));
    }

    #[test]
    fn test_heading_anchor_link() {
        let mut options = MarkdownOptions::all();
        options.anchor_symbol = Some("#".to_string());
        let root = from_markdown("## Section", "div", &options);
        let h2 = first_element(&root);
        let Some(Node::Element(anchor)) = h2.children.last() else {
            panic!("expected anchor link");
        };
        assert_eq!(anchor.tag, "a");
        assert_eq!(anchor.get_attr("href"), Some("#section"));
        assert_eq!(anchor.get_attr("class"), Some("anchor"));
    }

    #[test]
    fn test_explicit_heading_id_wins() {
        let root = convert("# Custom {#my-id}");
        assert_eq!(first_element(&root).get_attr("id"), Some("my-id"));
    }

    #[test]
    fn test_code_block_double_frame() {
        let root = convert("```rust\nlet a = 1;\n```");
        let pre = first_element(&root);
        assert_eq!(pre.tag, "pre");
        let Node::Element(code) = &pre.children[0] else {
            panic!("expected code child");
        };
        assert_eq!(code.get_attr("class"), Some("language-rust"));
        assert_eq!(code.text_content(), "let a = 1;\n");
    }

    #[test]
    fn test_link_and_image() {
        let root = convert("[text](./other.md)\n\n![alt text](./pic.png)");
        let p1 = first_element(&root);
        let Node::Element(a) = &p1.children[0] else {
            panic!()
        };
        assert_eq!(a.get_attr("href"), Some("./other.md"));

        let Node::Element(p2) = &root.children[1] else {
            panic!()
        };
        let Node::Element(img) = &p2.children[0] else {
            panic!()
        };
        assert_eq!(img.get_attr("src"), Some("./pic.png"));
        assert_eq!(img.get_attr("alt"), Some("alt text"));
        assert!(img.children.is_empty());
    }

    #[test]
    fn test_raw_html_parsed_into_elements() {
        let root = convert("before\n\n<div class=\"note\"><b>hi</b></div>\n\nafter");
        let has_note = root.children.iter().any(|n| {
            matches!(n, Node::Element(el) if el.tag == "div" && el.get_attr("class") == Some("note"))
        });
        assert!(has_note);
    }

    #[test]
    fn test_more_comment_survives() {
        let root = convert("lead\n\n<!-- more -->\n\ntail");
        let has_marker = root
            .children
            .iter()
            .any(|n| matches!(n, Node::Raw(raw) if raw.contains("more")));
        assert!(has_marker);
    }

    #[test]
    fn test_table_head_cells() {
        let root = convert("| a | b |\n| - | - |\n| 1 | 2 |");
        let table = first_element(&root);
        assert_eq!(table.tag, "table");
        let Node::Element(thead) = &table.children[0] else {
            panic!()
        };
        assert_eq!(thead.tag, "thead");
        let Node::Element(tr) = &thead.children[0] else {
            panic!()
        };
        assert!(matches!(&tr.children[0], Node::Element(th) if th.tag == "th"));
    }

    #[test]
    fn test_nested_list() {
        let root = convert("- Item 1\n  - Nested\n- Item 2");
        assert_eq!(first_element(&root).tag, "ul");
    }
}
