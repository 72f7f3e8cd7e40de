//! Tag renaming.
//!
//! Replaces element names according to the `[hooks.tag_map]` config table,
//! e.g. mapping `img` to a lazy-loading component. Children and attributes
//! are untouched.

use rustc_hash::FxHashMap;

use super::{BlogHook, FileContext, HookError};
use crate::config::BlogConfig;
use crate::content::SourceDoc;
use crate::dom::Element;

pub struct ChangeTag {
    map: FxHashMap<String, String>,
}

impl ChangeTag {
    pub fn new(config: &BlogConfig) -> Self {
        Self {
            map: config.hooks.tag_map.clone(),
        }
    }
}

impl BlogHook for ChangeTag {
    fn name(&self) -> &'static str {
        "change-tag"
    }

    fn before_write_html(
        &self,
        root: &mut Element,
        _ctx: &FileContext,
        _doc: &SourceDoc,
    ) -> Result<(), HookError> {
        if self.map.is_empty() {
            return Ok(());
        }
        root.for_each_element_mut(&mut |el| {
            if let Some(new_tag) = self.map.get(&el.tag) {
                el.tag = new_tag.clone();
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::parse_doc;
    use crate::dom::Node;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_tags_renamed_recursively() {
        let mut config = BlogConfig::default();
        config
            .hooks
            .tag_map
            .insert("img".to_string(), "v-lazy-image".to_string());
        let hook = ChangeTag::new(&config);

        let mut root = Element::new("div");
        let mut p = Element::new("p");
        let mut img = Element::new("img");
        img.set_attr("src", "/a.png");
        p.push(Node::Element(img));
        root.push(Node::Element(p));

        let ctx = FileContext {
            file: PathBuf::from("/site/posts/a.md"),
            out_file: PathBuf::from("/site/.blog/posts/a.vue"),
        };
        let doc = parse_doc(Path::new("/site/posts/a.md"), "body", 1).unwrap();
        hook.before_write_html(&mut root, &ctx, &doc).unwrap();

        let Node::Element(p) = &root.children[0] else {
            panic!()
        };
        let Node::Element(renamed) = &p.children[0] else {
            panic!()
        };
        assert_eq!(renamed.tag, "v-lazy-image");
        assert_eq!(renamed.get_attr("src"), Some("/a.png"));
    }
}
