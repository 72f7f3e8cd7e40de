//! Image source rebasing.
//!
//! Components are emitted into the output directory, so an `src` that was
//! relative to the markdown file no longer resolves. Relative sources are
//! rebased to root-absolute paths under the project root, which the dev
//! server and bundler both understand.

use std::path::PathBuf;

use super::{BlogHook, FileContext, HookError};
use crate::config::BlogConfig;
use crate::content::SourceDoc;
use crate::dom::Element;
use crate::utils::lexical_join;

pub struct ChangeImageSrc {
    project_root: PathBuf,
}

impl ChangeImageSrc {
    pub fn new(config: &BlogConfig) -> Self {
        Self {
            project_root: config.root.clone(),
        }
    }

    fn rebase(&self, img: &mut Element, ctx: &FileContext) {
        let Some(src) = img.get_attr("src") else {
            return;
        };
        if !is_relative(src) {
            return;
        }
        let Some(base) = ctx.file.parent() else {
            return;
        };

        let absolute = lexical_join(base, src);
        if let Ok(rel) = absolute.strip_prefix(&self.project_root) {
            img.set_attr("src", format!("/{}", rel.to_string_lossy().replace('\\', "/")));
        }
    }
}

impl BlogHook for ChangeImageSrc {
    fn name(&self) -> &'static str {
        "change-image-src"
    }

    fn before_write_html(
        &self,
        root: &mut Element,
        ctx: &FileContext,
        _doc: &SourceDoc,
    ) -> Result<(), HookError> {
        root.for_each_element_mut(&mut |el| {
            if el.tag == "img" {
                self.rebase(el, ctx);
            }
        });
        Ok(())
    }
}

fn is_relative(src: &str) -> bool {
    !(src.starts_with('/')
        || src.starts_with("http://")
        || src.starts_with("https://")
        || src.starts_with("//")
        || src.starts_with("data:"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::parse_doc;
    use crate::dom::Node;
    use std::path::Path;

    fn setup() -> (ChangeImageSrc, FileContext, SourceDoc) {
        let mut config = BlogConfig::default();
        config.root = PathBuf::from("/site");
        let hook = ChangeImageSrc::new(&config);
        let ctx = FileContext {
            file: PathBuf::from("/site/posts/2024/a.md"),
            out_file: PathBuf::from("/site/.blog/posts/2024/a.vue"),
        };
        let doc = parse_doc(Path::new("/site/posts/2024/a.md"), "body", 1).unwrap();
        (hook, ctx, doc)
    }

    fn image(src: &str) -> Element {
        let mut root = Element::new("div");
        let mut img = Element::new("img");
        img.set_attr("src", src);
        root.push(Node::Element(img));
        root
    }

    fn src_of(root: &Element) -> &str {
        let Node::Element(img) = &root.children[0] else {
            panic!("expected img");
        };
        img.get_attr("src").unwrap()
    }

    #[test]
    fn test_relative_src_rebased() {
        let (hook, ctx, doc) = setup();
        let mut root = image("./cover.png");
        hook.before_write_html(&mut root, &ctx, &doc).unwrap();
        assert_eq!(src_of(&root), "/posts/2024/cover.png");
    }

    #[test]
    fn test_parent_relative_src_rebased() {
        let (hook, ctx, doc) = setup();
        let mut root = image("../assets/pic.jpg");
        hook.before_write_html(&mut root, &ctx, &doc).unwrap();
        assert_eq!(src_of(&root), "/posts/assets/pic.jpg");
    }

    #[test]
    fn test_absolute_and_remote_untouched() {
        let (hook, ctx, doc) = setup();
        for src in ["/already/abs.png", "https://cdn.example.com/x.png", "data:image/png;base64,AA=="] {
            let mut root = image(src);
            hook.before_write_html(&mut root, &ctx, &doc).unwrap();
            assert_eq!(src_of(&root), src);
        }
    }
}
