//! Link rewriting.
//!
//! - `href="#"` placeholders are unwrapped: the anchor disappears and its
//!   children take its place
//! - external links open in a new tab
//! - relative `.md` links lose their extension so the client router can
//!   resolve them; in excerpt renders they are additionally resolved to an
//!   absolute post URL, because the excerpt is hosted on a listing page
//!   where relative paths point nowhere

use std::path::PathBuf;
use std::sync::Arc;

use super::{BlogHook, FileContext, HookError};
use crate::cache::RenderCache;
use crate::config::BlogConfig;
use crate::content::{DocKind, SourceDoc};
use crate::dom::{Element, Node};
use crate::utils::lexical_join;

pub struct ChangeHref {
    posts_dir: PathBuf,
    href_prefix: String,
    cache: Arc<RenderCache>,
}

impl ChangeHref {
    pub fn new(config: &BlogConfig, cache: Arc<RenderCache>) -> Self {
        Self {
            posts_dir: config.posts_dir(),
            href_prefix: config.hooks.post_href_prefix.clone(),
            cache,
        }
    }

    fn rewrite(&self, link: &mut Element, ctx: &FileContext, kind: DocKind) {
        let Some(href) = link.get_attr("href").map(str::to_string) else {
            return;
        };

        if is_external(&href) {
            link.set_attr("target", "_blank");
            link.set_attr("rel", "noopener noreferrer");
            return;
        }

        let (path, fragment) = split_fragment(&href);
        if !path.ends_with(".md") || path.starts_with('/') {
            return;
        }

        let new_href = match kind {
            DocKind::Full => format!("{}{fragment}", path.trim_end_matches(".md")),
            DocKind::Excerpt => self
                .resolve_post(path, ctx)
                .map(|route| format!("{route}{fragment}"))
                .unwrap_or_else(|| format!("{}{fragment}", path.trim_end_matches(".md"))),
        };
        link.set_attr("href", new_href);
    }

    /// Resolve a relative post link to its absolute route, if the target
    /// is a known document.
    fn resolve_post(&self, rel: &str, ctx: &FileContext) -> Option<String> {
        let base = ctx.file.parent()?;
        let target = lexical_join(base, rel);
        self.cache.doc(&target)?;

        let route = target
            .strip_prefix(&self.posts_dir)
            .ok()?
            .with_extension("");
        Some(format!(
            "{}/{}",
            self.href_prefix,
            route.to_string_lossy().replace('\\', "/")
        ))
    }
}

impl BlogHook for ChangeHref {
    fn name(&self) -> &'static str {
        "change-href"
    }

    fn before_write_html(
        &self,
        root: &mut Element,
        ctx: &FileContext,
        doc: &SourceDoc,
    ) -> Result<(), HookError> {
        unwrap_placeholder_anchors(root);
        root.for_each_element_mut(&mut |el| {
            if el.tag == "a" {
                self.rewrite(el, ctx, doc.kind);
            }
        });
        Ok(())
    }
}

/// Splice `<a href="#">…</a>` placeholders out of the tree, keeping their
/// children in place.
fn unwrap_placeholder_anchors(el: &mut Element) {
    let mut rebuilt = Vec::new();
    for mut child in el.children.drain(..) {
        if let Node::Element(inner) = &mut child {
            unwrap_placeholder_anchors(inner);
            if inner.tag == "a" && inner.get_attr("href") == Some("#") {
                rebuilt.extend(inner.children.drain(..));
                continue;
            }
        }
        rebuilt.push(child);
    }
    el.children = rebuilt;
}

fn is_external(href: &str) -> bool {
    href.starts_with("http://")
        || href.starts_with("https://")
        || href.starts_with("//")
        || href.starts_with("mailto:")
}

fn split_fragment(href: &str) -> (&str, &str) {
    match href.find('#') {
        Some(pos) => (&href[..pos], &href[pos..]),
        None => (href, ""),
    }
}
