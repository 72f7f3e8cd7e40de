//! Markdown to single-file-component rendering.
//!
//! A render is a pure function of the parsed document: markdown becomes a
//! markup tree, the hook chain rewrites it, and the result is assembled
//! into `<template>` / `<script setup>` / custom blocks. Running the same
//! document twice yields byte-identical output, which is what makes the
//! fingerprint cache sound.

mod markdown;

pub use markdown::{MarkdownOptions, from_markdown};

use serde_json::json;

use crate::config::BlogConfig;
use crate::content::SourceDoc;
use crate::dom::{Node, render_node};
use crate::hooks::{BlogHook, FileContext, HookError};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("failed to serialize front-matter: {0}")]
    Json(#[from] serde_json::Error),
}

/// The three pieces of a rendered component, assembled by [`RenderedUnit::assemble`].
#[derive(Debug, Clone)]
pub struct RenderedUnit {
    /// Serialized markup, already wrapped in the container tag.
    pub html: String,
    /// `<script setup>` block carrying the merged front-matter.
    pub script: String,
    /// Auxiliary blocks (`<route>` when the document declares a layout).
    pub blocks: Vec<String>,
}

impl RenderedUnit {
    /// Join the blocks into the final component text.
    pub fn assemble(&self) -> String {
        let mut parts = vec![format!("<template>{}</template>", self.html), self.script.clone()];
        parts.extend(self.blocks.iter().cloned());
        parts.join("\n")
    }
}

pub struct Renderer {
    options: MarkdownOptions,
    wrapper: String,
    hooks: Vec<Box<dyn BlogHook>>,
}

impl Renderer {
    pub fn new(config: &BlogConfig, hooks: Vec<Box<dyn BlogHook>>) -> Self {
        let mut options = MarkdownOptions::all();
        if !config.build.anchor_symbol.is_empty() {
            options.anchor_symbol = Some(config.build.anchor_symbol.clone());
        }
        Self {
            options,
            wrapper: config.build.wrapper.clone(),
            hooks,
        }
    }

    /// Render a document into its component parts.
    pub fn render(&self, doc: &SourceDoc, ctx: &FileContext) -> Result<RenderedUnit, RenderError> {
        let mut root = from_markdown(&doc.content, &self.wrapper, &self.options);
        root.set_attr("v-bind", "frontmatter");

        for hook in &self.hooks {
            hook.before_write_html(&mut root, ctx, doc)?;
        }

        let mut html = String::new();
        render_node(&Node::Element(root), &mut html);

        let frontmatter = doc.merged_matter();
        let script = format!(
            "<script setup>\nconst frontmatter = {}\n</script>",
            serde_json::to_string(&frontmatter)?
        );

        let mut blocks = Vec::new();
        if let Some(layout) = doc.layout() {
            let route = json!({ "meta": { "layout": layout } });
            blocks.push(format!("<route lang=\"json\">\n{route}\n</route>"));
        }

        Ok(RenderedUnit {
            html,
            script,
            blocks,
        })
    }
}
