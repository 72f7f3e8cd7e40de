//! Markup rewrite hooks.
//!
//! Hooks run between markdown conversion and serialization, mutating the
//! tree in place. They run in registration order; the first failure aborts
//! the render of that file (other files are unaffected).

mod links;
mod media;
mod tags;

pub use links::ChangeHref;
pub use media::ChangeImageSrc;
pub use tags::ChangeTag;

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::RenderCache;
use crate::config::BlogConfig;
use crate::content::SourceDoc;
use crate::dom::Element;

/// Paths of the file currently being rendered.
#[derive(Debug, Clone)]
pub struct FileContext {
    /// Absolute source path.
    pub file: PathBuf,
    /// Absolute output component path.
    pub out_file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
#[error("hook `{hook}` failed: {message}")]
pub struct HookError {
    pub hook: &'static str,
    pub message: String,
}

impl HookError {
    pub fn new(hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            hook,
            message: message.into(),
        }
    }
}

/// A tree rewrite applied before the rendered markup is serialized.
pub trait BlogHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn before_write_html(
        &self,
        root: &mut Element,
        ctx: &FileContext,
        doc: &SourceDoc,
    ) -> Result<(), HookError>;
}

/// The default hook chain: link rewriting, image rebasing, tag renaming.
pub fn builtin_hooks(config: &BlogConfig, cache: Arc<RenderCache>) -> Vec<Box<dyn BlogHook>> {
    vec![
        Box::new(ChangeHref::new(config, cache)),
        Box::new(ChangeImageSrc::new(config)),
        Box::new(ChangeTag::new(config)),
    ]
}
