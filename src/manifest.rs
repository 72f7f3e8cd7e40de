//! Post manifest generation.
//!
//! The manifest is a generated TypeScript entry file importing every
//! excerpt component and exporting them date-descending, ready for a
//! listing page to iterate. Output is byte-stable for a given post set so
//! repeated builds never dirty the file.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::config::BlogConfig;
use crate::content::JsonMap;
use crate::debug;
use crate::utils::relative_to;

/// One post's contribution to the manifest.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    /// Absolute source path; also the sort tie-breaker.
    pub source: PathBuf,
    /// Absolute path of the excerpt component to import.
    pub excerpt_component: PathBuf,
    /// Merged front-matter, embedded as metadata.
    pub matter: JsonMap,
}

impl ManifestEntry {
    fn date(&self) -> Option<&str> {
        self.matter.get("date").and_then(|v| v.as_str())
    }
}

pub struct Manifest {
    out_dir: PathBuf,
    entry_path: PathBuf,
    posts_dir: PathBuf,
    href_prefix: String,
}

impl Manifest {
    pub fn new(config: &BlogConfig) -> Self {
        let out_dir = config.out_dir();
        Self {
            entry_path: out_dir.join(&config.build.entry_file),
            out_dir,
            posts_dir: config.posts_dir(),
            href_prefix: config.hooks.post_href_prefix.clone(),
        }
    }

    pub fn entry_path(&self) -> &Path {
        &self.entry_path
    }

    /// Render the manifest source for the given entries.
    pub fn generate(&self, entries: &mut Vec<ManifestEntry>) -> String {
        sort_by_date_desc(entries);

        let mut imports = String::new();
        let mut posts = String::new();

        for entry in entries.iter() {
            let ident = component_ident(&entry.source);
            let import_path = self.import_path(&entry.excerpt_component);
            imports.push_str(&format!("import {ident} from \"{import_path}\"\n"));

            let route = self.route(&entry.source);
            let frontmatter =
                serde_json::to_string(&entry.matter).unwrap_or_else(|_| "{}".to_string());
            posts.push_str(&format!(
                "  {{ path: {}, frontmatter: {frontmatter}, component: {ident} }},\n",
                json!(route)
            ));
        }

        format!(
            "// Generated by blogdown. Do not edit.\n{imports}\nexport const posts = [\n{posts}]\n\nexport default posts\n"
        )
    }

    /// Write the manifest, skipping the write when nothing changed.
    pub fn write(&self, entries: &mut Vec<ManifestEntry>) -> io::Result<bool> {
        let text = self.generate(entries);
        if fs::read_to_string(&self.entry_path).is_ok_and(|old| old == text) {
            return Ok(false);
        }
        if let Some(parent) = self.entry_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.entry_path, text)?;
        debug!("manifest"; "wrote {} entries", entries.len());
        Ok(true)
    }

    fn import_path(&self, component: &Path) -> String {
        let rel = relative_to(component, &self.out_dir);
        let rel = rel.to_string_lossy().replace('\\', "/");
        if rel.starts_with("..") {
            rel
        } else {
            format!("./{rel}")
        }
    }

    fn route(&self, source: &Path) -> String {
        let rel = source
            .strip_prefix(&self.posts_dir)
            .unwrap_or(source)
            .with_extension("");
        format!(
            "{}/{}",
            self.href_prefix,
            rel.to_string_lossy().replace('\\', "/")
        )
    }
}

/// Newest first; posts without a date sort after dated ones, ties fall
/// back to the source path so the order is total.
fn sort_by_date_desc(entries: &mut [ManifestEntry]) {
    entries.sort_by(|a, b| match (a.date(), b.date()) {
        (Some(da), Some(db)) => db.cmp(da).then_with(|| a.source.cmp(&b.source)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.source.cmp(&b.source),
    });
}

/// Stable import identifier derived from the source path.
fn component_ident(source: &Path) -> String {
    let digest = blake3::hash(source.to_string_lossy().as_bytes());
    format!("Post_{}", &hex::encode(digest.as_bytes())[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, date: Option<&str>) -> ManifestEntry {
        let mut matter = JsonMap::new();
        matter.insert("title".into(), name.into());
        if let Some(date) = date {
            matter.insert("date".into(), date.into());
        }
        ManifestEntry {
            source: PathBuf::from(format!("/site/posts/{name}.md")),
            excerpt_component: PathBuf::from(format!("/site/.blog/excerpts/{name}.vue")),
            matter,
        }
    }

    fn manifest() -> Manifest {
        let mut config = BlogConfig::default();
        config.root = PathBuf::from("/site");
        Manifest::new(&config)
    }

    #[test]
    fn test_sorted_newest_first_undated_last() {
        let mut entries = vec![
            entry("old", Some("2023-01-01")),
            entry("undated", None),
            entry("new", Some("2024-06-01")),
            entry("mid", Some("2024-01-01")),
        ];
        sort_by_date_desc(&mut entries);
        let names: Vec<&str> = entries
            .iter()
            .map(|e| e.matter.get("title").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["new", "mid", "old", "undated"]);
    }

    #[test]
    fn test_same_date_ties_broken_by_path() {
        let mut entries = vec![
            entry("b", Some("2024-01-01")),
            entry("a", Some("2024-01-01")),
        ];
        sort_by_date_desc(&mut entries);
        assert!(entries[0].source.ends_with("a.md"));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let m = manifest();
        let mut entries = vec![entry("a", Some("2024-01-01")), entry("b", None)];
        let first = m.generate(&mut entries.clone());
        let second = m.generate(&mut entries);
        assert_eq!(first, second);
    }

    #[test]
    fn test_generated_shape() {
        let m = manifest();
        let mut entries = vec![entry("hello", Some("2024-01-01"))];
        let text = m.generate(&mut entries);
        assert!(text.contains("from \"./excerpts/hello.vue\""));
        assert!(text.contains("path: \"/post/hello\""));
        assert!(text.contains("\"title\":\"hello\""));
        assert!(text.contains("export default posts"));
    }

    #[test]
    fn test_write_skips_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BlogConfig::default();
        config.root = dir.path().to_path_buf();
        let m = Manifest::new(&config);

        let mut entries = vec![entry("a", Some("2024-01-01"))];
        assert!(m.write(&mut entries).unwrap());
        assert!(!m.write(&mut entries).unwrap());
    }
}
