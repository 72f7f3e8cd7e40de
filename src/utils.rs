//! Path and naming utilities.
//!
//! Pure functions for path manipulation. No side effects.

use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Rebase `source` from `root` into `out_dir`, swapping its extension.
///
/// `posts/hello.md` under root becomes `<out_dir>/posts/hello.vue`.
/// Sources outside `root` fall back to their file name only.
pub fn rebase_with_ext(source: &Path, root: &Path, out_dir: &Path, ext: &str) -> PathBuf {
    let rel = source
        .strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(source.file_name().unwrap_or_default()));
    out_dir.join(rel.with_extension(ext))
}

/// Compute `path` relative to `base`, using `..` segments where needed.
///
/// Both paths must be absolute (or share the same anchoring); used for
/// emitting import paths relative to the manifest's own directory.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path_comps: Vec<Component> = path.components().collect();
    let base_comps: Vec<Component> = base.components().collect();

    let common = path_comps
        .iter()
        .zip(base_comps.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base_comps.len() {
        rel.push("..");
    }
    for comp in &path_comps[common..] {
        rel.push(comp);
    }
    rel
}

/// Join a relative path onto a base directory, resolving `.` and `..`
/// lexically (no file system access).
pub fn lexical_join(base: &Path, rel: &str) -> PathBuf {
    let mut out = base.to_path_buf();
    for comp in Path::new(rel).components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(c) => out.push(c),
            Component::RootDir | Component::Prefix(_) => out = PathBuf::from(comp.as_os_str()),
        }
    }
    out
}

/// Slugify a heading into a URL-safe anchor id.
///
/// Transliterates unicode, lowercases, and collapses runs of
/// non-alphanumeric characters into single hyphens.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode::deunicode(text);
    let mut slug = String::with_capacity(ascii.len());
    let mut prev_dash = true; // suppress leading dash
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// File modification time as milliseconds since the Unix epoch.
///
/// The sole staleness signal for the content store; sub-millisecond
/// precision is deliberately discarded so the value round-trips through
/// the persisted cache snapshot.
pub fn mtime_millis(meta: &std::fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebase_with_ext() {
        let out = rebase_with_ext(
            Path::new("/site/posts/2024/hello.md"),
            Path::new("/site"),
            Path::new("/site/.blog"),
            "vue",
        );
        assert_eq!(out, PathBuf::from("/site/.blog/posts/2024/hello.vue"));
    }

    #[test]
    fn test_rebase_outside_root_uses_file_name() {
        let out = rebase_with_ext(
            Path::new("/elsewhere/post.md"),
            Path::new("/site"),
            Path::new("/site/.blog"),
            "vue",
        );
        assert_eq!(out, PathBuf::from("/site/.blog/post.vue"));
    }

    #[test]
    fn test_relative_to_sibling() {
        let rel = relative_to(
            Path::new("/site/.blog/posts/hello.vue"),
            Path::new("/site/.blog/excerpts"),
        );
        assert_eq!(rel, PathBuf::from("../posts/hello.vue"));
    }

    #[test]
    fn test_relative_to_child() {
        let rel = relative_to(
            Path::new("/site/.blog/excerpts/hello.vue"),
            Path::new("/site/.blog/excerpts"),
        );
        assert_eq!(rel, PathBuf::from("hello.vue"));
    }

    #[test]
    fn test_lexical_join() {
        assert_eq!(
            lexical_join(Path::new("/site/posts/2024"), "../other.md"),
            PathBuf::from("/site/posts/other.md")
        );
        assert_eq!(
            lexical_join(Path::new("/site/posts"), "./a/b.md"),
            PathBuf::from("/site/posts/a/b.md")
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rust & Vue  "), "rust-vue");
        assert_eq!(slugify("Déjà vu"), "deja-vu");
        assert_eq!(slugify("!!!"), "");
    }
}
