//! Excerpt derivation.

use regex::Regex;
use std::sync::LazyLock;

/// Marker splitting the lead text from the rest of a post.
const MORE_MARKER: &str = "<!-- more -->";

/// Footnote and link-reference definition lines (`[label]: target`).
///
/// Labels starting with `^` are skipped here because pulldown-cmark only
/// resolves `[^label]` footnotes against the full document anyway.
static REFERENCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\[[^\^\]][^\]]*\]:.+$").unwrap());

/// Extract the excerpt from a post body.
///
/// Takes the text before the `<!-- more -->` marker and appends every
/// link-reference definition found anywhere in the body, so links in the
/// lead still resolve when the excerpt is rendered on its own. Without a
/// marker the excerpt is the whole body.
pub fn extract_excerpt(body: &str) -> String {
    let lead = body.split(MORE_MARKER).next().unwrap_or(body);

    let mut parts: Vec<&str> = vec![lead.trim_end()];
    for m in REFERENCE_LINE.find_iter(body) {
        let line = m.as_str().trim_end();
        if !lead.contains(line) {
            parts.push(line);
        }
    }
    parts.join("\n")
}
