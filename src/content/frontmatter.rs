//! Front-matter extraction.
//!
//! Two header dialects are recognized at the very start of a file:
//!
//! - `---` fences with simple `key: value` lines
//! - `+++` fences containing a TOML document
//!
//! Files without a header parse to an empty mapping and an untouched body.

use crate::content::JsonMap;

/// Split a source file into its front-matter mapping and remaining body.
///
/// Returns an error message (no path context; the caller attaches it) when
/// the header is present but malformed.
pub fn split_frontmatter(text: &str) -> Result<(JsonMap, &str), String> {
    if let Some(rest) = text.strip_prefix("---\n") {
        let (header, body) = close_fence(rest, "---")?;
        return Ok((parse_simple_yaml(header)?, body));
    }
    if let Some(rest) = text.strip_prefix("+++\n") {
        let (header, body) = close_fence(rest, "+++")?;
        let table: toml::Table = toml::from_str(header).map_err(|e| e.to_string())?;
        let map = table
            .into_iter()
            .map(|(k, v)| (k, toml_to_json(v)))
            .collect();
        return Ok((map, body));
    }
    Ok((JsonMap::new(), text))
}

/// Find the closing fence line; returns (header, body-after-fence).
fn close_fence<'a>(rest: &'a str, fence: &str) -> Result<(&'a str, &'a str), String> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == fence {
            let header = &rest[..offset];
            let body = rest[offset + line.len()..].trim_start_matches('\n');
            return Ok((header, body));
        }
        offset += line.len();
    }
    Err(format!("unclosed `{fence}` front-matter fence"))
}

/// Parse `key: value` lines. Nested structures are out of scope; values
/// are coerced to JSON scalars or inline arrays.
fn parse_simple_yaml(header: &str) -> Result<JsonMap, String> {
    let mut map = JsonMap::new();
    for line in header.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(format!("expected `key: value`, got `{trimmed}`"));
        };
        map.insert(key.trim().to_string(), parse_scalar(value.trim()));
    }
    Ok(map)
}

/// Coerce a raw value string into the closest JSON value.
fn parse_scalar(raw: &str) -> serde_json::Value {
    use serde_json::Value;

    if raw.is_empty() {
        return Value::Null;
    }
    if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        let items = inner
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_scalar)
            .collect();
        return Value::Array(items);
    }
    if let Some(stripped) = strip_quotes(raw) {
        return Value::String(stripped.to_string());
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = raw.parse::<f64>()
        && let Some(n) = serde_json::Number::from_f64(f)
    {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

fn strip_quotes(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    if raw.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[raw.len() - 1] == bytes[0]
    {
        Some(&raw[1..raw.len() - 1])
    } else {
        None
    }
}

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
