//! Dense, indentation-based text encoding for structured prompt sections
//!
//! Nested JSON spends most of its tokens on braces, quotes and repeated keys.
//! This encoding writes objects as `key: value` lines, primitive arrays inline
//! as `key[N]: a,b,c`, and arrays of uniform flat objects as a table:
//!
//! ```text
//! moves[2]{id,power}:
//!   surf,90
//!   icebeam,90
//! ```
//!
//! Anything else becomes a `- ` list. Strings are quoted only when they would
//! otherwise be ambiguous.

use serde_json::{Map, Value};
use thiserror::Error;

const INDENT: &str = "  ";

/// Nesting beyond this is refused; callers fall back to plain JSON text
pub const MAX_DEPTH: usize = 16;

#[derive(Error, Debug, PartialEq)]
pub enum CompactError {
    #[error("value nested deeper than {max} levels")]
    TooDeep { max: usize },
}

/// Encode a value; fails only on pathological nesting
pub fn encode(value: &Value) -> Result<String, CompactError> {
    let mut lines = Vec::new();
    match value {
        Value::Object(map) => write_object(map, 0, &mut lines)?,
        Value::Array(items) => write_array("", items, 0, &mut lines)?,
        scalar => lines.push(scalar_text(scalar)),
    }
    Ok(lines.join("\n"))
}

/// Encode with the compact form, falling back to pretty JSON
pub fn encode_or_plain(value: &Value) -> String {
    match encode(value) {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!("Compact encoding failed ({}), using plain JSON", err);
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
    }
}

fn check_depth(depth: usize) -> Result<(), CompactError> {
    if depth > MAX_DEPTH {
        Err(CompactError::TooDeep { max: MAX_DEPTH })
    } else {
        Ok(())
    }
}

fn write_object(
    map: &Map<String, Value>,
    depth: usize,
    lines: &mut Vec<String>,
) -> Result<(), CompactError> {
    check_depth(depth)?;
    let pad = INDENT.repeat(depth);

    for (key, value) in map {
        let key = key_text(key);
        match value {
            Value::Object(inner) if inner.is_empty() => lines.push(format!("{pad}{key}: {{}}")),
            Value::Object(inner) => {
                lines.push(format!("{pad}{key}:"));
                write_object(inner, depth + 1, lines)?;
            }
            Value::Array(items) => write_array(&key, items, depth, lines)?,
            scalar => lines.push(format!("{pad}{key}: {}", scalar_text(scalar))),
        }
    }
    Ok(())
}

fn write_array(
    label: &str,
    items: &[Value],
    depth: usize,
    lines: &mut Vec<String>,
) -> Result<(), CompactError> {
    check_depth(depth)?;
    let pad = INDENT.repeat(depth);
    let n = items.len();

    if items.iter().all(is_primitive) {
        let row: Vec<String> = items.iter().map(scalar_text).collect();
        if row.is_empty() {
            lines.push(format!("{pad}{label}[0]:"));
        } else {
            lines.push(format!("{pad}{label}[{n}]: {}", row.join(",")));
        }
        return Ok(());
    }

    if let Some(fields) = tabular_fields(items) {
        let header: Vec<String> = fields.iter().map(|f| key_text(f)).collect();
        lines.push(format!("{pad}{label}[{n}]{{{}}}:", header.join(",")));
        for item in items.iter().filter_map(Value::as_object) {
            let row: Vec<String> = fields
                .iter()
                .map(|f| item.get(*f).map(scalar_text).unwrap_or_default())
                .collect();
            lines.push(format!("{pad}{INDENT}{}", row.join(",")));
        }
        return Ok(());
    }

    lines.push(format!("{pad}{label}[{n}]:"));
    for item in items {
        write_list_item(item, depth + 1, lines)?;
    }
    Ok(())
}

fn write_list_item(item: &Value, depth: usize, lines: &mut Vec<String>) -> Result<(), CompactError> {
    check_depth(depth)?;
    let pad = INDENT.repeat(depth);

    let mut nested = Vec::new();
    match item {
        Value::Object(map) if !map.is_empty() => write_object(map, depth + 1, &mut nested)?,
        Value::Array(inner) if !inner.is_empty() => write_array("", inner, depth + 1, &mut nested)?,
        scalar => {
            lines.push(format!("{pad}- {}", scalar_text(scalar)));
            return Ok(());
        }
    }

    // The dash takes the place of one indent level on the first line
    if let Some(first) = nested.first_mut() {
        *first = format!("{pad}- {}", first.trim_start());
    }
    lines.extend(nested);
    Ok(())
}

/// Shared key order when every item is a non-empty flat object with the same keys
fn tabular_fields(items: &[Value]) -> Option<Vec<&str>> {
    let first = items.first()?.as_object()?;
    if first.is_empty() {
        return None;
    }
    let fields: Vec<&str> = first.keys().map(String::as_str).collect();

    for item in items {
        let obj = item.as_object()?;
        if obj.len() != fields.len() {
            return None;
        }
        for field in &fields {
            if !obj.get(*field).is_some_and(is_primitive) {
                return None;
            }
        }
    }
    Some(fields)
}

fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => string_text(s),
        Value::Array(_) => "[]".to_string(),
        Value::Object(_) => "{}".to_string(),
    }
}

fn string_text(s: &str) -> String {
    if needs_quotes(s) {
        Value::String(s.to_string()).to_string()
    } else {
        s.to_string()
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.trim() != s
        || matches!(s, "true" | "false" | "null" | "-")
        || s.starts_with("- ")
        || s.parse::<f64>().is_ok()
        || s
            .chars()
            .any(|c| matches!(c, ',' | ':' | '"' | '\\' | '[' | ']' | '{' | '}') || c.is_control())
}

fn key_text(key: &str) -> String {
    let mut chars = key.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        }
        _ => false,
    };
    if plain {
        key.to_string()
    } else {
        Value::String(key.to_string()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_object() {
        let text = encode(&json!({"species": "Kyogre", "level": 50, "hp": "72.5%"})).unwrap();
        assert_eq!(text, "hp: 72.5%\nlevel: 50\nspecies: Kyogre");
    }

    #[test]
    fn test_nested_object_indents() {
        let text = encode(&json!({"active": {"boosts": {"atk": 2}}})).unwrap();
        assert_eq!(text, "active:\n  boosts:\n    atk: 2");
    }

    #[test]
    fn test_primitive_array_inline() {
        let text = encode(&json!({"moves": ["surf", "icebeam", "thunder"]})).unwrap();
        assert_eq!(text, "moves[3]: surf,icebeam,thunder");
    }

    #[test]
    fn test_uniform_objects_become_table() {
        let text = encode(&json!({"moves": [
            {"id": "surf", "power": 90},
            {"id": "icebeam", "power": 90}
        ]}))
        .unwrap();
        assert_eq!(text, "moves[2]{id,power}:\n  surf,90\n  icebeam,90");
    }

    #[test]
    fn test_mixed_objects_become_list() {
        let text = encode(&json!({"team": [
            {"species": "Kyogre", "status": "par"},
            {"species": "Mewtwo"}
        ]}))
        .unwrap();
        assert_eq!(
            text,
            "team[2]:\n  - species: Kyogre\n    status: par\n  - species: Mewtwo"
        );
    }

    #[test]
    fn test_ambiguous_strings_quoted() {
        let text = encode(&json!({"a": "true", "b": "12", "c": "x, y", "d": ""})).unwrap();
        assert_eq!(text, "a: \"true\"\nb: \"12\"\nc: \"x, y\"\nd: \"\"");
    }

    #[test]
    fn test_keys_with_spaces_quoted() {
        let text = encode(&json!({"stealth rock": 1})).unwrap();
        assert_eq!(text, "\"stealth rock\": 1");
    }

    #[test]
    fn test_too_deep_falls_back_to_json() {
        let mut value = json!(1);
        for _ in 0..(MAX_DEPTH + 4) {
            value = json!({ "x": value });
        }
        assert_eq!(encode(&value), Err(CompactError::TooDeep { max: MAX_DEPTH }));

        let plain = encode_or_plain(&value);
        assert!(plain.starts_with('{'));
        assert_eq!(serde_json::from_str::<Value>(&plain).unwrap(), value);
    }

    #[test]
    fn test_compact_is_shorter_than_json() {
        let value = json!({"moves": [
            {"id": "surf", "power": 90, "pp": "15/15"},
            {"id": "icebeam", "power": 90, "pp": "10/10"},
            {"id": "thunder", "power": 120, "pp": "9/10"}
        ]});
        let compact = encode(&value).unwrap();
        let pretty = serde_json::to_string_pretty(&value).unwrap();
        assert!(compact.len() < pretty.len() / 2);
    }
}
