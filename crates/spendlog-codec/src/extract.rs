//! Best-effort extraction of a flat key-value object from model output

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::CodecError;

/// Return the first balanced `{...}` span in `text`
///
/// Braces inside JSON string literals are not counted. Leading and trailing
/// prose around the object is ignored.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + c.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse an object whose values are all scalars into text fields
///
/// Keys with a `null` value are left out. Nested arrays or objects make the
/// whole object unusable.
pub fn parse_flat_object(span: &str) -> Result<BTreeMap<String, String>, CodecError> {
    let map: Map<String, Value> = serde_json::from_str(span)?;
    let mut fields = BTreeMap::new();
    for (key, value) in map {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => return Err(CodecError::NotFlat { key }),
        };
        fields.insert(key.trim().to_lowercase(), text);
    }
    Ok(fields)
}

/// Extract and parse in one step
pub fn extract_fields(reply: &str) -> Result<BTreeMap<String, String>, CodecError> {
    let span = first_balanced_object(reply).ok_or(CodecError::NoObject)?;
    parse_flat_object(span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_surrounded_by_prose() {
        let reply = "好的，结果如下：\n```json\n{\"category\": \"餐饮\", \"price\": 25}\n```\n希望有帮助 {x}";
        assert_eq!(
            first_balanced_object(reply),
            Some("{\"category\": \"餐饮\", \"price\": 25}")
        );
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let reply = r#"{"remark": "a } b { c", "product": "x\"}"}"#;
        assert_eq!(first_balanced_object(reply), Some(reply));
    }

    #[test]
    fn test_nested_object_spans_to_outer_close() {
        let reply = r#"x {"a": {"b": 1}} y"#;
        assert_eq!(first_balanced_object(reply), Some(r#"{"a": {"b": 1}}"#));
    }

    #[test]
    fn test_unbalanced_is_none() {
        assert_eq!(first_balanced_object("no object here"), None);
        assert_eq!(first_balanced_object("{\"a\": 1"), None);
    }

    #[test]
    fn test_flat_object_values() {
        let fields = parse_flat_object(r#"{"Category": "交通", "price": 12.5, "time": null, "ok": true}"#).unwrap();
        assert_eq!(fields["category"], "交通");
        assert_eq!(fields["price"], "12.5");
        assert_eq!(fields["ok"], "true");
        assert!(!fields.contains_key("time"));
    }

    #[test]
    fn test_nested_value_rejected() {
        let err = parse_flat_object(r#"{"category": ["a"]}"#).unwrap_err();
        assert!(matches!(err, CodecError::NotFlat { key } if key == "category"));
    }

    #[test]
    fn test_extract_fields_errors() {
        assert!(matches!(extract_fields("sorry"), Err(CodecError::NoObject)));
        assert!(matches!(extract_fields("{category: 餐饮}"), Err(CodecError::Json(_))));
    }
}
