//! Recursive search over parsed JSON trees.
//!
//! The site's API payloads nest the interesting fields at unpredictable
//! depths and repeat them across peripheral objects, so every lookup here is
//! depth-first, first-match-wins: object entries in document order, then
//! array elements in index order. Absence is a normal `None`, never an error.

use serde_json::Value;

/// Find the first value stored anywhere under `key`.
pub fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(v) = map.get(key) {
                return Some(v);
            }
            map.values().find_map(|v| find_key(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

/// Find an author handle by structural signature.
///
/// Two shapes identify the content's own metadata rather than a peripheral
/// mention: an object whose `owner` is itself an object carrying `username`,
/// or an object carrying both `username` and `is_verified`.
pub fn find_username(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(owner)) = map.get("owner") {
                if let Some(Value::String(name)) = owner.get("username") {
                    return Some(name.clone());
                }
            }
            if map.contains_key("is_verified") {
                if let Some(Value::String(name)) = map.get("username") {
                    return Some(name.clone());
                }
            }
            map.values()
                .filter(|v| v.is_object() || v.is_array())
                .find_map(find_username)
        }
        Value::Array(items) => items.iter().find_map(find_username),
        _ => None,
    }
}

/// Find the first of several candidate keys holding a count, rendered as a
/// display string. Accepts numbers and numeric strings (payloads vary).
pub fn find_count(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(found) = find_key(value, key) {
            match found {
                Value::Number(n) => return Some(n.to_string()),
                Value::String(s) if s.chars().any(|c| c.is_ascii_digit()) => {
                    return Some(s.clone())
                }
                _ => continue,
            }
        }
    }
    None
}
