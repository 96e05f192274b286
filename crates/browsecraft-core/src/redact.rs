//! Recursive structural redaction of sensitive fields in log payloads.
//!
//! Consumes the input by value and moves untouched pieces through unchanged,
//! so a subtree with nothing to redact is never reallocated — the owned
//! equivalent of "return the original reference when nothing changed".

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

const REDACTED: &str = "[REDACTED]";

/// Case-insensitive, unanchored: matches `Authorization` headers, a
/// `sessionId` field, a `set-cookie` header name, and so on — not just keys
/// that are exactly one of these words.
static SENSITIVE_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)cookie|password|token|secret|session|auth|authorization|set-cookie").unwrap()
});

/// Redacts sensitive fields in `value`, recursively. Idempotent: calling
/// this on its own output returns the same structure unchanged.
pub fn redact(value: Value) -> Value {
    redact_value(value).0
}

fn redact_value(value: Value) -> (Value, bool) {
    match value {
        Value::Object(map) => {
            let (map, changed) = redact_object(map);
            (Value::Object(map), changed)
        }
        Value::Array(items) => {
            let mut changed = false;
            let items = items
                .into_iter()
                .map(|item| {
                    let (item, item_changed) = redact_value(item);
                    changed |= item_changed;
                    item
                })
                .collect();
            (Value::Array(items), changed)
        }
        other => (other, false),
    }
}

fn redact_object(map: Map<String, Value>) -> (Map<String, Value>, bool) {
    let name_is_sensitive = map
        .get("name")
        .and_then(Value::as_str)
        .map(|name| SENSITIVE_KEY.is_match(name))
        .unwrap_or(false);

    let mut changed = false;
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        if SENSITIVE_KEY.is_match(&key) {
            out.insert(key, Value::String(REDACTED.to_string()));
            changed = true;
        } else if key == "value" && name_is_sensitive {
            out.insert(key, redact_remote_value(value));
            changed = true;
        } else {
            let (value, value_changed) = redact_value(value);
            changed |= value_changed;
            out.insert(key, value);
        }
    }
    (out, changed)
}

/// `value` is either the cookie/header value directly, or a BiDi
/// `RemoteValue` wrapper (`{ type, value: X }`) — in the latter case only
/// the inner `value` is replaced, the wrapper's other fields are preserved.
fn redact_remote_value(value: Value) -> Value {
    match value {
        Value::Object(mut inner) if inner.contains_key("value") => {
            inner.insert("value".to_string(), Value::String(REDACTED.to_string()));
            Value::Object(inner)
        }
        _ => Value::String(REDACTED.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_sensitive_key_directly() {
        let input = json!({"password": "hunter2", "username": "alice"});
        let out = redact(input);
        assert_eq!(out["password"], "[REDACTED]");
        assert_eq!(out["username"], "alice");
    }

    #[test]
    fn redacts_array_entries_individually_preserving_array_shape() {
        let input = json!({
            "headers": [
                {"name": "Cookie", "value": "x"},
                {"name": "Accept", "value": "y"}
            ]
        });
        let out = redact(input);
        assert_eq!(out["headers"][0]["value"], "[REDACTED]");
        assert_eq!(out["headers"][1]["value"], "y");
        assert_eq!(out["headers"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn redacts_inner_value_of_remote_value_wrapper_only() {
        let input = json!({
            "name": "sessionToken",
            "value": {"type": "string", "value": "secret-payload"}
        });
        let out = redact(input);
        assert_eq!(out["value"]["value"], "[REDACTED]");
        assert_eq!(out["value"]["type"], "string");
    }

    #[test]
    fn is_idempotent() {
        let input = json!({
            "auth": {"token": "abc"},
            "items": [1, 2, {"secret": "s"}]
        });
        let once = redact(input);
        let twice = redact(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn preserves_structure_when_nothing_sensitive() {
        let input = json!({"a": 1, "b": [1, 2, 3], "c": {"d": "e"}});
        let out = redact(input.clone());
        assert_eq!(out, input);
    }
}
