//! Shared helpers for Google API responses

use serde_json::Value;

/// Extract an array field from a JSON response, returning an empty vec if missing.
pub fn extract_array(response: &Value, field: &str) -> Vec<Value> {
    response
        .get(field)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

/// Value of a message header (`payload.headers[].{name,value}`), matched
/// case-insensitively.
pub fn header_value<'a>(message: &'a Value, name: &str) -> Option<&'a str> {
    message
        .get("payload")?
        .get("headers")?
        .as_array()?
        .iter()
        .find(|h| {
            h.get("name")
                .and_then(|n| n.as_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .and_then(|h| h.get("value"))
        .and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_lookup_ignores_case() {
        let message = json!({
            "payload": {"headers": [{"name": "Subject", "value": "Hi"}]}
        });
        assert_eq!(header_value(&message, "subject"), Some("Hi"));
        assert_eq!(header_value(&message, "From"), None);
        assert!(extract_array(&message, "messages").is_empty());
    }
}
