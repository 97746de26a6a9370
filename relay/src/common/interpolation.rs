//! String Interpolation Utilities
//!
//! Fills `{field}` placeholders in URL templates from request inputs.

use serde_json::{Map, Value};

/// Interpolate parameters in a URL template.
///
/// Replaces placeholders like `{field_name}` with values from `params`.
/// Values are percent-encoded so they stay inside a single path segment.
/// Placeholders without a matching scalar value are left untouched.
///
/// # Example
/// ```ignore
/// let template = "/v0/{baseId}/{tableName}";
/// let params = json!({"baseId": "app1", "tableName": "My Table"});
/// let result = interpolate_params(template, params.as_object().unwrap());
/// // result == "/v0/app1/My%20Table"
/// ```
pub fn interpolate_params(template: &str, params: &Map<String, Value>) -> String {
    let mut result = template.to_string();

    for (key, value) in params {
        let placeholder = format!("{{{}}}", key);
        if !result.contains(&placeholder) {
            continue;
        }
        let replacement = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        result = result.replace(&placeholder, &urlencoding::encode(&replacement));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_interpolate_params() {
        let params = obj(json!({"baseId": "b1", "tableName": "t1"}));
        assert_eq!(interpolate_params("/v0/{baseId}/{tableName}", &params), "/v0/b1/t1");
    }

    #[test]
    fn test_interpolate_params_encodes_segments() {
        let params = obj(json!({"tableName": "Leads / 2024", "page": 3}));
        assert_eq!(
            interpolate_params("/{tableName}?page={page}", &params),
            "/Leads%20%2F%202024?page=3"
        );
    }

    #[test]
    fn test_interpolate_params_leaves_unknown_placeholders() {
        let params = obj(json!({"nested": {"a": 1}}));
        assert_eq!(interpolate_params("/{nested}/{missing}", &params), "/{nested}/{missing}");
    }
}
