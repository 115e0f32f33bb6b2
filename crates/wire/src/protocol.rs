//! Tool host protocol types (HTTP/JSON binding).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description of one capability published by a tool host.
///
/// Identity is `name` (unique within a host). Descriptors are immutable once
/// published; a host that changes its tool set mid-session does not affect
/// sets already bound from an earlier discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Error envelope returned by the host on failed invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Returns the envelope message if `value` is an in-body failure envelope.
///
/// Only an object whose single key is `"error"` with a string value counts.
/// Tool payloads that merely contain an `error` field alongside other data
/// are legitimate return values and pass through untouched.
pub fn as_error_envelope(value: &Value) -> Option<&str> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get("error")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_roundtrip() {
        let desc = ToolDescriptor::new(
            "read_file",
            "Read the contents of a file",
            json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
        );
        let encoded = serde_json::to_string(&desc).unwrap();
        let decoded: ToolDescriptor = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.name, "read_file");
        assert_eq!(decoded.parameters["required"][0], "path");
    }

    #[test]
    fn descriptor_missing_description_defaults_empty() {
        let decoded: ToolDescriptor =
            serde_json::from_str(r#"{"name":"echo","parameters":{"type":"object"}}"#).unwrap();
        assert_eq!(decoded.description, "");
    }

    #[test]
    fn envelope_detection() {
        assert_eq!(
            as_error_envelope(&json!({"error": "unknown tool"})),
            Some("unknown tool")
        );
        // Richer objects are payloads, not envelopes.
        assert_eq!(
            as_error_envelope(&json!({"error": "x", "stdout": ""})),
            None
        );
        assert_eq!(as_error_envelope(&json!({"error": 3})), None);
        assert_eq!(as_error_envelope(&json!("error")), None);
    }
}
