//! Typed access to tool call arguments.

use serde_json::Value;

use crate::error::PilotError;

/// Wrapper around tool call arguments providing typed extraction.
///
/// Models sometimes send the arguments object as a JSON-encoded string;
/// that form is unwrapped on construction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        let value = match value {
            Value::String(raw) => match serde_json::from_str::<Value>(raw.trim()) {
                Ok(parsed @ Value::Object(_)) => parsed,
                _ => Value::String(raw),
            },
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &Value {
        &self.value
    }

    /// Get a string argument by key. Present but empty is allowed.
    pub fn get_str(&self, key: &str) -> Result<&str, PilotError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| PilotError::InvalidArgument(format!("missing required argument: {key}")))
    }

    /// Get a string argument that must be non-empty after trimming.
    pub fn get_non_empty_str(&self, key: &str) -> Result<&str, PilotError> {
        let value = self.get_str(key)?;
        if value.trim().is_empty() {
            return Err(PilotError::InvalidArgument(format!("empty required argument: {key}")));
        }
        Ok(value)
    }

    /// Get an optional boolean, accepting `"true"`/`"false"` strings.
    pub fn get_bool_opt(&self, key: &str) -> Option<bool> {
        match self.value.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_encoded_object_is_unwrapped() {
        let args = ToolArguments::new(json!("{\"view_id\": \"a:id/b\"}"));
        assert_eq!(args.get_str("view_id").unwrap(), "a:id/b");
    }

    #[test]
    fn empty_and_missing_are_distinguished() {
        let args = ToolArguments::new(json!({"text": ""}));
        assert_eq!(args.get_str("text").unwrap(), "");
        assert!(args.get_non_empty_str("text").is_err());
        let err = args.get_str("view_id").unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: missing required argument: view_id");
    }

    #[test]
    fn bool_accepts_string_form() {
        let args = ToolArguments::new(json!({"contains": "true", "exact": false}));
        assert_eq!(args.get_bool_opt("contains"), Some(true));
        assert_eq!(args.get_bool_opt("exact"), Some(false));
        assert_eq!(args.get_bool_opt("missing"), None);
    }

    #[test]
    fn null_becomes_empty_object() {
        let args = ToolArguments::new(Value::Null);
        assert!(args.raw().as_object().is_some_and(|o| o.is_empty()));
    }
}
