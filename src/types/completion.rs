//! Non-streaming completion results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::ToolCall;

/// Result of a non-streaming chat completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub tool_trace: Vec<String>,
    pub tool_history: Vec<ToolHistoryEntry>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
}

/// A tool the server executed on its own (`tool_mode = "execute"`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolHistoryEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ToolHistoryEntry {
    /// The result as text; structured results are rendered as JSON.
    pub fn result_text(&self) -> String {
        match &self.result {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}
