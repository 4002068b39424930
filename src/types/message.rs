//! Message types for the conversation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use strum::Display;

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_role(Role::System, text)
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(Role::User, text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, text)
    }

    /// Create an assistant message that requested tools.
    pub fn assistant_with_tool_calls(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::with_role(Role::Assistant, text)
        }
    }

    /// Create the `tool` message answering `call`.
    pub fn tool_result(call: &ToolCall, result: &ToolResult) -> Self {
        Self {
            tool_call_id: (!call.id.is_empty()).then(|| call.id.clone()),
            ..Self::with_role(Role::Tool, result.to_content())
        }
    }

    /// Wire representation for `/v1/chat/completions`.
    pub fn to_wire(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("role".into(), Value::String(self.role.to_string()));
        obj.insert("content".into(), Value::String(self.content.clone()));
        if !self.tool_calls.is_empty() {
            let calls = self.tool_calls.iter().map(ToolCall::to_wire).collect();
            obj.insert("tool_calls".into(), Value::Array(calls));
        }
        if let Some(ref id) = self.tool_call_id {
            obj.insert("tool_call_id".into(), Value::String(id.clone()));
        }
        Value::Object(obj)
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Opaque id; synthesized when the server omits it.
    pub id: String,
    pub name: String,
    /// JSON object of arguments.
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// OpenAI function-calling shape. Arguments stay a JSON object, which is
    /// what the local server emits and expects back.
    pub fn to_wire(&self) -> Value {
        json!({
            "id": self.id,
            "type": "function",
            "function": {
                "name": self.name,
                "arguments": self.arguments,
            }
        })
    }
}

/// Outcome of one tool execution. Produced for every call, success or not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub name: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub cost_ms: u64,
    /// Tool-specific fields (`action`, `view_id`, `text_len`, ...).
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: true,
            result: None,
            error: None,
            cost_ms: 0,
            details: Map::new(),
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Self::success(name)
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Serialized form stored as the `tool` message content.
    pub fn to_content(&self) -> String {
        let mut obj = Map::new();
        obj.insert("name".into(), Value::String(self.name.clone()));
        obj.insert("ok".into(), Value::Bool(self.ok));
        if let Some(ref result) = self.result {
            obj.insert("result".into(), Value::String(result.clone()));
        }
        if let Some(ref error) = self.error {
            obj.insert("error".into(), Value::String(error.clone()));
        }
        for (key, value) in &self.details {
            obj.entry(key.clone()).or_insert_with(|| value.clone());
        }
        obj.insert("cost_ms".into(), Value::from(self.cost_ms));
        Value::Object(obj).to_string()
    }
}
