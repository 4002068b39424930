//! Chat protocol client for the local inference endpoint.

pub mod chat;
pub mod http;
pub mod sse;
pub mod tool_calls;

pub use chat::ChatClient;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{json, Map, Value};

use crate::error::PilotError;
use crate::tools::ToolDefinition;
use crate::types::{ChatCompletion, Message, StreamEvent};

/// A request sent to the chat endpoint.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Attached only on the first turn of a loop invocation.
    pub tools: Option<Vec<ToolDefinition>>,
    /// Passed through untouched; `"emit"` asks the server to return
    /// structured tool calls instead of running them itself.
    pub tool_mode: Option<String>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: None,
            tool_mode: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_tool_mode(mut self, mode: impl Into<String>) -> Self {
        self.tool_mode = Some(mode.into());
        self
    }

    /// JSON body for `POST /v1/chat/completions`.
    pub fn to_body(&self, stream: bool) -> Value {
        let messages: Vec<Value> = self.messages.iter().map(Message::to_wire).collect();
        let mut body = Map::new();
        body.insert("model".into(), json!(self.model));
        body.insert("messages".into(), Value::Array(messages));
        body.insert("stream".into(), json!(stream));
        body.insert("enable_thinking".into(), json!(false));

        if let Some(ref tools) = self.tools {
            if !tools.is_empty() {
                let defs = tools.iter().map(ToolDefinition::to_wire).collect();
                body.insert("tools".into(), Value::Array(defs));
            }
        }
        if let Some(ref mode) = self.tool_mode {
            body.insert("tool_mode".into(), json!(mode));
        }
        Value::Object(body)
    }
}

/// The seam between the tool loop and the inference endpoint.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Liveness probe. Never fails; any error or timeout is `false`.
    async fn ping(&self, timeout: Duration) -> bool;

    /// Non-streaming completion.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, PilotError>;

    /// Streaming completion.
    ///
    /// The stream always ends with exactly one terminal event; connection and
    /// HTTP failures are reported as [`StreamEvent::Error`] rather than as a
    /// `Result`.
    fn complete_stream(&self, request: &ChatRequest) -> BoxStream<'static, StreamEvent>;
}
