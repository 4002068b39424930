//! HTTP + SSE client for an OpenAI-compatible `/v1/chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PilotConfig;
use crate::error::PilotError;
use crate::types::{ChatCompletion, StreamEvent, ToolHistoryEntry};
use crate::util::timeout::with_timeout;

use super::http::{build_client, endpoint, error_for_status, json_headers, sse_headers};
use super::sse::{self, SseFrame};
use super::tool_calls::{ToolCallAccumulator, WireToolCall};
use super::{ChatProvider, ChatRequest};

const CHAT_PATH: &str = "/v1/chat/completions";
const HEALTH_PATH: &str = "/health";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the loopback inference server.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PilotError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(PilotError::Configuration("base_url is empty".into()));
        }
        Ok(Self {
            http: build_client(DEFAULT_CONNECT_TIMEOUT)?,
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn from_config(config: &PilotConfig) -> Result<Self, PilotError> {
        let base_url = config.base_url.clone();
        if base_url.trim().is_empty() {
            return Err(PilotError::Configuration("base_url is empty".into()));
        }
        Ok(Self {
            http: build_client(config.connect_timeout())?,
            base_url,
            request_timeout: config.request_timeout(),
        })
    }

    /// Bound for non-streaming completions. Streaming is never bounded.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatProvider for ChatClient {
    async fn ping(&self, timeout: Duration) -> bool {
        let url = endpoint(&self.base_url, HEALTH_PATH);
        let probe = async {
            let resp = self.http.get(&url).timeout(timeout).send().await?;
            Ok::<_, PilotError>(resp.status().is_success())
        };
        match with_timeout(timeout, probe).await {
            Ok(ready) => ready,
            Err(e) => {
                debug!(error = %e, url = %url, "health probe failed");
                false
            }
        }
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, PilotError> {
        validate(request)?;
        let url = endpoint(&self.base_url, CHAT_PATH);
        let body = request.to_body(false);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "chat complete"
        );

        let resp = self
            .http
            .post(&url)
            .headers(json_headers())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;
        let resp = error_for_status(resp).await?;
        let text = resp.text().await?;

        let data: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| PilotError::Decode(format!("invalid completion response: {e}")))?;
        Ok(data.into_completion(text))
    }

    fn complete_stream(&self, request: &ChatRequest) -> BoxStream<'static, StreamEvent> {
        let invalid = validate(request).err();
        let http = self.http.clone();
        let url = endpoint(&self.base_url, CHAT_PATH);
        let body = request.to_body(true);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "chat stream"
        );

        let stream = async_stream::stream! {
            if let Some(err) = invalid {
                yield StreamEvent::Error(err.to_string());
                return;
            }

            let resp = match http.post(&url).headers(sse_headers()).json(&body).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    yield StreamEvent::Error(PilotError::Transport(e).to_string());
                    return;
                }
            };
            let resp = match error_for_status(resp).await {
                Ok(resp) => resp,
                Err(e) => {
                    yield StreamEvent::Error(e.to_string());
                    return;
                }
            };

            let frames = sse::decode_stream(resp.bytes_stream());
            futures::pin_mut!(frames);

            let mut calls = ToolCallAccumulator::new();
            let mut finish_reason: Option<String> = None;
            let mut saw_sentinel = false;

            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(SseFrame::Done) => {
                        saw_sentinel = true;
                        break;
                    }
                    Ok(SseFrame::Data(payload)) => {
                        match serde_json::from_str::<StreamChunk>(&payload) {
                            Ok(chunk) => {
                                for event in chunk.into_events(&mut calls, &mut finish_reason) {
                                    yield event;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, payload = %payload, "malformed SSE event");
                                yield StreamEvent::Malformed(format!("failed to parse SSE event: {e}"));
                            }
                        }
                    }
                    Err(e) => {
                        yield StreamEvent::Error(e.to_string());
                        return;
                    }
                }
            }

            if !saw_sentinel {
                debug!("stream closed without [DONE]");
            }
            let merged = calls.finish();
            if !merged.is_empty() {
                yield StreamEvent::ToolCalls(merged);
            }
            if let Some(reason) = finish_reason {
                yield StreamEvent::FinishReason(reason);
            }
            yield StreamEvent::Done;
        };

        Box::pin(stream)
    }
}

fn validate(request: &ChatRequest) -> Result<(), PilotError> {
    if request.model.trim().is_empty() {
        return Err(PilotError::InvalidArgument("model is empty".into()));
    }
    if request.messages.is_empty() {
        return Err(PilotError::InvalidArgument("messages are empty".into()));
    }
    Ok(())
}

fn trace_lines(raw: &[Value]) -> Vec<String> {
    raw.iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

// Wire response types (internal)

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    tool_trace: Vec<Value>,
    #[serde(default)]
    tool_history: Vec<ToolHistoryEntry>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

impl CompletionResponse {
    /// `raw` is returned as the content when the body has no message, the
    /// way the local server reports some failures.
    fn into_completion(self, raw: String) -> ChatCompletion {
        let mut calls = ToolCallAccumulator::new();
        let choice = self.choices.into_iter().next();
        let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());

        let content = match choice.and_then(|c| c.message) {
            Some(message) => {
                for call in &message.tool_calls {
                    calls.push_complete(call);
                }
                message.content.unwrap_or_default()
            }
            None => raw,
        };
        for call in &self.tool_calls {
            calls.push_complete(call);
        }

        ChatCompletion {
            content,
            tool_trace: trace_lines(&self.tool_trace),
            tool_history: self.tool_history,
            tool_calls: calls.finish(),
            finish_reason,
        }
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    tool_trace_line: Option<String>,
    #[serde(default)]
    tool_trace: Vec<Value>,
    #[serde(default)]
    tool_history: Vec<ToolHistoryEntry>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

impl StreamChunk {
    /// Events this chunk produces right away. Tool-call fragments are folded
    /// into `calls` and the finish reason is held back until the stream ends.
    fn into_events(
        self,
        calls: &mut ToolCallAccumulator,
        finish_reason: &mut Option<String>,
    ) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(line) = self.tool_trace_line.filter(|l| !l.trim().is_empty()) {
            events.push(StreamEvent::ToolTrace(line));
        }

        if let Some(choice) = self.choices.into_iter().next() {
            if let Some(delta) = choice.delta {
                if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                    events.push(StreamEvent::Delta(text));
                }
                for fragment in &delta.tool_calls {
                    calls.push_delta(fragment);
                }
            }
            if let Some(reason) = choice.finish_reason.filter(|r| !r.is_empty()) {
                *finish_reason = Some(reason);
            }
        }

        let trace = trace_lines(&self.tool_trace);
        if !trace.is_empty() {
            events.push(StreamEvent::ToolTrace(trace.join("\n")));
        }
        if !self.tool_history.is_empty() {
            events.push(StreamEvent::ToolHistory(self.tool_history));
        }
        for call in &self.tool_calls {
            calls.push_complete(call);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(value: Value) -> StreamChunk {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn delta_chunk_yields_text_and_holds_finish_reason() {
        let mut calls = ToolCallAccumulator::new();
        let mut finish = None;
        let events = chunk(json!({
            "choices": [{"index": 0, "delta": {"role": "assistant", "content": "4"}, "finish_reason": null}]
        }))
        .into_events(&mut calls, &mut finish);
        assert_eq!(events, vec![StreamEvent::Delta("4".into())]);
        assert!(finish.is_none());

        let events = chunk(json!({
            "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]
        }))
        .into_events(&mut calls, &mut finish);
        assert!(events.is_empty());
        assert_eq!(finish.as_deref(), Some("stop"));
    }

    #[test]
    fn final_chunk_tool_calls_go_to_accumulator() {
        let mut calls = ToolCallAccumulator::new();
        let mut finish = None;
        let events = chunk(json!({
            "choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}],
            "tool_calls": [{"id": "call-r-0", "type": "function", "function": {"name": "dump_ui", "arguments": {}}}],
            "tool_trace": ["=> dump_ui {}", ""]
        }))
        .into_events(&mut calls, &mut finish);

        assert_eq!(events, vec![StreamEvent::ToolTrace("=> dump_ui {}".into())]);
        let merged = calls.finish();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "call-r-0");
    }

    #[test]
    fn completion_without_message_falls_back_to_raw_body() {
        let resp: CompletionResponse = serde_json::from_value(json!({"error": "busy"})).unwrap();
        let completion = resp.into_completion("{\"error\":\"busy\"}".into());
        assert_eq!(completion.content, "{\"error\":\"busy\"}");
        assert!(completion.tool_calls.is_empty());
    }
}
