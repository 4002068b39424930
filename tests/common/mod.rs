//! Shared test helpers: SSE bodies, a scriptable screen and loop wiring.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use droidpilot::agent_loop::{LoopSettings, ToolLoop, TranscriptSink};
use droidpilot::provider::{ChatClient, ChatProvider};
use droidpilot::tools::{Automation, ToolExecutor, ToolRegistry};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CHAT_PATH: &str = "/v1/chat/completions";

/// `data:` frames for each chunk followed by the `[DONE]` sentinel.
pub fn sse_body(chunks: &[Value]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

pub fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream")
}

pub fn delta(text: &str) -> Value {
    json!({"choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]})
}

pub fn finish(reason: &str) -> Value {
    json!({"choices": [{"index": 0, "delta": {}, "finish_reason": reason}]})
}

/// Final chunk the local server sends when the model asked for tools.
pub fn tool_calls_chunk(calls: &[(&str, Value)]) -> Value {
    let calls: Vec<Value> = calls
        .iter()
        .enumerate()
        .map(|(i, (name, args))| {
            json!({
                "id": format!("call-r-{i}"),
                "type": "function",
                "function": {"name": name, "arguments": args}
            })
        })
        .collect();
    json!({
        "choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}],
        "tool_calls": calls
    })
}

/// SSE stream answering with plain text.
pub fn text_stream(text: &str) -> ResponseTemplate {
    sse_response(sse_body(&[delta(text), finish("stop")]))
}

/// SSE stream requesting the given tools.
pub fn tool_stream(calls: &[(&str, Value)]) -> ResponseTemplate {
    sse_response(sse_body(&[tool_calls_chunk(calls)]))
}

pub async fn mount_health(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Serve `response` for the next chat request only. Mount in the order the
/// responses should be served.
pub async fn mount_chat_once(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(response)
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// JSON bodies of the chat requests the server received, in order.
pub async fn chat_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == CHAT_PATH)
        .map(|r| serde_json::from_slice(&r.body).expect("chat body is JSON"))
        .collect()
}

/// Automation with scripted outcomes that records every call.
#[derive(Debug, Default)]
pub struct ScriptedScreen {
    pub dump: String,
    pub global_ok: bool,
    pub click_ok: bool,
    pub set_text_ok: bool,
    pub panic_on_dump: bool,
    pub delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedScreen {
    pub fn new(dump: &str) -> Self {
        Self {
            dump: dump.to_string(),
            global_ok: true,
            click_ok: true,
            set_text_ok: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.calls.lock().unwrap().push(call);
    }
}

impl Automation for ScriptedScreen {
    fn dump_ui(&self) -> String {
        self.record("dump_ui".into());
        if self.panic_on_dump {
            panic!("accessibility service died");
        }
        self.dump.clone()
    }

    fn global_action_by_name(&self, name: &str) -> bool {
        self.record(format!("global_action({name})"));
        self.global_ok
    }

    fn click_by_view_id(&self, view_id: &str) -> bool {
        self.record(format!("click_view_id({view_id})"));
        self.click_ok
    }

    fn click_by_text(&self, text: &str, contains: bool) -> bool {
        self.record(format!("click_text({text}, {contains})"));
        self.click_ok
    }

    fn set_text_by_view_id(&self, view_id: &str, text: &str) -> bool {
        self.record(format!("set_text_view_id({view_id}, {text})"));
        self.set_text_ok
    }
}

pub fn settings(max_steps: usize) -> LoopSettings {
    LoopSettings {
        model: "qwen3_0.6b".into(),
        max_steps,
        tool_mode: Some("emit".into()),
        ping_timeout: Duration::from_millis(800),
        tools_enabled: true,
    }
}

/// A loop against `server` with a transcript sink the test can inspect.
pub fn tool_loop(
    server: &MockServer,
    screen: Arc<dyn Automation>,
    settings: LoopSettings,
) -> (ToolLoop, Arc<TranscriptSink>) {
    let client: Arc<dyn ChatProvider> =
        Arc::new(ChatClient::new(server.uri()).expect("client builds"));
    let executor = ToolExecutor::new(screen, ToolRegistry::standard());
    let sink = Arc::new(TranscriptSink::default());
    let tool_loop = ToolLoop::new(client, executor, sink.clone()).with_settings(settings);
    (tool_loop, sink)
}
