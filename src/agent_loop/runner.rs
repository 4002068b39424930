//! The tool-calling loop: request, execute tools, repeat.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PilotConfig;
use crate::conversation::Conversation;
use crate::error::PilotError;
use crate::provider::{ChatClient, ChatProvider, ChatRequest};
use crate::tools::trace::{call_names, tool_names_only};
use crate::tools::{Automation, ToolExecutor, ToolRegistry};
use crate::types::{Role, StreamEvent, ToolCall, ToolHistoryEntry, ToolResult};

use super::sink::OutputSink;
use super::types::{LoopOutcome, LoopStatus, RunId};

pub const SERVICE_NOT_STARTED: &str =
    "[system] local model service not started, start the model service first";

/// Per-invocation knobs.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    /// Chat requests allowed per invocation.
    pub max_steps: usize,
    pub tool_mode: Option<String>,
    pub ping_timeout: Duration,
    /// Attach the tool schema on the first request and keep the preamble.
    pub tools_enabled: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&PilotConfig::default())
    }
}

impl LoopSettings {
    pub fn from_config(config: &PilotConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_steps: config.max_steps,
            tool_mode: Some(config.tool_mode.clone()).filter(|m| !m.is_empty()),
            ping_timeout: config.ping_timeout(),
            tools_enabled: true,
        }
    }
}

/// What one streamed exchange produced.
#[derive(Debug, Default)]
struct Turn {
    text: String,
    tool_calls: Vec<ToolCall>,
    history: Vec<ToolHistoryEntry>,
    finish_reason: Option<String>,
    error: Option<String>,
}

/// Drives a [`Conversation`] through model requests and tool executions.
#[derive(Clone)]
pub struct ToolLoop {
    provider: Arc<dyn ChatProvider>,
    executor: ToolExecutor,
    sink: Arc<dyn OutputSink>,
    settings: LoopSettings,
}

impl std::fmt::Debug for ToolLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLoop")
            .field("executor", &self.executor)
            .field("settings", &self.settings)
            .finish()
    }
}

impl ToolLoop {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        executor: ToolExecutor,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            provider,
            executor,
            sink,
            settings: LoopSettings::default(),
        }
    }

    /// Wire a [`ChatClient`] and an executor over `automation` from `config`.
    pub fn from_config(
        config: &PilotConfig,
        automation: Arc<dyn Automation>,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Self, PilotError> {
        config.validate()?;
        let provider: Arc<dyn ChatProvider> = Arc::new(ChatClient::from_config(config)?);
        let mut registry = ToolRegistry::standard();
        if config.expose_click_text {
            registry = registry.with_click_text();
        }
        let executor = ToolExecutor::new(automation, registry).with_result_cap(config.result_cap);
        Ok(Self::new(provider, executor, sink).with_settings(LoopSettings::from_config(config)))
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.sink
    }

    pub async fn run(&self, conversation: &mut Conversation, cancel: &CancellationToken) -> LoopOutcome {
        self.run_with_id(Uuid::new_v4(), conversation, cancel).await
    }

    /// Run until the model finishes, fails, the budget runs out or `cancel`
    /// fires. Every terminal state writes exactly one final line to the sink.
    ///
    /// Messages are committed turn by turn and never rolled back. A
    /// cancelled turn's streamed text is dropped; calls of an assistant
    /// message that were not run get a `cancelled` result so the log stays
    /// paired.
    pub async fn run_with_id(
        &self,
        run_id: RunId,
        conversation: &mut Conversation,
        cancel: &CancellationToken,
    ) -> LoopOutcome {
        debug!(run_id = %run_id, model = %self.settings.model, "tool loop start");

        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.cancelled(run_id, 0, 0),
            ready = self.provider.ping(self.settings.ping_timeout) => ready,
        };
        if !ready {
            warn!(run_id = %run_id, "inference service not reachable");
            self.sink.line(SERVICE_NOT_STARTED);
            return LoopOutcome::failed(run_id, "service not started");
        }

        let echo = conversation
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone());

        let mut requests = 0;
        for step in 0..self.settings.max_steps {
            self.sink
                .line(&format!("[system] requesting… ({})", self.settings.model));

            let request = self.build_request(conversation, step == 0);
            requests += 1;

            let Some(turn) = self.stream_turn(&request, cancel).await else {
                return self.cancelled(run_id, requests, step);
            };

            debug!(
                run_id = %run_id,
                step,
                tool_calls = turn.tool_calls.len(),
                text_len = turn.text.len(),
                finish_reason = turn.finish_reason.as_deref().unwrap_or(""),
                "turn complete"
            );

            if let Some(error) = turn.error {
                self.sink.line(&format!("[system] request failed: {error}"));
                return LoopOutcome::failed(run_id, error).with_counts(requests, step);
            }

            conversation.append_tool_history(&turn.history);

            if turn.tool_calls.is_empty() {
                conversation.push_assistant(turn.text);
                self.sink.line("[system] done");
                info!(run_id = %run_id, requests, "tool loop finished");
                return LoopOutcome::new(run_id, LoopStatus::Finished).with_counts(requests, step);
            }

            let calls = turn.tool_calls;
            conversation.push_assistant_tool_calls(turn.text, calls.clone());

            for (i, call) in calls.iter().enumerate() {
                if cancel.is_cancelled() {
                    for skipped in &calls[i..] {
                        let result = ToolResult::failure(&skipped.name, "cancelled");
                        conversation.push_tool_result(skipped, &result);
                    }
                    return self.cancelled(run_id, requests, step);
                }
                let result = self.executor.execute(call).await;
                conversation.push_tool_result(call, &result);
                self.sink
                    .line(&format!("[tool result] {} ok={}", call.name, result.ok));
            }

            self.sink.clear_delta();
            if step == 0 {
                if let Some(ref text) = echo {
                    self.sink.line(&format!("[me] {text}"));
                }
            }
            self.sink.line("[system] tools finished, continuing…");
        }

        warn!(run_id = %run_id, max_steps = self.settings.max_steps, "step budget exceeded");
        self.sink.line("[system] step budget exceeded");
        LoopOutcome::new(run_id, LoopStatus::Exhausted)
            .with_counts(requests, self.settings.max_steps)
    }

    fn build_request(&self, conversation: &Conversation, first: bool) -> ChatRequest {
        let mut request =
            ChatRequest::new(self.settings.model.clone(), conversation.messages().to_vec());
        if first && self.settings.tools_enabled {
            request = request.with_tools(self.registry().definitions().to_vec());
        }
        if let Some(ref mode) = self.settings.tool_mode {
            request = request.with_tool_mode(mode.clone());
        }
        request
    }

    /// `None` when cancelled mid-stream.
    async fn stream_turn(&self, request: &ChatRequest, cancel: &CancellationToken) -> Option<Turn> {
        let mut stream = self.provider.complete_stream(request);
        let mut turn = Turn::default();

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                event = stream.next() => event,
            };
            let Some(event) = event else { break };

            match event {
                StreamEvent::Delta(text) => {
                    self.sink.delta(&text);
                    turn.text.push_str(&text);
                }
                StreamEvent::ToolCalls(calls) => {
                    let names = call_names(&calls);
                    if !names.is_empty() {
                        self.sink.line(&format!("[needs tools] {names}"));
                    }
                    turn.tool_calls.extend(calls);
                }
                StreamEvent::ToolTrace(trace) => {
                    let names = tool_names_only(&trace);
                    if !names.is_empty() {
                        self.sink.line(&format!("[tool] {names}"));
                    }
                }
                StreamEvent::ToolHistory(entries) => turn.history.extend(entries),
                StreamEvent::Malformed(message) => {
                    self.sink.line(&format!("[system] {message}"));
                }
                StreamEvent::FinishReason(reason) => turn.finish_reason = Some(reason),
                StreamEvent::Done => break,
                StreamEvent::Error(message) => {
                    turn.error = Some(message);
                    break;
                }
            }
        }
        Some(turn)
    }

    fn cancelled(&self, run_id: RunId, requests: usize, steps: usize) -> LoopOutcome {
        info!(run_id = %run_id, requests, "tool loop cancelled");
        self.sink.line("[system] cancelled");
        LoopOutcome::new(run_id, LoopStatus::Cancelled).with_counts(requests, steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_loop::sink::TranscriptSink;
    use crate::tools::StaticScreen;
    use crate::types::ChatCompletion;
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays scripted turns; the last script repeats.
    struct Scripted {
        ready: bool,
        turns: Vec<Vec<StreamEvent>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn new(turns: Vec<Vec<StreamEvent>>) -> Self {
            Self {
                ready: true,
                turns,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for Scripted {
        async fn ping(&self, _timeout: Duration) -> bool {
            self.ready
        }

        async fn complete(&self, _request: &ChatRequest) -> Result<ChatCompletion, PilotError> {
            Ok(ChatCompletion::default())
        }

        fn complete_stream(&self, request: &ChatRequest) -> BoxStream<'static, StreamEvent> {
            let mut requests = self.requests.lock().unwrap();
            let index = requests.len().min(self.turns.len() - 1);
            requests.push(request.clone());
            Box::pin(stream::iter(self.turns[index].clone()))
        }
    }

    fn tool_loop(provider: Arc<Scripted>, sink: Arc<TranscriptSink>) -> ToolLoop {
        let executor = ToolExecutor::new(
            Arc::new(StaticScreen::new("com.demo:id/ok")),
            ToolRegistry::standard(),
        );
        ToolLoop::new(provider, executor, sink)
    }

    #[tokio::test]
    async fn tool_history_lands_before_assistant_message() {
        let provider = Arc::new(Scripted::new(vec![vec![
            StreamEvent::ToolTrace("=> dump_ui {}".into()),
            StreamEvent::Delta("done".into()),
            StreamEvent::ToolHistory(vec![ToolHistoryEntry {
                name: "dump_ui".into(),
                ok: true,
                cost_ms: Some(3),
                error: None,
                result: Some(json!("<node/>")),
            }]),
            StreamEvent::Done,
        ]]));
        let sink = Arc::new(TranscriptSink::default());
        let mut convo = Conversation::new();
        convo.push_user("look");

        let outcome = tool_loop(provider, sink.clone())
            .run(&mut convo, &CancellationToken::new())
            .await;

        assert_eq!(outcome.status, LoopStatus::Finished);
        let roles: Vec<Role> = convo.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::System, Role::Assistant]);
        assert!(sink.lines().contains(&"[tool] dump_ui".to_string()));
    }

    #[tokio::test]
    async fn stream_ending_without_terminal_event_counts_as_done() {
        let provider = Arc::new(Scripted::new(vec![vec![StreamEvent::Delta("hi".into())]]));
        let sink = Arc::new(TranscriptSink::default());
        let mut convo = Conversation::new();
        convo.push_user("hello");

        let outcome = tool_loop(provider, sink)
            .run(&mut convo, &CancellationToken::new())
            .await;
        assert_eq!(outcome.status, LoopStatus::Finished);
        assert_eq!(convo.messages()[1].content, "hi");
    }

    #[tokio::test]
    async fn pre_cancelled_run_issues_no_request() {
        let provider = Arc::new(Scripted::new(vec![vec![StreamEvent::Done]]));
        let sink = Arc::new(TranscriptSink::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = tool_loop(provider.clone(), sink.clone())
            .run(&mut Conversation::new(), &cancel)
            .await;
        assert_eq!(outcome.status, LoopStatus::Cancelled);
        assert!(provider.requests.lock().unwrap().is_empty());
        assert_eq!(sink.lines(), vec!["[system] cancelled".to_string()]);
    }

    #[tokio::test]
    async fn tool_mode_is_sent_on_every_request_and_tools_only_first() {
        let call = ToolCall::new("c1", "dump_ui", json!({}));
        let provider = Arc::new(Scripted::new(vec![
            vec![StreamEvent::ToolCalls(vec![call]), StreamEvent::Done],
            vec![StreamEvent::Delta("ok".into()), StreamEvent::Done],
        ]));
        let sink = Arc::new(TranscriptSink::default());
        let mut convo = Conversation::new();
        convo.push_user("dump");

        tool_loop(provider.clone(), sink)
            .run(&mut convo, &CancellationToken::new())
            .await;

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].tools.is_some());
        assert!(requests[1].tools.is_none());
        assert!(requests.iter().all(|r| r.tool_mode.as_deref() == Some("emit")));
    }
}
