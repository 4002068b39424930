//! Chat session: owns the conversation and starts loop runs.

use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::config::PilotConfig;
use crate::conversation::Conversation;
use crate::error::PilotError;
use crate::tools::Automation;
use crate::types::Message;

use super::guard::SingleFlight;
use super::runner::ToolLoop;
use super::sink::OutputSink;
use super::types::{LoopOutcome, RunId};

/// Handle for an in-flight run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    cancel: CancellationToken,
    result_rx: oneshot::Receiver<LoopOutcome>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Request cancellation. The run still reports its outcome through
    /// [`RunHandle::wait`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> LoopOutcome {
        let run_id = self.run_id;
        self.result_rx
            .await
            .unwrap_or_else(|_| LoopOutcome::failed(run_id, "run task ended without an outcome"))
    }
}

/// One chat session: a conversation, its single-flight guard and the loop
/// that drives it. Create one per user-facing surface.
#[derive(Debug)]
pub struct ChatSession {
    conversation: Arc<Mutex<Conversation>>,
    guard: SingleFlight,
    tool_loop: Arc<ToolLoop>,
}

impl ChatSession {
    pub fn new(tool_loop: ToolLoop) -> Self {
        Self {
            conversation: Arc::new(Mutex::new(Conversation::new())),
            guard: SingleFlight::new(),
            tool_loop: Arc::new(tool_loop),
        }
    }

    /// Session over a loop built with [`ToolLoop::from_config`].
    pub fn from_config(
        config: &PilotConfig,
        automation: Arc<dyn Automation>,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Self, PilotError> {
        Ok(Self::new(ToolLoop::from_config(config, automation, sink)?))
    }

    pub fn tool_loop(&self) -> &ToolLoop {
        &self.tool_loop
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    /// Start a run for `text`. Never waits: a run in progress is
    /// [`PilotError::Busy`]. Must be called from within a tokio runtime.
    pub fn send(&self, text: &str) -> Result<RunHandle, PilotError> {
        if text.trim().is_empty() {
            return Err(PilotError::InvalidArgument("message is empty".into()));
        }

        let permit = self.guard.try_acquire()?;
        // The permit is only released after the run drops its lock.
        let mut conversation = Arc::clone(&self.conversation)
            .try_lock_owned()
            .map_err(|_| PilotError::Busy)?;

        let sink = self.tool_loop.sink();
        sink.clear_delta();
        sink.line(&format!("[me] {text}"));
        conversation.push_user(text);
        if self.tool_loop.settings().tools_enabled {
            conversation.ensure_tool_preamble(self.tool_loop.registry());
        }

        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (result_tx, result_rx) = oneshot::channel();
        let tool_loop = Arc::clone(&self.tool_loop);
        let token = cancel.clone();

        debug!(run_id = %run_id, messages = conversation.len(), "starting run");
        tokio::spawn(async move {
            let outcome = tool_loop
                .run_with_id(run_id, &mut conversation, &token)
                .await;
            drop(conversation);
            drop(permit);
            let _ = result_tx.send(outcome);
        });

        Ok(RunHandle {
            run_id,
            cancel,
            result_rx,
        })
    }

    /// Snapshot of the conversation. Waits for a running loop to finish.
    pub async fn transcript(&self) -> Vec<Message> {
        self.conversation.lock().await.messages().to_vec()
    }
}
