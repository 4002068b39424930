//! Dispatches tool calls to the automation layer.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::arguments::ToolArguments;
use super::automation::Automation;
use super::registry::{
    ToolRegistry, CLICK_TEXT, CLICK_VIEW_ID, DUMP_UI, GLOBAL_ACTION, SET_TEXT_VIEW_ID,
};
use crate::error::PilotError;
use crate::types::{ToolCall, ToolResult};
use crate::util::text::truncate_chars;

pub const DEFAULT_RESULT_CAP: usize = 20_000;

/// Runs tool calls against an [`Automation`] and always returns a
/// [`ToolResult`]. Failures, including panics in the automation layer,
/// become `ok = false` results.
#[derive(Clone)]
pub struct ToolExecutor {
    automation: Arc<dyn Automation>,
    registry: ToolRegistry,
    result_cap: usize,
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("tools", &self.registry.names())
            .field("result_cap", &self.result_cap)
            .finish()
    }
}

impl ToolExecutor {
    pub fn new(automation: Arc<dyn Automation>, registry: ToolRegistry) -> Self {
        Self {
            automation,
            registry,
            result_cap: DEFAULT_RESULT_CAP,
        }
    }

    pub fn with_result_cap(mut self, cap: usize) -> Self {
        self.result_cap = cap.max(1);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one call. Never fails; `cost_ms` covers the whole dispatch.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let started = Instant::now();
        let name = call.name.trim().to_string();
        let args = ToolArguments::new(call.arguments.clone());

        let mut result = if name.is_empty() {
            ToolResult::failure("", "missing tool name")
        } else if !self.registry.contains(&name) {
            ToolResult::failure(&name, format!("unknown tool: {name}"))
                .with_detail("args", args.raw().clone())
        } else {
            let automation = Arc::clone(&self.automation);
            let cap = self.result_cap;
            let tool = name.clone();
            match tokio::task::spawn_blocking(move || dispatch(automation.as_ref(), &tool, &args, cap))
                .await
            {
                Ok(result) => result,
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    warn!(tool = %name, error = %message, "tool panicked");
                    ToolResult::failure(&name, format!("exception: {message}"))
                }
                Err(e) => ToolResult::failure(&name, format!("exception: {e}")),
            }
        };

        result.cost_ms = started.elapsed().as_millis() as u64;
        info!(tool = %result.name, ok = result.ok, cost_ms = result.cost_ms, "tool executed");
        result
    }
}

fn dispatch(automation: &dyn Automation, name: &str, args: &ToolArguments, cap: usize) -> ToolResult {
    match name {
        DUMP_UI => {
            let dump = automation.dump_ui();
            if dump.trim().is_empty() {
                ToolResult::failure(name, "empty dump (service disabled or no active window?)")
            } else {
                ToolResult::success(name).with_result(truncate_chars(&dump, cap))
            }
        }
        GLOBAL_ACTION => {
            let action = match args.get_non_empty_str("name") {
                Ok(action) => action,
                Err(e) => return argument_failure(name, e),
            };
            let ok = automation.global_action_by_name(action);
            outcome(name, ok, "global action failed or unsupported").with_detail("action", action)
        }
        CLICK_VIEW_ID => {
            let view_id = match args.get_non_empty_str("view_id") {
                Ok(view_id) => view_id,
                Err(e) => return argument_failure(name, e),
            };
            let ok = automation.click_by_view_id(view_id);
            outcome(name, ok, "click failed (not found or not clickable)")
                .with_detail("view_id", view_id)
        }
        SET_TEXT_VIEW_ID => {
            let view_id = match args.get_non_empty_str("view_id") {
                Ok(view_id) => view_id,
                Err(e) => return argument_failure(name, e),
            };
            let text = match args.get_str("text") {
                Ok(text) => text,
                Err(e) => return argument_failure(name, e).with_detail("view_id", view_id),
            };
            let ok = automation.set_text_by_view_id(view_id, text);
            outcome(name, ok, "setText failed (not found or not editable)")
                .with_detail("view_id", view_id)
                .with_detail("text_len", text.chars().count())
        }
        CLICK_TEXT => {
            let text = match args.get_non_empty_str("text") {
                Ok(text) => text,
                Err(e) => return argument_failure(name, e),
            };
            let contains = args.get_bool_opt("contains").unwrap_or(false);
            let ok = automation.click_by_text(text, contains);
            outcome(name, ok, "click failed (text not found or not clickable)")
                .with_detail("text", text)
                .with_detail("contains", contains)
        }
        _ => ToolResult::failure(name, format!("unknown tool: {name}"))
            .with_detail("args", args.raw().clone()),
    }
}

fn outcome(name: &str, ok: bool, error: &str) -> ToolResult {
    if ok {
        ToolResult::success(name)
    } else {
        ToolResult::failure(name, error)
    }
}

fn argument_failure(name: &str, err: PilotError) -> ToolResult {
    let message = match err {
        PilotError::InvalidArgument(message) => message,
        other => other.to_string(),
    };
    ToolResult::failure(name, message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
