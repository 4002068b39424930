//! Ordered message log for one chat session.

use tracing::debug;

use crate::tools::ToolRegistry;
use crate::types::{Message, Role, ToolCall, ToolHistoryEntry, ToolResult};
use crate::util::text::truncate_chars;

/// Marks the system message that carries the tool preamble.
pub const TOOL_PREAMBLE_MARKER: &str = "[tool instructions]";

/// Cap for server-side tool results copied into the conversation.
pub const HISTORY_RESULT_CAP: usize = 2_000;

/// System prompt describing the tools and how to call them.
pub fn build_tool_preamble(registry: &ToolRegistry) -> String {
    let mut prompt = String::from("You are a helpful assistant.\n");
    prompt.push_str(TOOL_PREAMBLE_MARKER);
    prompt.push('\n');
    prompt.push_str("You can call tools to complete the task. Tool definitions (OpenAI tools JSON):\n");
    prompt.push_str("<tools>\n");
    prompt.push_str(&registry.wire_format().to_string());
    prompt.push_str("\n</tools>\n");
    prompt.push_str("When you need a tool, return tool_calls instead of writing the call into plain text.\n");
    prompt.push_str("Prefer click_view_id / set_text_view_id; find the target view_id with dump_ui first.\n");
    prompt
}

/// Append-only message log. Messages are never edited once pushed; the only
/// insertion is the tool preamble at the front.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(Message::user(text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(Message::assistant(text));
    }

    pub fn push_assistant_tool_calls(&mut self, text: impl Into<String>, calls: Vec<ToolCall>) {
        self.push(Message::assistant_with_tool_calls(text, calls));
    }

    pub fn push_tool_result(&mut self, call: &ToolCall, result: &ToolResult) {
        self.push(Message::tool_result(call, result));
    }

    /// Insert the tool preamble at the front unless the first message is
    /// already a system message carrying the marker. Returns whether a
    /// message was inserted.
    pub fn ensure_tool_preamble(&mut self, registry: &ToolRegistry) -> bool {
        if self.has_tool_preamble() {
            return false;
        }
        debug!("inserting tool preamble");
        self.messages.insert(0, Message::system(build_tool_preamble(registry)));
        true
    }

    pub fn has_tool_preamble(&self) -> bool {
        self.messages
            .first()
            .is_some_and(|m| m.role == Role::System && m.content.contains(TOOL_PREAMBLE_MARKER))
    }

    /// Record tools the server ran on its own as system messages.
    pub fn append_tool_history(&mut self, entries: &[ToolHistoryEntry]) {
        for entry in entries {
            self.push(Message::system(history_content(entry)));
        }
    }

    /// Tool calls of the last assistant message that have no `tool` reply
    /// yet. Empty when the log is ready for the next request.
    pub fn unanswered_tool_calls(&self) -> &[ToolCall] {
        let Some(pos) = self
            .messages
            .iter()
            .rposition(|m| m.role == Role::Assistant && !m.tool_calls.is_empty())
        else {
            return &[];
        };
        let calls = &self.messages[pos].tool_calls;
        let answered = self.messages[pos + 1..]
            .iter()
            .take_while(|m| m.role == Role::Tool)
            .count()
            .min(calls.len());
        &calls[answered..]
    }
}

fn history_content(entry: &ToolHistoryEntry) -> String {
    let mut content = format!("[tool result] {}\nok={}", entry.name, entry.ok);
    if let Some(cost) = entry.cost_ms.filter(|c| *c >= 0) {
        content.push_str(&format!(" cost_ms={cost}"));
    }
    if let Some(error) = entry.error.as_deref().filter(|e| !e.is_empty()) {
        content.push_str(&format!("\nerror={error}"));
    }
    let result = entry.result_text();
    if !result.is_empty() {
        content.push('\n');
        content.push_str(&truncate_chars(&result, HISTORY_RESULT_CAP));
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preamble_goes_in_front_of_existing_messages() {
        let mut convo = Conversation::new();
        convo.push_user("open settings");
        assert!(convo.ensure_tool_preamble(&ToolRegistry::standard()));
        assert_eq!(convo.messages()[0].role, Role::System);
        assert!(convo.messages()[0].content.contains("<tools>"));
        assert!(convo.messages()[0].content.contains("set_text_view_id"));
        assert_eq!(convo.messages()[1].role, Role::User);
    }

    #[test]
    fn unrelated_system_message_still_gets_preamble() {
        let mut convo = Conversation::new();
        convo.push(Message::system("be brief"));
        assert!(convo.ensure_tool_preamble(&ToolRegistry::standard()));
        assert!(convo.has_tool_preamble());
        assert_eq!(convo.len(), 2);
    }

    #[test]
    fn history_entry_is_rendered_and_capped() {
        let mut convo = Conversation::new();
        convo.append_tool_history(&[ToolHistoryEntry {
            name: "dump_ui".into(),
            ok: false,
            cost_ms: Some(12),
            error: Some("empty dump".into()),
            result: Some(json!("x".repeat(2_500))),
        }]);
        let content = &convo.messages()[0].content;
        assert!(content.starts_with("[tool result] dump_ui\nok=false cost_ms=12\nerror=empty dump\n"));
        assert!(content.ends_with("...(truncated, len=2500)"));
        assert_eq!(convo.messages()[0].role, Role::System);
    }

    #[test]
    fn unanswered_calls_shrink_as_results_arrive() {
        let calls = vec![
            ToolCall::new("a", "dump_ui", json!({})),
            ToolCall::new("b", "click_view_id", json!({"view_id": "x"})),
        ];
        let mut convo = Conversation::new();
        convo.push_assistant_tool_calls("", calls.clone());
        assert_eq!(convo.unanswered_tool_calls().len(), 2);

        convo.push_tool_result(&calls[0], &ToolResult::success("dump_ui"));
        assert_eq!(convo.unanswered_tool_calls()[0].id, "b");

        convo.push_tool_result(&calls[1], &ToolResult::failure("click_view_id", "no"));
        assert!(convo.unanswered_tool_calls().is_empty());
    }
}
