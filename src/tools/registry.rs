//! The fixed set of automation tools advertised to the model.

use serde_json::Value;

use super::types::{ToolDefinition, ToolParameters};

pub const DUMP_UI: &str = "dump_ui";
pub const GLOBAL_ACTION: &str = "global_action";
pub const CLICK_VIEW_ID: &str = "click_view_id";
pub const SET_TEXT_VIEW_ID: &str = "set_text_view_id";
pub const CLICK_TEXT: &str = "click_text";

/// Immutable tool schema. Built once per session and never mutated.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ToolRegistry {
    /// `dump_ui`, `global_action`, `click_view_id` and `set_text_view_id`.
    pub fn standard() -> Self {
        let definitions = vec![
            ToolDefinition::new(
                DUMP_UI,
                "Read the UI tree of the current screen (system or other apps)",
                ToolParameters::empty(),
            ),
            ToolDefinition::new(
                GLOBAL_ACTION,
                "Perform a system-wide action (back, home, notifications, ...)",
                ToolParameters::object()
                    .string("name", "Action name, e.g. back, home, notifications", true)
                    .build(),
            ),
            ToolDefinition::new(
                CLICK_VIEW_ID,
                "Click a control by its viewIdResourceName",
                ToolParameters::object()
                    .string("view_id", "e.g. com.example:id/btn_ok", true)
                    .build(),
            ),
            ToolDefinition::new(
                SET_TEXT_VIEW_ID,
                "Set the text of an input field by its viewIdResourceName",
                ToolParameters::object()
                    .string("view_id", "e.g. com.example:id/et_input", true)
                    .string("text", "Text to enter (may be empty)", true)
                    .build(),
            ),
        ];
        Self { definitions }
    }

    /// Adds `click_text(text, contains?)`.
    pub fn with_click_text(mut self) -> Self {
        if self.get(CLICK_TEXT).is_none() {
            self.definitions.push(ToolDefinition::new(
                CLICK_TEXT,
                "Click the first clickable control whose text matches",
                ToolParameters::object()
                    .string("text", "Visible text of the control", true)
                    .boolean("contains", "Match a substring instead of the whole text", false)
                    .build(),
            ));
        }
        self
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.name.as_str()).collect()
    }

    /// OpenAI `tools` array.
    pub fn wire_format(&self) -> Value {
        Value::Array(self.definitions.iter().map(ToolDefinition::to_wire).collect())
    }
}

/// Wire-format schema of the standard tool set.
pub fn describe_tools() -> Value {
    ToolRegistry::standard().wire_format()
}
