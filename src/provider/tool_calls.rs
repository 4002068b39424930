//! Merging of tool-call fragments spread across stream chunks.
//!
//! Two shapes arrive from OpenAI-compatible servers:
//! - deltas under `choices[0].delta.tool_calls`, keyed by `index`, whose
//!   `function.arguments` is a string fragment to concatenate;
//! - complete calls (top-level `tool_calls` on the final chunk, or
//!   `message.tool_calls`), whose `arguments` is usually a JSON object.
//!
//! A piece joins the slot already holding its `id`, otherwise the slot at
//! its `index`, otherwise a new slot at the end. A complete call with an
//! unknown id and no index fills the first id-less fragment of the same
//! tool. Output is ordered by slot, so fragments that arrive out of order
//! still merge into the order the model emitted them.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::ToolCall;

/// A tool call, or a piece of one, as it appears on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireToolCall {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<WireFunction>,
    // Some servers flatten name/arguments to the top level of the call.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl WireToolCall {
    fn name(&self) -> Option<&str> {
        self.function
            .as_ref()
            .and_then(|f| f.name.as_deref())
            .or(self.name.as_deref())
            .filter(|n| !n.is_empty())
    }

    fn arguments(&self) -> Option<&Value> {
        self.function
            .as_ref()
            .and_then(|f| f.arguments.as_ref())
            .or(self.arguments.as_ref())
    }
}

#[derive(Debug, Default)]
struct CallBuilder {
    id: Option<String>,
    name: String,
    args_text: String,
    args_object: Option<Map<String, Value>>,
}

impl CallBuilder {
    fn apply_arguments(&mut self, args: &Value, replace: bool) {
        match args {
            Value::String(fragment) => {
                if replace {
                    self.args_text.clear();
                    self.args_object = None;
                }
                self.args_text.push_str(fragment);
            }
            Value::Object(map) => {
                if replace {
                    self.args_text.clear();
                }
                let target = self.args_object.get_or_insert_with(Map::new);
                if replace {
                    target.clear();
                }
                for (k, v) in map {
                    target.insert(k.clone(), v.clone());
                }
            }
            _ => {}
        }
    }

    fn build(self) -> ToolCall {
        let arguments = if let Some(obj) = self.args_object.filter(|_| self.args_text.is_empty()) {
            Value::Object(obj)
        } else {
            parse_arguments(&self.args_text)
        };
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
        ToolCall::new(id, self.name, arguments)
    }
}

fn parse_arguments(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Accumulates fragments for one turn.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    slots: BTreeMap<usize, CallBuilder>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Merge an incremental delta fragment.
    pub fn push_delta(&mut self, fragment: &WireToolCall) {
        let slot = self.slot_for(fragment);
        let builder = self.slots.entry(slot).or_default();
        if let Some(id) = fragment.id.as_deref().filter(|id| !id.is_empty()) {
            builder.id = Some(id.to_string());
        }
        if let Some(name) = fragment.name() {
            if builder.name.is_empty() || matches!(fragment.arguments(), Some(Value::Object(_))) {
                builder.name = name.to_string();
            } else if builder.name != name {
                builder.name.push_str(name);
            }
        }
        if let Some(args) = fragment.arguments() {
            builder.apply_arguments(args, false);
        }
    }

    /// Merge a complete call, replacing any partial call with the same id.
    ///
    /// A complete call with an unknown id and no index fills the first
    /// id-less fragment of the same tool, so an index-only delta and
    /// the final summary of the same call stay one call.
    pub fn push_complete(&mut self, call: &WireToolCall) {
        let slot = self
            .unclaimed_slot_for(call)
            .unwrap_or_else(|| self.slot_for(call));
        let builder = self.slots.entry(slot).or_default();
        if let Some(id) = call.id.as_deref().filter(|id| !id.is_empty()) {
            builder.id = Some(id.to_string());
        }
        if let Some(name) = call.name() {
            builder.name = name.to_string();
        }
        if let Some(args) = call.arguments() {
            builder.apply_arguments(args, true);
        }
    }

    /// Finish the turn, returning calls in emission order. Fragments that
    /// never received a name are dropped.
    pub fn finish(self) -> Vec<ToolCall> {
        self.slots
            .into_values()
            .filter(|b| !b.name.is_empty())
            .map(CallBuilder::build)
            .collect()
    }

    fn slot_for(&self, fragment: &WireToolCall) -> usize {
        if let Some(id) = fragment.id.as_deref().filter(|id| !id.is_empty()) {
            if let Some((slot, _)) = self
                .slots
                .iter()
                .find(|(_, b)| b.id.as_deref() == Some(id))
            {
                return *slot;
            }
        }
        if let Some(index) = fragment.index {
            return index;
        }
        self.next_free_slot()
    }

    fn unclaimed_slot_for(&self, call: &WireToolCall) -> Option<usize> {
        if call.index.is_some() {
            return None;
        }
        let id = call.id.as_deref().filter(|id| !id.is_empty())?;
        if self.slots.values().any(|b| b.id.as_deref() == Some(id)) {
            return None;
        }
        let name = call.name();
        self.slots
            .iter()
            .find(|(_, b)| b.id.is_none() && name.map_or(true, |n| b.name.is_empty() || b.name == n))
            .map(|(slot, _)| *slot)
    }

    /// Slot after the last one in use. Falls back to the lowest unused
    /// slot when the last index is `usize::MAX`.
    fn next_free_slot(&self) -> usize {
        match self.slots.keys().next_back() {
            None => 0,
            Some(last) => last.checked_add(1).unwrap_or_else(|| {
                (0..self.slots.len())
                    .find(|slot| !self.slots.contains_key(slot))
                    .unwrap_or(self.slots.len())
            }),
        }
    }
}
