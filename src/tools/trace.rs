//! Short human-readable summaries of tool activity.

use crate::types::ToolCall;

/// Reduce server trace lines to the tool names they mention.
///
/// `=> dump_ui {}` and `<= dump_ui ok` both become `dump_ui`; lines are
/// joined with `, `.
pub fn tool_names_only(trace: &str) -> String {
    trace
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let line = line
                .strip_prefix("=>")
                .or_else(|| line.strip_prefix("<="))
                .unwrap_or(line)
                .trim_start();
            line.split_whitespace().next()
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Names of the requested calls, e.g. `dump_ui, click_view_id`.
pub fn call_names(calls: &[ToolCall]) -> String {
    calls
        .iter()
        .map(|c| c.name.trim())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_direction_and_arguments() {
        let trace = "=> dump_ui {}\n<= dump_ui ok=true\n\n  click_view_id {\"view_id\":\"x\"}";
        assert_eq!(tool_names_only(trace), "dump_ui, dump_ui, click_view_id");
    }

    #[test]
    fn call_names_skip_blank() {
        let calls = vec![
            ToolCall::new("1", "dump_ui", json!({})),
            ToolCall::new("2", "", json!({})),
            ToolCall::new("3", "global_action", json!({"name": "back"})),
        ];
        assert_eq!(call_names(&calls), "dump_ui, global_action");
    }
}
