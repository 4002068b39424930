//! Boundary to the device automation layer.

use std::sync::{Mutex, PoisonError};

/// Synchronous, side-effecting screen automation.
///
/// `false` or an empty dump means "not found / not possible" and is not an
/// error at this layer; the executor turns it into a failed tool result.
/// Implementations may block and may panic; callers run them on a
/// blocking thread.
pub trait Automation: Send + Sync {
    fn dump_ui(&self) -> String;
    fn global_action_by_name(&self, name: &str) -> bool;
    fn click_by_view_id(&self, view_id: &str) -> bool;
    fn click_by_text(&self, text: &str, contains: bool) -> bool;
    fn set_text_by_view_id(&self, view_id: &str, text: &str) -> bool;
}

/// Global actions understood by [`StaticScreen`].
pub const GLOBAL_ACTIONS: &[&str] = &["back", "home", "recents", "notifications", "quick_settings"];

/// An action recorded by [`StaticScreen`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenAction {
    GlobalAction(String),
    Click(String),
    ClickText { text: String, contains: bool },
    SetText { view_id: String, text: String },
}

/// Automation over a captured screen dump, for terminals and tests.
///
/// Clicks and text entry succeed when the view id (or text) appears in the
/// dump. Successful actions are recorded in order.
#[derive(Debug, Default)]
pub struct StaticScreen {
    dump: String,
    actions: Mutex<Vec<ScreenAction>>,
}

impl StaticScreen {
    pub fn new(dump: impl Into<String>) -> Self {
        Self {
            dump: dump.into(),
            actions: Mutex::new(Vec::new()),
        }
    }

    /// Actions performed so far.
    pub fn actions(&self) -> Vec<ScreenAction> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, action: ScreenAction) -> bool {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
        true
    }

    fn has(&self, needle: &str) -> bool {
        !needle.is_empty() && self.dump.contains(needle)
    }
}

impl Automation for StaticScreen {
    fn dump_ui(&self) -> String {
        self.dump.clone()
    }

    fn global_action_by_name(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        GLOBAL_ACTIONS.contains(&name.as_str()) && self.record(ScreenAction::GlobalAction(name))
    }

    fn click_by_view_id(&self, view_id: &str) -> bool {
        self.has(view_id) && self.record(ScreenAction::Click(view_id.to_string()))
    }

    fn click_by_text(&self, text: &str, contains: bool) -> bool {
        let found = if contains {
            self.has(text)
        } else {
            self.has(&format!("text=\"{text}\""))
        };
        found
            && self.record(ScreenAction::ClickText {
                text: text.to_string(),
                contains,
            })
    }

    fn set_text_by_view_id(&self, view_id: &str, text: &str) -> bool {
        self.has(view_id)
            && self.record(ScreenAction::SetText {
                view_id: view_id.to_string(),
                text: text.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"<node id="com.demo:id/search" text="Search"/><node id="com.demo:id/go" text="Go"/>"#;

    #[test]
    fn actions_succeed_only_for_known_targets() {
        let screen = StaticScreen::new(DUMP);
        assert!(screen.click_by_view_id("com.demo:id/go"));
        assert!(!screen.click_by_view_id("com.demo:id/missing"));
        assert!(screen.set_text_by_view_id("com.demo:id/search", ""));
        assert!(screen.global_action_by_name("Back"));
        assert!(!screen.global_action_by_name("teleport"));

        assert_eq!(
            screen.actions(),
            vec![
                ScreenAction::Click("com.demo:id/go".into()),
                ScreenAction::SetText {
                    view_id: "com.demo:id/search".into(),
                    text: String::new(),
                },
                ScreenAction::GlobalAction("back".into()),
            ]
        );
    }

    #[test]
    fn click_text_exact_and_contains() {
        let screen = StaticScreen::new(DUMP);
        assert!(screen.click_by_text("Go", false));
        assert!(!screen.click_by_text("Sea", false));
        assert!(screen.click_by_text("Sea", true));
    }

    #[test]
    fn empty_screen_dumps_nothing() {
        let screen = StaticScreen::default();
        assert!(screen.dump_ui().is_empty());
        assert!(!screen.click_by_view_id(""));
    }
}
