//! Output sinks for streamed text and status lines.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::config::PilotConfig;

/// Receives display updates from a running loop.
///
/// Called from the loop's task; implementations synchronize internally or
/// hand updates to their own delivery context.
pub trait OutputSink: Send + Sync {
    /// Streamed model text, in arrival order.
    fn delta(&self, text: &str);
    /// A complete status line (`[system] done`, `[tool result] ...`).
    fn line(&self, line: &str);
    /// Clear the per-turn display buffer.
    fn clear_delta(&self);
}

/// One display update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkUpdate {
    Delta(String),
    Line(String),
    ClearDelta,
}

/// Forwards updates over an unbounded channel to a single consumer, which
/// sees them in the order they were produced.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkUpdate>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, update: SinkUpdate) {
        // A dropped receiver only means nobody is watching.
        let _ = self.tx.send(update);
    }
}

impl OutputSink for ChannelSink {
    fn delta(&self, text: &str) {
        self.send(SinkUpdate::Delta(text.to_string()));
    }

    fn line(&self, line: &str) {
        self.send(SinkUpdate::Line(line.to_string()));
    }

    fn clear_delta(&self) {
        self.send(SinkUpdate::ClearDelta);
    }
}

#[derive(Debug, Default)]
struct Transcript {
    lines: Vec<String>,
    display: String,
    display_chars: usize,
}

/// In-memory sink keeping every line and a bounded window of streamed text.
#[derive(Debug)]
pub struct TranscriptSink {
    state: Mutex<Transcript>,
    window: usize,
}

impl Default for TranscriptSink {
    fn default() -> Self {
        Self::from_config(&PilotConfig::default())
    }
}

impl TranscriptSink {
    /// `window` is the display buffer size in characters.
    pub fn new(window: usize) -> Self {
        Self {
            state: Mutex::new(Transcript::default()),
            window,
        }
    }

    /// Sink whose display buffer holds `display_window` characters.
    pub fn from_config(config: &PilotConfig) -> Self {
        Self::new(config.display_window)
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.clone()
    }

    /// Current display buffer.
    pub fn display(&self) -> String {
        self.lock().display.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Transcript> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputSink for TranscriptSink {
    fn delta(&self, text: &str) {
        let mut state = self.lock();
        state.display.push_str(text);
        state.display_chars += text.chars().count();

        if state.display_chars > self.window {
            let excess = state.display_chars - self.window;
            let cut = state
                .display
                .char_indices()
                .nth(excess)
                .map_or(state.display.len(), |(i, _)| i);
            state.display.drain(..cut);
            state.display_chars = self.window;
        }
    }

    fn line(&self, line: &str) {
        self.lock().lines.push(line.to_string());
    }

    fn clear_delta(&self) {
        let mut state = self.lock();
        state.display.clear();
        state.display_chars = 0;
    }
}
