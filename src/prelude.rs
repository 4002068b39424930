//! Convenience re-exports for common use.

pub use crate::agent_loop::{
    ChannelSink, ChatSession, LoopOutcome, LoopSettings, LoopStatus, OutputSink, RunHandle,
    SinkUpdate, ToolLoop, TranscriptSink,
};
pub use crate::config::PilotConfig;
pub use crate::conversation::Conversation;
pub use crate::error::{PilotError, Result};
pub use crate::provider::{ChatClient, ChatProvider, ChatRequest};
pub use crate::readiness::{wait_until_ready, ReadinessPolicy};
pub use crate::tools::{Automation, StaticScreen, ToolExecutor, ToolRegistry};
pub use crate::types::{ChatCompletion, Message, Role, StreamEvent, ToolCall, ToolResult};
