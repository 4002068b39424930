//! Streaming types.

use super::completion::ToolHistoryEntry;
use super::message::ToolCall;

/// One decoded event of a streaming chat exchange.
///
/// A stream produced by [`ChatProvider::complete_stream`](crate::provider::ChatProvider::complete_stream)
/// yields zero or more non-terminal events followed by exactly one
/// terminal event ([`StreamEvent::Done`] or [`StreamEvent::Error`]), and
/// nothing after it. Tool calls arrive merged, once per exchange, after
/// every text delta and before the finish reason.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental assistant text.
    Delta(String),
    /// Merged tool calls requested in this turn.
    ToolCalls(Vec<ToolCall>),
    /// A trace line for a tool the server ran or announced.
    ToolTrace(String),
    /// Tools the server executed itself.
    ToolHistory(Vec<ToolHistoryEntry>),
    /// One event could not be parsed; the exchange continues.
    Malformed(String),
    FinishReason(String),
    Done,
    Error(String),
}
