//! Tool-calling loop, session handle, single-flight guard and output sinks.

pub mod guard;
pub mod runner;
pub mod session;
pub mod sink;
pub mod types;

pub use guard::{FlightPermit, SingleFlight};
pub use runner::{LoopSettings, ToolLoop};
pub use session::{ChatSession, RunHandle};
pub use sink::{ChannelSink, OutputSink, SinkUpdate, TranscriptSink};
pub use types::{LoopOutcome, LoopStatus, RunId};
