//! Core types for droidpilot.

pub mod completion;
pub mod message;
pub mod stream;

pub use completion::*;
pub use message::*;
pub use stream::*;
