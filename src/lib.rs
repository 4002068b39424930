//! droidpilot: let a small local model drive device automation.
//!
//! A streaming chat client for a loopback OpenAI-compatible server, a fixed
//! set of screen-automation tools, and the loop that alternates model turns
//! with tool executions until the model answers, fails, or runs out of
//! steps.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use droidpilot::prelude::*;
//!
//! # async fn example() -> droidpilot::error::Result<()> {
//! let config = PilotConfig::from_env()?;
//! let screen = Arc::new(StaticScreen::new("<node id=\"com.demo:id/ok\"/>"));
//! let session = ChatSession::from_config(&config, screen, Arc::new(TranscriptSink::from_config(&config)))?;
//!
//! let outcome = session.send("press ok")?.wait().await;
//! println!("{}", outcome.status);
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod conversation;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod readiness;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
