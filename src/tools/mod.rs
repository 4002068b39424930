//! Tool schema, argument access and execution against the automation layer.

pub mod arguments;
pub mod automation;
pub mod executor;
pub mod registry;
pub mod trace;
pub mod types;

pub use arguments::ToolArguments;
pub use automation::{Automation, ScreenAction, StaticScreen};
pub use executor::ToolExecutor;
pub use registry::{describe_tools, ToolRegistry};
pub use types::{ToolDefinition, ToolParameters};
