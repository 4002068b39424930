//! Command-line front end: probe the server and run the tool loop from a
//! terminal.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use clap::{Args, Parser, Subcommand};

use crate::agent_loop::{ChatSession, LoopOutcome, LoopStatus, OutputSink, ToolLoop};
use crate::config::PilotConfig;
use crate::error::PilotError;
use crate::provider::{ChatClient, ChatProvider};
use crate::readiness::{wait_until_ready, ReadinessPolicy};
use crate::tools::StaticScreen;

/// droidpilot CLI
#[derive(Parser, Debug)]
#[command(name = "droidpilot", version, about = "Drive a local model through device tools")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Inference server base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe /health once
    Ping,
    /// Poll /health until ready or the deadline passes
    Wait(WaitArgs),
    /// Send one prompt and run the tool loop
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
pub struct WaitArgs {
    /// Give up after this many milliseconds
    #[arg(long)]
    pub deadline_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Screen dump served to dump_ui; clicks succeed on ids found in it
    #[arg(long)]
    pub ui_dump: Option<PathBuf>,

    #[arg(long)]
    pub max_steps: Option<usize>,

    #[arg(short, long)]
    pub model: Option<String>,

    /// Do not advertise tools or insert the tool preamble
    #[arg(long)]
    pub no_tools: bool,

    /// User prompt
    pub prompt: String,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Resolve config from file, env and command-line overrides.
pub fn load_config(global: &GlobalArgs) -> Result<PilotConfig, PilotError> {
    let mut config = PilotConfig::resolve(global.config.as_deref())?;
    if let Some(ref url) = global.base_url {
        config.base_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Streams deltas to stdout and status lines to stderr. At most
/// `display_window` characters of one turn are echoed; the rest is elided.
#[derive(Debug)]
pub struct ConsoleSink {
    window: usize,
    shown: Mutex<usize>,
}

impl ConsoleSink {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            shown: Mutex::new(0),
        }
    }

    pub fn from_config(config: &PilotConfig) -> Self {
        Self::new(config.display_window)
    }

    /// Part of `text` still inside the window, and whether this delta is the
    /// one that overflowed it.
    fn admit<'a>(&self, text: &'a str) -> (&'a str, bool) {
        let mut shown = self.shown.lock().unwrap_or_else(PoisonError::into_inner);
        let before = *shown;
        let room = self.window.saturating_sub(before);
        let cut = text.char_indices().nth(room).map_or(text.len(), |(i, _)| i);
        *shown = before.saturating_add(text.chars().count());
        (&text[..cut], before <= self.window && *shown > self.window)
    }
}

impl OutputSink for ConsoleSink {
    fn delta(&self, text: &str) {
        let (visible, overflowed) = self.admit(text);
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(visible.as_bytes());
        if overflowed {
            let _ = out.write_all("…".as_bytes());
        }
        let _ = out.flush();
    }

    fn line(&self, line: &str) {
        eprintln!("{line}");
    }

    fn clear_delta(&self) {
        *self.shown.lock().unwrap_or_else(PoisonError::into_inner) = 0;
        println!();
    }
}

pub async fn handle_ping(config: &PilotConfig) -> Result<bool, PilotError> {
    let client = ChatClient::from_config(config)?;
    let ready = client.ping(config.ping_timeout()).await;
    println!("{}", if ready { "ready" } else { "not ready" });
    Ok(ready)
}

pub async fn handle_wait(config: &PilotConfig, args: &WaitArgs) -> Result<(), PilotError> {
    let client = ChatClient::from_config(config)?;
    let mut policy = ReadinessPolicy::from_config(config);
    if let Some(ms) = args.deadline_ms {
        policy.deadline = std::time::Duration::from_millis(ms);
    }
    let elapsed = wait_until_ready(&client, &policy).await?;
    println!("ready after {}ms", elapsed.as_millis());
    Ok(())
}

pub async fn handle_chat(mut config: PilotConfig, args: ChatArgs) -> Result<LoopOutcome, PilotError> {
    if let Some(steps) = args.max_steps {
        config.max_steps = steps;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    config.validate()?;

    let dump = match args.ui_dump {
        Some(ref path) => std::fs::read_to_string(path)?,
        None => String::new(),
    };

    let sink = Arc::new(ConsoleSink::from_config(&config));
    let mut tool_loop = ToolLoop::from_config(&config, Arc::new(StaticScreen::new(dump)), sink)?;
    if args.no_tools {
        let mut settings = tool_loop.settings().clone();
        settings.tools_enabled = false;
        tool_loop = tool_loop.with_settings(settings);
    }
    run_once(ChatSession::new(tool_loop), &args.prompt).await
}

async fn run_once(session: ChatSession, prompt: &str) -> Result<LoopOutcome, PilotError> {
    let handle = session.send(prompt)?;
    let cancel = handle.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = handle.wait().await;
    ctrl_c.abort();
    println!();
    Ok(outcome)
}

/// Process exit code for a finished run.
pub fn exit_code(outcome: &LoopOutcome) -> i32 {
    match outcome.status {
        LoopStatus::Finished => 0,
        LoopStatus::Exhausted => 2,
        LoopStatus::Cancelled => 130,
        LoopStatus::Failed => 1,
    }
}
