//! Configuration system (layered: code > env > config file > defaults).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::PilotError;

const ENV_PREFIX: &str = "DROIDPILOT_";

/// Runtime configuration for the chat client, tool loop and readiness poll.
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PilotConfig {
    /// Loopback inference server.
    pub base_url: String,
    pub model: String,
    /// Model requests allowed per loop invocation.
    pub max_steps: usize,
    /// Passed through to the server as `tool_mode`.
    pub tool_mode: String,
    pub connect_timeout_ms: u64,
    /// Bound for non-streaming completions only.
    pub request_timeout_ms: u64,
    pub ping_timeout_ms: u64,
    pub ready_poll_interval_ms: u64,
    pub ready_deadline_ms: u64,
    /// Character cap for textual tool results.
    pub result_cap: usize,
    /// Character cap for the streamed display buffer.
    pub display_window: usize,
    /// Advertise `click_text` alongside the four standard tools.
    pub expose_click_text: bool,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:18080".into(),
            model: "qwen3_0.6b".into(),
            max_steps: 8,
            tool_mode: "emit".into(),
            connect_timeout_ms: 15_000,
            request_timeout_ms: 120_000,
            ping_timeout_ms: 800,
            ready_poll_interval_ms: 400,
            ready_deadline_ms: 60_000,
            result_cap: 20_000,
            display_window: 8_000,
            expose_click_text: false,
        }
    }
}

impl PilotConfig {
    /// Defaults, then the default config file if it exists, then env.
    pub fn from_env() -> Result<Self, PilotError> {
        Self::resolve(None)
    }

    /// Like [`PilotConfig::from_env`], reading `file` instead of the
    /// default config file when given. An explicit file must exist.
    pub fn resolve(file: Option<&Path>) -> Result<Self, PilotError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = match file {
            Some(path) => Self::load(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::load(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, PilotError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
            .map_err(|e| PilotError::Configuration(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(raw: &str) -> Result<Self, PilotError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| PilotError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/droidpilot/config.toml` for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "droidpilot")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Overlay `DROIDPILOT_*` variables using `lookup` to read them.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), PilotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = var("BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = var("MODEL") {
            self.model = v;
        }
        if let Some(v) = var("TOOL_MODE") {
            self.tool_mode = v;
        }
        if let Some(v) = var("MAX_STEPS") {
            self.max_steps = parse_env("MAX_STEPS", &v)?;
        }
        if let Some(v) = var("CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = parse_env("CONNECT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_env("REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("PING_TIMEOUT_MS") {
            self.ping_timeout_ms = parse_env("PING_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("READY_POLL_INTERVAL_MS") {
            self.ready_poll_interval_ms = parse_env("READY_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = var("READY_DEADLINE_MS") {
            self.ready_deadline_ms = parse_env("READY_DEADLINE_MS", &v)?;
        }
        if let Some(v) = var("RESULT_CAP") {
            self.result_cap = parse_env("RESULT_CAP", &v)?;
        }
        if let Some(v) = var("DISPLAY_WINDOW") {
            self.display_window = parse_env("DISPLAY_WINDOW", &v)?;
        }
        if let Some(v) = var("EXPOSE_CLICK_TEXT") {
            self.expose_click_text = parse_env("EXPOSE_CLICK_TEXT", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), PilotError> {
        if self.base_url.trim().is_empty() {
            return Err(PilotError::Configuration("base_url is empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(PilotError::Configuration("model is empty".into()));
        }
        if self.max_steps == 0 {
            return Err(PilotError::Configuration("max_steps must be at least 1".into()));
        }
        if self.result_cap == 0 {
            return Err(PilotError::Configuration("result_cap must be at least 1".into()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    pub fn ready_deadline(&self) -> Duration {
        Duration::from_millis(self.ready_deadline_ms)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, PilotError> {
    value.parse().map_err(|_| {
        PilotError::Configuration(format!("{ENV_PREFIX}{name}: invalid value '{value}'"))
    })
}
