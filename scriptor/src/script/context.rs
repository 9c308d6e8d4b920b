use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rhai::{Dynamic, Map};
use tracing::{debug, error, info, warn};

use crate::core::console::ColoredConsole;
use crate::core::environment::EnvMap;

/// Everything a script sees during one invocation.
///
/// Built once after the environment is assembled and shared by every
/// lifecycle phase.
#[derive(Debug, Clone)]
pub struct ScriptContext {
    pub script_name: String,
    pub env: EnvMap,
    pub tmp_dir: PathBuf,
    pub config_path: Option<PathBuf>,
    pub params: Map,
    /// `None` when console interception is disabled.
    pub console: Option<ColoredConsole>,
    pub log: ScriptLogger,
    pub exec: ExecSettings,
}

impl ScriptContext {
    /// The console scripts write to; host stdout when interception is off.
    pub fn console_or_stdout(&self) -> ColoredConsole {
        self.console.clone().unwrap_or_else(ColoredConsole::stdout)
    }

    pub fn env_map(&self) -> Map {
        self.env
            .iter()
            .map(|(key, value)| (key.as_str().into(), Dynamic::from(value.clone())))
            .collect()
    }
}

/// Limits for child processes started by scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecSettings {
    pub timeout: Option<Duration>,
    pub output_limit_bytes: usize,
}

impl Default for ExecSettings {
    fn default() -> Self {
        Self {
            timeout: None,
            output_limit_bytes: 1_000_000,
        }
    }
}

/// Host logger exposed as `ctx.log`. Events go to `tracing`, not the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLogger {
    script: String,
}

impl ScriptLogger {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }

    pub fn info(&self, text: &str) {
        info!(target: "scriptor::script", script = %self.script, "{text}");
    }

    pub fn warn(&self, text: &str) {
        warn!(target: "scriptor::script", script = %self.script, "{text}");
    }

    pub fn error(&self, text: &str) {
        error!(target: "scriptor::script", script = %self.script, "{text}");
    }

    pub fn debug(&self, text: &str) {
        debug!(target: "scriptor::script", script = %self.script, "{text}");
    }
}

/// Shared handle registered with Rhai as the `Context` type.
#[derive(Debug, Clone)]
pub struct ContextHandle(pub Arc<ScriptContext>);

impl ContextHandle {
    pub fn new(ctx: &Arc<ScriptContext>) -> Self {
        Self(Arc::clone(ctx))
    }
}
