//! Typed errors surfaced by the execution engine.
//!
//! Front ends map these to exit codes ([`crate::exit_codes`]) or error panels.
//! Everything raised inside a lifecycle phase arrives as
//! [`EngineError::ScriptRuntime`]; nothing is retried or swallowed.

use std::path::PathBuf;

use rhai::{EvalAltResult, Position};
use thiserror::Error;

use crate::core::serialize::{error_fields, serialize};
use crate::script::Export;

/// Malformed or unreadable configuration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The script path does not exist. Raised before any phase runs.
    #[error("script not found: {}", path.display())]
    ScriptNotFound { path: PathBuf },

    /// The script has no runnable entry point or declares an invalid shape.
    #[error("invalid script {script}: {reason}")]
    InvalidScript { script: String, reason: String },

    /// A lifecycle phase raised an error.
    #[error("`{phase}` failed: {failure}")]
    ScriptRuntime { phase: Export, failure: ScriptFailure },

    /// The prompter could not collect variables (closed terminal, UI gone).
    #[error("prompt for missing variables")]
    Prompt(#[source] anyhow::Error),

    #[error("create temp directory {}", path.display())]
    TempDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub fn invalid_script(script: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScript {
            script: script.into(),
            reason: reason.into(),
        }
    }
}

/// An error raised by script code, already rendered to text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct ScriptFailure {
    pub name: String,
    pub message: String,
    /// Call path and source position; shown only in verbose output.
    pub stack: Option<String>,
}

impl ScriptFailure {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Add the outermost call frame unless the stack already ends with it.
    pub fn within(mut self, fn_name: &str) -> Self {
        let frame = format!("in `{fn_name}`");
        self.stack = match self.stack.take() {
            None => Some(frame),
            Some(stack) if stack.lines().last().is_some_and(|l| l.starts_with(&frame)) => {
                Some(stack)
            }
            Some(stack) => Some(format!("{stack}\n{frame}")),
        };
        self
    }

    /// Convert a Rhai evaluation error, unwrapping nested function calls.
    ///
    /// `throw "text"` becomes `Error: text`; throwing an error-shaped map
    /// (`#{ name: "ValidationError", message: "..." }`) keeps its name.
    /// Stack frames run from the throw site outwards.
    pub fn from_eval(err: &EvalAltResult) -> Self {
        let mut calls = Vec::new();
        let mut current = err;
        while let EvalAltResult::ErrorInFunctionCall(fn_name, _, inner, pos) = current {
            calls.push(format!("in `{fn_name}`{}", position_suffix(*pos)));
            current = inner.as_ref();
        }

        let mut frames = Vec::new();
        let mut failure = match current {
            EvalAltResult::ErrorRuntime(value, pos) => {
                let (name, message) =
                    error_fields(value).unwrap_or_else(|| ("Error".to_string(), serialize(value)));
                if !pos.is_none() {
                    frames.push(format!("thrown{}", position_suffix(*pos)));
                }
                Self::new(name, message)
            }
            other => {
                let pos = other.position();
                if !pos.is_none() {
                    frames.push(format!("raised{}", position_suffix(pos)));
                }
                Self::new("EvalError", other.to_string())
            }
        };
        frames.extend(calls.into_iter().rev());
        if !frames.is_empty() {
            failure.stack = Some(frames.join("\n"));
        }
        failure
    }
}

fn position_suffix(pos: Position) -> String {
    if pos.is_none() {
        String::new()
    } else {
        format!(" at {pos}")
    }
}
