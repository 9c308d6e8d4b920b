//! Unified script execution engine.
//!
//! Runs user-authored Rhai scripts under a fixed lifecycle
//! (`tear_up` → `execute`/`main` → `tear_down`) with an assembled environment,
//! a temp working area and a colorized console. The same engine backs the
//! line-mode CLI and the terminal UI. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure logic (serialization, console formatting, environment
//!   precedence, variable resolution). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (config, env files, prompting,
//!   child processes, discovery, scaffolding).
//! - **[`script`]**: The script module contract and its Rhai implementation.
//!
//! Orchestration modules ([`lifecycle`], [`execute`]) tie them together behind
//! [`execute::execute_script_with_environment`].

pub mod core;
pub mod error;
pub mod execute;
pub mod exit_codes;
pub mod io;
pub mod lifecycle;
pub mod logging;
pub mod script;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{ConfigError, EngineError, ScriptFailure};
pub use execute::{ExecuteOptions, execute_script_with_environment};
