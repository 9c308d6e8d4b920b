//! Stable exit codes for `scriptor` CLI commands.

use crate::error::{ConfigError, EngineError};

/// Command succeeded.
pub const OK: i32 = 0;
/// A lifecycle phase raised an error.
pub const SCRIPT_FAILED: i32 = 1;
/// The config file could not be read, parsed or validated.
pub const CONFIG: i32 = 2;
/// The script path does not exist.
pub const NOT_FOUND: i32 = 3;
/// The script does not compile or has an invalid shape.
pub const INVALID_SCRIPT: i32 = 4;
/// Bad arguments, prompt failures and everything else.
pub const USAGE: i32 = 5;

/// Map an engine error to its exit code.
pub fn for_engine_error(err: &EngineError) -> i32 {
    match err {
        EngineError::Config(_) => CONFIG,
        EngineError::ScriptNotFound { .. } => NOT_FOUND,
        EngineError::InvalidScript { .. } => INVALID_SCRIPT,
        EngineError::ScriptRuntime { .. } => SCRIPT_FAILED,
        EngineError::Prompt(_) | EngineError::TempDir { .. } => USAGE,
    }
}

/// Map any command error to its exit code by looking for typed causes.
pub fn for_error(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(engine) = cause.downcast_ref::<EngineError>() {
            return for_engine_error(engine);
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return CONFIG;
        }
    }
    USAGE
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::path::PathBuf;

    #[test]
    fn typed_errors_keep_their_code_through_context() {
        let err: anyhow::Result<()> = Err(EngineError::ScriptNotFound {
            path: PathBuf::from("x.rhai"),
        })
        .context("run script");
        assert_eq!(for_error(&err.unwrap_err()), NOT_FOUND);

        let err: anyhow::Result<()> =
            Err(ConfigError::Invalid("bad".into())).context("load config");
        assert_eq!(for_error(&err.unwrap_err()), CONFIG);
    }

    #[test]
    fn untyped_errors_are_usage_errors() {
        assert_eq!(for_error(&anyhow::anyhow!("nope")), USAGE);
    }

    #[test]
    fn engine_config_errors_map_to_config() {
        let err = EngineError::from(ConfigError::Invalid("bad".into()));
        assert_eq!(for_engine_error(&err), CONFIG);
    }
}
