//! Ordered execution of a script's lifecycle phases.
//!
//! `tear_up` → entry (`main` or `execute`) → `tear_down`. A failing
//! `tear_up` aborts everything; a failing entry still gets its `tear_down`.

use std::sync::Arc;

use rhai::Dynamic;
use tracing::{debug, instrument, warn};

use crate::error::EngineError;
use crate::script::{Export, ScriptContext, ScriptModule};

/// Run every exported phase of `module` against one shared context.
///
/// Returns the entry point's result. When the entry fails, `tear_down` runs
/// with `()` as the previous result and the entry error is returned even if
/// `tear_down` fails too.
#[instrument(skip_all, fields(script = %module.name()))]
pub fn run_lifecycle<M>(module: &M, ctx: &Arc<ScriptContext>) -> Result<Dynamic, EngineError>
where
    M: ScriptModule + ?Sized,
{
    let entry = module.entry_point().ok_or_else(|| {
        EngineError::invalid_script(module.name(), "must define `fn execute` or `fn main`")
    })?;

    let prepared = if module.has_export(Export::TearUp) {
        run_phase(module, Export::TearUp, ctx, Dynamic::UNIT)?
    } else {
        Dynamic::UNIT
    };

    let outcome = run_phase(module, entry, ctx, prepared);

    if !module.has_export(Export::TearDown) {
        return outcome;
    }
    match outcome {
        Ok(result) => {
            run_phase(module, Export::TearDown, ctx, result.clone())?;
            Ok(result)
        }
        Err(entry_err) => {
            if let Err(cleanup_err) = run_phase(module, Export::TearDown, ctx, Dynamic::UNIT) {
                warn!(err = %cleanup_err, "tear_down failed after entry failure");
            }
            Err(entry_err)
        }
    }
}

fn run_phase<M>(
    module: &M,
    export: Export,
    ctx: &Arc<ScriptContext>,
    prior: Dynamic,
) -> Result<Dynamic, EngineError>
where
    M: ScriptModule + ?Sized,
{
    debug!(phase = %export, "running phase");
    module
        .invoke(export, ctx, prior)
        .map_err(|failure| EngineError::ScriptRuntime {
            phase: export,
            failure,
        })
}
