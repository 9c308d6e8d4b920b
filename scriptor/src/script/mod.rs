//! Script modules: what a loaded script exports and how phases are invoked.

mod context;
mod host;
mod loader;

use std::fmt;
use std::sync::Arc;

use rhai::Dynamic;

use crate::core::variables::VariableDecl;
use crate::error::ScriptFailure;

pub use context::{ContextHandle, ExecSettings, ScriptContext, ScriptLogger};
pub use host::build_engine;
pub use loader::{RhaiScript, load_script};

/// Lifecycle functions a script may export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Export {
    TearUp,
    Execute,
    /// The default entry point. Named `main` because `default` is reserved in Rhai.
    Main,
    TearDown,
}

impl Export {
    pub const ALL: [Export; 4] = [Export::TearUp, Export::Execute, Export::Main, Export::TearDown];

    /// Function name looked up in the script.
    pub fn fn_name(self) -> &'static str {
        match self {
            Export::TearUp => "tear_up",
            Export::Execute => "execute",
            Export::Main => "main",
            Export::TearDown => "tear_down",
        }
    }

    pub fn from_fn_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|export| export.fn_name() == name)
    }
}

impl fmt::Display for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fn_name())
    }
}

/// A loaded script, independent of how it was produced.
///
/// The Rhai loader is the production implementation; tests drive the
/// lifecycle with in-memory modules.
pub trait ScriptModule {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str>;

    fn variables(&self) -> &[VariableDecl];

    fn has_export(&self, export: Export) -> bool;

    /// Call one exported phase. `prior` is the previous phase's result.
    fn invoke(
        &self,
        export: Export,
        ctx: &Arc<ScriptContext>,
        prior: Dynamic,
    ) -> Result<Dynamic, ScriptFailure>;

    /// `main` when exported, otherwise `execute`.
    fn entry_point(&self) -> Option<Export> {
        [Export::Main, Export::Execute]
            .into_iter()
            .find(|export| self.has_export(*export))
    }
}
