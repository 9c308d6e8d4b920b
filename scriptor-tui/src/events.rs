//! Messages from background threads to the UI thread.

use std::sync::mpsc::Sender;

use scriptor::core::environment::EnvMap;
use scriptor::core::variables::VariableDefinition;

/// A batch of variables the engine is waiting on.
///
/// The worker blocks until `reply` receives the answers or is dropped.
#[derive(Debug)]
pub struct PromptRequest {
    pub definitions: Vec<VariableDefinition>,
    pub reply: Sender<EnvMap>,
}

#[derive(Debug)]
pub enum UiEvent {
    /// One formatted console line from the running script.
    Output(String),
    Prompt(PromptRequest),
    /// The run ended. `Ok` carries the rendered result, `Err` the rendered error.
    Finished(Result<String, String>),
    /// Scripts were added, removed or edited on disk.
    ScriptsChanged,
}
