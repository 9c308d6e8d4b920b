//! Runs a script on a background thread so the UI keeps drawing.

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use scriptor::core::console::ColoredConsole;
use scriptor::core::serialize::{SerializeOptions, serialize, serialize_failure};
use scriptor::io::config::LoadedConfig;
use scriptor::{EngineError, ExecuteOptions, execute_script_with_environment};
use tracing::{info, warn};

use crate::events::UiEvent;
use crate::prompter::ModalPrompter;

/// Start one run. Console lines, prompts and the outcome arrive as events.
pub fn spawn_run(
    script_path: PathBuf,
    config: LoadedConfig,
    verbose: bool,
    events: Sender<UiEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        info!(script = %script_path.display(), "run started");
        let output = events.clone();
        let console = ColoredConsole::from_fn(move |line| {
            // Lines written after the UI closed are dropped.
            let _ = output.send(UiEvent::Output(line.to_string()));
        });
        let prompter = ModalPrompter::new(events.clone());
        let mut options = ExecuteOptions::new(script_path, &config, &prompter);
        options.console = Some(console);

        let outcome = match execute_script_with_environment(&options) {
            Ok(result) if result.is_unit() => Ok(String::new()),
            Ok(result) => Ok(serialize(&result)),
            Err(err) => {
                warn!(err = %err, "run failed");
                Err(render_error(&err, verbose))
            }
        };
        let _ = events.send(UiEvent::Finished(outcome));
    })
}

fn render_error(err: &EngineError, verbose: bool) -> String {
    match err {
        EngineError::ScriptRuntime { phase, failure } => format!(
            "`{phase}` failed: {}",
            serialize_failure(failure, SerializeOptions { verbose })
        ),
        other => {
            let mut message = other.to_string();
            let mut source = std::error::Error::source(other);
            while let Some(cause) = source {
                message.push_str(": ");
                message.push_str(&cause.to_string());
                source = cause.source();
            }
            message
        }
    }
}
