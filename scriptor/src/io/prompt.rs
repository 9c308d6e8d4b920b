//! Interactive collection of missing environment variables.
//!
//! [`EnvironmentPrompter`] is the single seam between the engine and a user
//! interface. The CLI wires [`LinePrompter`]; the terminal UI provides a modal
//! implementation of its own. Collected values only ever flow back into the
//! in-memory environment: implementations must not log them.

use std::io::{BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};
use tracing::debug;

use crate::core::environment::EnvMap;
use crate::core::variables::{VariableDefinition, VariableType};

/// Collects values for `definitions`, blocking until the user answers.
///
/// A skipped variable yields an empty string rather than failing the batch.
pub trait EnvironmentPrompter {
    fn prompt_for_variables(
        &self,
        definitions: &[VariableDefinition],
        existing: &EnvMap,
    ) -> Result<EnvMap>;
}

/// Sequential line-mode prompter.
///
/// On a terminal, uses `dialoguer` with masked input for `password`
/// variables. Otherwise reads one line per variable from stdin, so values can
/// be piped in.
pub struct LinePrompter {
    interactive: bool,
}

impl LinePrompter {
    pub fn new() -> Self {
        Self {
            interactive: std::io::stdin().is_terminal() && std::io::stderr().is_terminal(),
        }
    }
}

impl Default for LinePrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentPrompter for LinePrompter {
    fn prompt_for_variables(
        &self,
        definitions: &[VariableDefinition],
        _existing: &EnvMap,
    ) -> Result<EnvMap> {
        let mut answers = EnvMap::new();
        for def in definitions {
            let value = if self.interactive {
                prompt_terminal(def)?
            } else {
                prompt_piped(def)?
            };
            if value.is_empty() {
                debug!(name = %def.name, "variable skipped");
            }
            answers.insert(def.name.clone(), value);
        }
        Ok(answers)
    }
}

fn prompt_terminal(def: &VariableDefinition) -> Result<String> {
    let theme = ColorfulTheme::default();
    match def.kind {
        VariableType::Password => Password::with_theme(&theme)
            .with_prompt(&def.message)
            .allow_empty_password(true)
            .interact()
            .with_context(|| format!("prompt for {}", def.name)),
        VariableType::Input => Input::<String>::with_theme(&theme)
            .with_prompt(&def.message)
            .allow_empty(true)
            .interact_text()
            .with_context(|| format!("prompt for {}", def.name)),
    }
}

fn prompt_piped(def: &VariableDefinition) -> Result<String> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{} ", def.message).context("write prompt")?;
    stderr.flush().context("flush prompt")?;
    read_answer(&mut std::io::stdin().lock())
}

/// Read one answer line; end of input counts as skipping.
fn read_answer<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line).context("read answer")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
