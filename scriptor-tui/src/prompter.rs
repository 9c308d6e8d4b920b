//! Prompter that hands variable requests to the UI thread.

use std::sync::mpsc::{Sender, channel};

use anyhow::{Result, anyhow};
use scriptor::core::environment::EnvMap;
use scriptor::core::variables::VariableDefinition;
use scriptor::io::prompt::EnvironmentPrompter;
use tracing::debug;

use crate::events::{PromptRequest, UiEvent};

/// Sends each batch to the UI as a modal and blocks until it answers.
pub struct ModalPrompter {
    events: Sender<UiEvent>,
}

impl ModalPrompter {
    pub fn new(events: Sender<UiEvent>) -> Self {
        Self { events }
    }
}

impl EnvironmentPrompter for ModalPrompter {
    fn prompt_for_variables(
        &self,
        definitions: &[VariableDefinition],
        _existing: &EnvMap,
    ) -> Result<EnvMap> {
        let (reply, answers) = channel();
        debug!(count = definitions.len(), "requesting modal prompt");
        self.events
            .send(UiEvent::Prompt(PromptRequest {
                definitions: definitions.to_vec(),
                reply,
            }))
            .map_err(|_| anyhow!("terminal UI is gone"))?;
        answers
            .recv()
            .map_err(|_| anyhow!("prompt was closed before all variables were answered"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn blocks_until_the_ui_replies() {
        let (tx, rx) = channel();
        let ui = thread::spawn(move || {
            let Ok(UiEvent::Prompt(request)) = rx.recv() else {
                panic!("expected a prompt request");
            };
            assert_eq!(request.definitions[0].name, "TOKEN");
            let answers = EnvMap::from([("TOKEN".to_string(), "abc".to_string())]);
            request.reply.send(answers).expect("reply");
        });

        let prompter = ModalPrompter::new(tx);
        let answers = prompter
            .prompt_for_variables(&[VariableDefinition::input("TOKEN")], &EnvMap::new())
            .expect("answers");

        ui.join().expect("ui thread");
        assert_eq!(answers.get("TOKEN").map(String::as_str), Some("abc"));
    }

    #[test]
    fn dropped_reply_is_an_error() {
        let (tx, rx) = channel();
        let ui = thread::spawn(move || drop(rx.recv()));

        let prompter = ModalPrompter::new(tx);
        let result =
            prompter.prompt_for_variables(&[VariableDefinition::input("TOKEN")], &EnvMap::new());

        ui.join().expect("ui thread");
        assert!(result.is_err());
    }
}
