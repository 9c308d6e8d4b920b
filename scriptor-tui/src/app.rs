//! Application state machine, independent of the terminal.
//!
//! Keys come in as [`Key`] values and background work arrives as
//! [`UiEvent`]s; both mutate [`App`] and may ask the terminal loop to do something
//! through an [`AppAction`].

use std::path::PathBuf;

use scriptor::core::console::{RED, RESET};
use scriptor::core::environment::EnvMap;
use scriptor::core::variables::{VariableDefinition, VariableType};

use crate::events::{PromptRequest, UiEvent};

/// Output lines kept in memory; older lines are dropped first.
pub const MAX_OUTPUT_LINES: usize = 5_000;

/// Terminal-independent key representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Ctrl(char),
    Other,
}

/// Work the terminal loop performs on behalf of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    Run(PathBuf),
    ReloadScripts,
}

/// One row of the script list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSummary {
    pub name: String,
    pub path: PathBuf,
    pub description: Option<String>,
    /// Load error, when the script cannot be run.
    pub invalid: Option<String>,
}

/// Modal dialog collecting one batch of variables, one at a time.
#[derive(Debug)]
pub struct PromptModal {
    definitions: Vec<VariableDefinition>,
    index: usize,
    pub input: String,
    answers: EnvMap,
    reply: std::sync::mpsc::Sender<EnvMap>,
}

impl PromptModal {
    fn new(request: PromptRequest) -> Self {
        Self {
            definitions: request.definitions,
            index: 0,
            input: String::new(),
            answers: EnvMap::new(),
            reply: request.reply,
        }
    }

    pub fn current(&self) -> Option<&VariableDefinition> {
        self.definitions.get(self.index)
    }

    /// 1-based position and batch size, for the dialog title.
    pub fn progress(&self) -> (usize, usize) {
        (self.index + 1, self.definitions.len())
    }

    /// The input as it should be displayed; passwords are masked.
    pub fn display_input(&self) -> String {
        match self.current().map(|def| def.kind) {
            Some(VariableType::Password) => "*".repeat(self.input.chars().count()),
            _ => self.input.clone(),
        }
    }

    /// Record `value` for the current variable. Returns true when the batch is complete.
    fn answer(&mut self, value: String) -> bool {
        if let Some(def) = self.definitions.get(self.index) {
            self.answers.insert(def.name.clone(), value);
        }
        self.index += 1;
        self.input.clear();
        self.index >= self.definitions.len()
    }

    fn finish(self) {
        // The worker may have given up already; nothing to do then.
        let _ = self.reply.send(self.answers);
    }
}

#[derive(Debug, Default)]
pub struct App {
    pub scripts: Vec<ScriptSummary>,
    pub selected: usize,
    pub output: Vec<String>,
    /// Lines scrolled up from the bottom of the output.
    pub scroll: usize,
    /// Name of the script currently running.
    pub running: Option<String>,
    pub modal: Option<PromptModal>,
    pub status: String,
}

impl App {
    pub fn new() -> Self {
        Self {
            status: "enter: run  j/k: select  pgup/pgdn: scroll  c: clear  q: quit".to_string(),
            ..Self::default()
        }
    }

    /// Replace the script list, keeping the selection on the same name when possible.
    pub fn set_scripts(&mut self, scripts: Vec<ScriptSummary>) {
        let previous = self.selected_script().map(|s| s.name.clone());
        self.scripts = scripts;
        self.selected = previous
            .and_then(|name| self.scripts.iter().position(|s| s.name == name))
            .unwrap_or(0)
            .min(self.scripts.len().saturating_sub(1));
    }

    pub fn selected_script(&self) -> Option<&ScriptSummary> {
        self.scripts.get(self.selected)
    }

    pub fn handle_key(&mut self, key: Key) -> Option<AppAction> {
        if key == Key::Ctrl('c') {
            return Some(AppAction::Quit);
        }
        if self.modal.is_some() {
            self.handle_modal_key(key);
            return None;
        }
        match key {
            Key::Char('q') => Some(AppAction::Quit),
            Key::Up | Key::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            Key::Down | Key::Char('j') => {
                if self.selected + 1 < self.scripts.len() {
                    self.selected += 1;
                }
                None
            }
            Key::PageUp => {
                self.scroll = (self.scroll + 10).min(self.output.len());
                None
            }
            Key::PageDown => {
                self.scroll = self.scroll.saturating_sub(10);
                None
            }
            Key::Home => {
                self.scroll = self.output.len();
                None
            }
            Key::End => {
                self.scroll = 0;
                None
            }
            Key::Char('c') => {
                self.output.clear();
                self.scroll = 0;
                None
            }
            Key::Char('R') => Some(AppAction::ReloadScripts),
            Key::Enter | Key::Char('r') => self.start_selected(),
            _ => None,
        }
    }

    fn start_selected(&mut self) -> Option<AppAction> {
        if self.running.is_some() {
            self.status = "a script is already running".to_string();
            return None;
        }
        let script = self.selected_script()?.clone();
        if let Some(reason) = &script.invalid {
            self.push_output(format!("{RED}{}: {reason}{RESET}", script.name));
            return None;
        }
        self.push_output(format!("── {} ──", script.name));
        self.status = format!("running {}", script.name);
        self.running = Some(script.name);
        Some(AppAction::Run(script.path))
    }

    fn handle_modal_key(&mut self, key: Key) {
        let Some(modal) = self.modal.as_mut() else {
            return;
        };
        let done = match key {
            Key::Char(ch) => {
                modal.input.push(ch);
                false
            }
            Key::Backspace => {
                modal.input.pop();
                false
            }
            Key::Enter => {
                let value = std::mem::take(&mut modal.input);
                modal.answer(value)
            }
            // Skipping leaves the variable empty instead of blocking the batch.
            Key::Escape => modal.answer(String::new()),
            _ => false,
        };
        if done {
            if let Some(modal) = self.modal.take() {
                modal.finish();
            }
        }
    }

    /// Apply a background event. May ask for the script list to be reloaded.
    pub fn apply(&mut self, event: UiEvent) -> Option<AppAction> {
        match event {
            UiEvent::Output(line) => self.push_output(line),
            UiEvent::Prompt(request) => {
                let modal = PromptModal::new(request);
                if modal.current().is_some() {
                    self.modal = Some(modal);
                } else {
                    modal.finish();
                }
            }
            UiEvent::Finished(outcome) => {
                let name = self.running.take().unwrap_or_default();
                match outcome {
                    Ok(rendered) => {
                        if !rendered.is_empty() {
                            self.push_output(format!("=> {rendered}"));
                        }
                        self.status = format!("{name} finished");
                    }
                    Err(message) => {
                        self.push_output(format!("{RED}{message}{RESET}"));
                        self.status = format!("{name} failed");
                    }
                }
            }
            UiEvent::ScriptsChanged => return Some(AppAction::ReloadScripts),
        }
        None
    }

    pub fn push_output(&mut self, line: String) {
        self.output.push(line);
        if self.output.len() > MAX_OUTPUT_LINES {
            let excess = self.output.len() - MAX_OUTPUT_LINES;
            self.output.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    fn summary(name: &str) -> ScriptSummary {
        ScriptSummary {
            name: name.to_string(),
            path: PathBuf::from(format!("scripts/{name}.rhai")),
            description: None,
            invalid: None,
        }
    }

    fn app_with(names: &[&str]) -> App {
        let mut app = App::new();
        app.set_scripts(names.iter().map(|n| summary(n)).collect());
        app
    }

    #[test]
    fn selection_stays_within_bounds() {
        let mut app = app_with(&["a", "b"]);
        app.handle_key(Key::Up);
        assert_eq!(app.selected, 0);
        app.handle_key(Key::Down);
        app.handle_key(Key::Down);
        assert_eq!(app.selected, 1);
    }

    #[test]
    fn reload_keeps_selected_name() {
        let mut app = app_with(&["a", "b", "c"]);
        app.selected = 2;
        app.set_scripts(vec![summary("c"), summary("d")]);
        assert_eq!(app.selected_script().map(|s| s.name.as_str()), Some("c"));
    }

    #[test]
    fn enter_runs_selected_script_once() {
        let mut app = app_with(&["deploy"]);
        let action = app.handle_key(Key::Enter);
        assert_eq!(action, Some(AppAction::Run(PathBuf::from("scripts/deploy.rhai"))));
        assert_eq!(app.running.as_deref(), Some("deploy"));
        assert_eq!(app.handle_key(Key::Enter), None);
    }

    #[test]
    fn invalid_scripts_are_not_run() {
        let mut app = App::new();
        let mut broken = summary("broken");
        broken.invalid = Some("parse error".to_string());
        app.set_scripts(vec![broken]);

        assert_eq!(app.handle_key(Key::Enter), None);
        assert!(app.running.is_none());
        assert!(app.output[0].contains("parse error"));
    }

    /// The modal walks the batch in order; Esc answers with an empty value.
    #[test]
    fn modal_collects_answers_and_replies() {
        let mut app = App::new();
        let (reply, answers) = channel();
        let mut secret = VariableDefinition::input("TOKEN");
        secret.kind = VariableType::Password;
        app.apply(UiEvent::Prompt(PromptRequest {
            definitions: vec![secret, VariableDefinition::input("REGION")],
            reply,
        }));

        for ch in "abc".chars() {
            app.handle_key(Key::Char(ch));
        }
        let modal = app.modal.as_ref().expect("modal open");
        assert_eq!(modal.display_input(), "***");
        assert_eq!(modal.progress(), (1, 2));
        app.handle_key(Key::Enter);
        app.handle_key(Key::Escape);

        assert!(app.modal.is_none());
        let answers = answers.recv().expect("answers");
        assert_eq!(answers.get("TOKEN").map(String::as_str), Some("abc"));
        assert_eq!(answers.get("REGION").map(String::as_str), Some(""));
    }

    #[test]
    fn keys_go_to_modal_while_it_is_open() {
        let mut app = app_with(&["a"]);
        let (reply, _answers) = channel();
        app.apply(UiEvent::Prompt(PromptRequest {
            definitions: vec![VariableDefinition::input("X")],
            reply,
        }));
        assert_eq!(app.handle_key(Key::Char('q')), None);
        assert_eq!(app.modal.as_ref().map(|m| m.input.as_str()), Some("q"));
    }

    #[test]
    fn finished_run_reports_result_or_error() {
        let mut app = app_with(&["a"]);
        app.handle_key(Key::Enter);
        app.apply(UiEvent::Finished(Ok("42".to_string())));
        assert!(app.running.is_none());
        assert_eq!(app.output.last().map(String::as_str), Some("=> 42"));

        app.handle_key(Key::Enter);
        app.apply(UiEvent::Finished(Err("`main` failed: Error: x".to_string())));
        assert_eq!(app.status, "a failed");
    }

    #[test]
    fn output_is_capped() {
        let mut app = App::new();
        for i in 0..MAX_OUTPUT_LINES + 5 {
            app.push_output(i.to_string());
        }
        assert_eq!(app.output.len(), MAX_OUTPUT_LINES);
        assert_eq!(app.output[0], "5");
    }

    #[test]
    fn scripts_changed_requests_reload() {
        let mut app = App::new();
        assert_eq!(app.apply(UiEvent::ScriptsChanged), Some(AppAction::ReloadScripts));
    }
}
