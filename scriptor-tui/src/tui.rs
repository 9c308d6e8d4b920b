//! Terminal setup, teardown and the main event loop.
//!
//! The loop draws a frame, drains background events, then polls the keyboard
//! with a short timeout. Script runs happen on worker threads and never block
//! drawing.

use std::io;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use notify::PollWatcher;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use scriptor::io::config::LoadedConfig;
use scriptor::io::discovery::discover_scripts;
use scriptor::script::{ScriptModule, load_script};
use tracing::{debug, warn};

use crate::app::{App, AppAction, Key, ScriptSummary};
use crate::events::UiEvent;
use crate::ui;
use crate::watcher::watch_scripts;
use crate::worker::spawn_run;

const TICK: Duration = Duration::from_millis(100);

pub struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    app: App,
    config: LoadedConfig,
    verbose: bool,
    events_tx: Sender<UiEvent>,
    events_rx: Receiver<UiEvent>,
    // Kept alive for the lifetime of the UI.
    _watcher: Option<PollWatcher>,
}

impl Tui {
    /// Enter raw mode and the alternate screen.
    pub fn new(config: LoadedConfig, verbose: bool) -> Result<Self> {
        let (events_tx, events_rx) = channel();
        let watcher = match watch_scripts(&config.scripts_dir(), events_tx.clone()) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "script list will not refresh automatically");
                None
            }
        };

        terminal::enable_raw_mode().context("enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout)).context("create terminal")?;

        let mut tui = Self {
            terminal,
            app: App::new(),
            config,
            verbose,
            events_tx,
            events_rx,
            _watcher: watcher,
        };
        tui.reload_scripts();
        Ok(tui)
    }

    /// Run until the user quits.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let app = &self.app;
            self.terminal
                .draw(|frame| ui::render(frame, app))
                .context("draw frame")?;

            if self.drain_events() {
                self.reload_scripts();
            }

            if event::poll(TICK).context("poll terminal events")? {
                if let Event::Key(key) = event::read().context("read terminal event")? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    let action = self.app.handle_key(to_key(key.code, key.modifiers));
                    if let Some(action) = action {
                        if self.handle_action(action) {
                            break;
                        }
                    }
                }
            }
        }
        self.shutdown()
    }

    /// Apply pending background events. Returns true when scripts should be reloaded.
    fn drain_events(&mut self) -> bool {
        let mut reload = false;
        loop {
            match self.events_rx.try_recv() {
                Ok(event) => {
                    if self.app.apply(event) == Some(AppAction::ReloadScripts) {
                        reload = true;
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return reload,
            }
        }
    }

    /// Returns true when the UI should exit.
    fn handle_action(&mut self, action: AppAction) -> bool {
        match action {
            AppAction::Quit => return true,
            AppAction::Run(path) => {
                debug!(script = %path.display(), "starting run");
                // The worker reports through events; its handle is not needed.
                let _ = spawn_run(path, self.config.clone(), self.verbose, self.events_tx.clone());
            }
            AppAction::ReloadScripts => self.reload_scripts(),
        }
        false
    }

    fn reload_scripts(&mut self) {
        match discover_scripts(&self.config) {
            Ok(entries) => {
                let scripts = entries
                    .into_iter()
                    .map(|entry| match load_script(&entry.path) {
                        Ok(script) => ScriptSummary {
                            name: entry.name,
                            description: script.description().map(str::to_string),
                            path: entry.path,
                            invalid: None,
                        },
                        Err(err) => ScriptSummary {
                            name: entry.name,
                            path: entry.path,
                            description: None,
                            invalid: Some(err.to_string()),
                        },
                    })
                    .collect();
                self.app.set_scripts(scripts);
            }
            Err(err) => self.app.status = format!("cannot list scripts: {err:#}"),
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        terminal::disable_raw_mode().context("disable raw mode")?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)
            .context("leave alternate screen")?;
        self.terminal.show_cursor().context("show cursor")?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
    }
}

pub fn to_key(code: KeyCode, modifiers: KeyModifiers) -> Key {
    if modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(ch) = code {
            return Key::Ctrl(ch);
        }
    }
    match code {
        KeyCode::Char(ch) => Key::Char(ch),
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Escape,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        _ => Key::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_chars_map_to_ctrl_keys() {
        assert_eq!(to_key(KeyCode::Char('c'), KeyModifiers::CONTROL), Key::Ctrl('c'));
        assert_eq!(to_key(KeyCode::Char('c'), KeyModifiers::NONE), Key::Char('c'));
        assert_eq!(to_key(KeyCode::Char('R'), KeyModifiers::SHIFT), Key::Char('R'));
        assert_eq!(to_key(KeyCode::Tab, KeyModifiers::NONE), Key::Other);
    }
}
