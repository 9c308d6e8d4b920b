//! Polls the scripts directory and reports changes to the UI.

use std::path::Path;
use std::sync::mpsc::Sender;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event as NotifyEvent, EventKind, PollWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::events::UiEvent;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Watch `dir` recursively. The returned watcher must be kept alive.
pub fn watch_scripts(dir: &Path, events: Sender<UiEvent>) -> Result<PollWatcher> {
    let mut watcher = PollWatcher::new(
        move |res: Result<NotifyEvent, notify::Error>| match res {
            Ok(event) if is_relevant(&event) => {
                let _ = events.send(UiEvent::ScriptsChanged);
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "script watcher error"),
        },
        notify::Config::default().with_poll_interval(POLL_INTERVAL),
    )
    .context("create script watcher")?;
    watcher
        .watch(dir, RecursiveMode::Recursive)
        .with_context(|| format!("watch {}", dir.display()))?;
    info!(path = %dir.display(), "watching scripts directory");
    Ok(watcher)
}

fn is_relevant(event: &NotifyEvent) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|path| path.extension().is_some_and(|ext| ext == "rhai"))
}
