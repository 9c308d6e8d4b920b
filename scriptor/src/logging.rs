//! Development-time tracing for debugging the engine.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG`. Script
//!   `ctx.log` calls land here too, under the `scriptor::script` target.
//!
//! - **Script console**: Colorized script output forwarded to a sink
//!   (stdout or the TUI output panel). Unaffected by `RUST_LOG`.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset, `debug` for this
/// crate when `verbose` is set.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=scriptor=debug cargo run -- run hello
/// ```
pub fn init(verbose: bool) {
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Like [`init`], but appends to `path` so output does not draw over a TUI.
pub fn init_file(path: &Path, verbose: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .compact(),
        )
        .init();
    Ok(())
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,scriptor=debug")
        } else {
            EnvFilter::new("warn")
        }
    })
}
