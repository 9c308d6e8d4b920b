//! Terminal UI for the script execution engine.
//!
//! Lists scripts from the scripts directory, runs the selected one on a
//! worker thread, streams its console output into a scrollable panel and
//! collects missing variables through modal dialogs.

mod ansi;
mod app;
mod events;
mod prompter;
mod tui;
mod ui;
mod watcher;
mod worker;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use scriptor::io::config::discover_config;
use scriptor::{exit_codes, logging};

const LOG_FILE_NAME: &str = "scriptor-tui.log";

#[derive(Parser)]
#[command(name = "scriptor-tui", version, about = "Browse and run scripts in a terminal UI")]
struct Cli {
    /// Config file to use instead of the nearest `scriptor.toml`.
    #[arg(long, env = "SCRIPTOR_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging and error stacks.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(exit_codes::for_error(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("read working directory")?;
    let config = discover_config(cli.config.as_deref(), &cwd)?;
    logging::init_file(&config.tmp_dir().join(LOG_FILE_NAME), cli.verbose)?;

    let mut tui = tui::Tui::new(config, cli.verbose)?;
    tui.run()
}
