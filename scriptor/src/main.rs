//! Unified script execution engine, line-mode front end.
//!
//! Runs a Rhai script's lifecycle with an environment assembled from env
//! files, config defaults, `--env` overrides and interactive prompts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use scriptor::core::console::ColoredConsole;
use scriptor::core::environment::{EnvMap, parse_assignment};
use scriptor::core::serialize::{SerializeOptions, serialize, serialize_failure};
use scriptor::io::config::{LoadedConfig, discover_config};
use scriptor::io::discovery::{discover_scripts, resolve_script_path};
use scriptor::io::init::{InitOptions, init_project};
use scriptor::io::prompt::LinePrompter;
use scriptor::script::{ScriptModule, load_script};
use scriptor::{EngineError, ExecuteOptions, execute_script_with_environment, exit_codes, logging};

#[derive(Parser)]
#[command(name = "scriptor", version, about = "Run scripts with an assembled environment")]
struct Cli {
    /// Config file to use instead of the nearest `scriptor.toml`.
    #[arg(long, global = true, env = "SCRIPTOR_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script: tear_up, then main or execute, then tear_down.
    Run(RunArgs),
    /// List scripts under the scripts directory.
    List,
    /// Create `scriptor.toml` and an example script.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Script path, or a name relative to the scripts directory (`.rhai` optional).
    script: String,

    /// Set a variable, overriding env files and config defaults.
    #[arg(long = "env", value_name = "NAME=value")]
    env: Vec<String>,

    /// Prompt for these variables when they are missing.
    #[arg(long = "env-prompts", value_name = "NAME", value_delimiter = ',')]
    env_prompts: Vec<String>,

    /// Set a script parameter (`ctx.params`).
    #[arg(long = "param", value_name = "NAME=value")]
    params: Vec<String>,

    /// Do not intercept script output; print it unformatted.
    #[arg(long)]
    no_console: bool,

    /// Debug logging and error stacks.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    let verbose = matches!(&cli.command, Command::Run(args) if args.verbose);
    logging::init(verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_codes::for_error(&err)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let cwd = std::env::current_dir().context("read working directory")?;
    match cli.command {
        Command::Init { force } => cmd_init(&cwd, force),
        Command::List => {
            let loaded = discover_config(cli.config.as_deref(), &cwd)?;
            cmd_list(&loaded)
        }
        Command::Run(args) => {
            let loaded = discover_config(cli.config.as_deref(), &cwd)?;
            cmd_run(&loaded, &args)
        }
    }
}

fn cmd_init(cwd: &Path, force: bool) -> Result<i32> {
    let paths = init_project(cwd, &InitOptions { force })?;
    println!("created {}", paths.config_path.display());
    println!("created {}", paths.example_script_path.display());
    Ok(exit_codes::OK)
}

fn cmd_list(loaded: &LoadedConfig) -> Result<i32> {
    for entry in discover_scripts(loaded)? {
        match load_script(&entry.path) {
            Ok(script) => match script.description() {
                Some(description) => println!("{}\t{description}", entry.name),
                None => println!("{}", entry.name),
            },
            Err(err) => println!("{}\t(invalid: {err})", entry.name),
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_run(loaded: &LoadedConfig, args: &RunArgs) -> Result<i32> {
    let prompter = LinePrompter::new();
    let script_path = resolve_script_path(loaded, &args.script);
    let mut options = ExecuteOptions::new(script_path, loaded, &prompter);
    options.cli_vars = parse_assignments(&args.env).context("parse --env")?;
    options.cli_params = parse_assignments(&args.params).context("parse --param")?;
    options.cli_prompts = args
        .env_prompts
        .iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if !args.no_console {
        options.console = Some(ColoredConsole::stdout());
    }

    match execute_script_with_environment(&options) {
        Ok(result) => {
            if !result.is_unit() {
                println!("{}", serialize(&result));
            }
            Ok(exit_codes::OK)
        }
        Err(err) => {
            report(&err, args.verbose);
            Ok(exit_codes::for_engine_error(&err))
        }
    }
}

fn parse_assignments(raw: &[String]) -> Result<EnvMap> {
    raw.iter().map(|item| parse_assignment(item)).collect()
}

fn report(err: &EngineError, verbose: bool) {
    if let EngineError::ScriptRuntime { phase, failure } = err {
        let rendered = serialize_failure(failure, SerializeOptions { verbose });
        eprintln!("error: `{phase}` failed: {rendered}");
        return;
    }
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    eprintln!("error: {message}");
}
