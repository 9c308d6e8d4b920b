//! The single entry point: load a script, assemble its environment, run it.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rhai::{Array, Dynamic, Map};
use tracing::{debug, info, instrument};

use crate::core::console::ColoredConsole;
use crate::core::environment::{EnvMap, assemble, missing};
use crate::core::variables::resolve;
use crate::error::EngineError;
use crate::io::config::LoadedConfig;
use crate::io::env_files::load_env_files;
use crate::io::prompt::EnvironmentPrompter;
use crate::lifecycle::run_lifecycle;
use crate::script::{ExecSettings, ScriptContext, ScriptLogger, ScriptModule, load_script};

/// Inputs for one script invocation.
pub struct ExecuteOptions<'a> {
    pub script_path: PathBuf,
    pub config: &'a LoadedConfig,
    /// `--env NAME=value` overrides.
    pub cli_vars: EnvMap,
    /// Extra names to prompt for when missing, on top of the script's own.
    pub cli_prompts: Vec<String>,
    /// `--param NAME=value`, overlaid on `default_params` in `ctx.params`.
    pub cli_params: EnvMap,
    /// `None` disables interception; script output then goes to stdout.
    pub console: Option<ColoredConsole>,
    pub prompter: &'a dyn EnvironmentPrompter,
}

impl<'a> ExecuteOptions<'a> {
    pub fn new(
        script_path: impl Into<PathBuf>,
        config: &'a LoadedConfig,
        prompter: &'a dyn EnvironmentPrompter,
    ) -> Self {
        Self {
            script_path: script_path.into(),
            config,
            cli_vars: EnvMap::new(),
            cli_prompts: Vec::new(),
            cli_params: EnvMap::new(),
            console: None,
            prompter,
        }
    }
}

/// Load the script at `options.script_path` and run its lifecycle.
///
/// The script file and env files are read fresh on every call. Returns the
/// entry point's result unchanged.
#[instrument(skip_all, fields(script = %options.script_path.display()))]
pub fn execute_script_with_environment(options: &ExecuteOptions<'_>) -> Result<Dynamic, EngineError> {
    let script = load_script(&options.script_path)?;
    execute_module_with_environment(&script, options)
}

/// Run an already loaded module with the assembled environment.
#[instrument(skip_all, fields(script = %module.name()))]
pub fn execute_module_with_environment<M>(
    module: &M,
    options: &ExecuteOptions<'_>,
) -> Result<Dynamic, EngineError>
where
    M: ScriptModule + ?Sized,
{
    let config = options.config;
    let definitions = resolve(module.variables(), &options.cli_prompts);
    let file_vars = load_env_files(&config.env_file_paths());
    let defaults = &config.config.default_params;

    let snapshot = assemble(&file_vars, defaults, &options.cli_vars, &EnvMap::new());
    let needed = missing(&definitions, &snapshot);
    let prompted = if needed.is_empty() {
        EnvMap::new()
    } else {
        debug!(
            variables = ?needed.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            "prompting for missing variables"
        );
        let answers = options
            .prompter
            .prompt_for_variables(&needed, &snapshot)
            .map_err(EngineError::Prompt)?;
        let requested: HashSet<&str> = needed.iter().map(|d| d.name.as_str()).collect();
        answers
            .into_iter()
            .filter(|(name, _)| requested.contains(name.as_str()))
            .collect()
    };
    let env = assemble(&file_vars, defaults, &options.cli_vars, &prompted);

    let tmp_dir = ensure_tmp_dir(&config.tmp_dir())?;
    let ctx = Arc::new(ScriptContext {
        script_name: module.name().to_string(),
        env,
        tmp_dir,
        config_path: config.path.clone(),
        params: build_params(defaults, &options.cli_params),
        console: options.console.clone(),
        log: ScriptLogger::new(module.name()),
        exec: ExecSettings {
            timeout: config.config.exec_timeout_secs.map(Duration::from_secs),
            output_limit_bytes: config.config.exec_output_limit_bytes,
        },
    });

    let result = run_lifecycle(module, &ctx)?;
    info!("script finished");
    Ok(result)
}

fn ensure_tmp_dir(path: &Path) -> Result<PathBuf, EngineError> {
    fs::create_dir_all(path).map_err(|source| EngineError::TempDir {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(path.to_path_buf())
}

/// `default_params` as Rhai values, with CLI `--param` strings on top.
fn build_params(defaults: &toml::Table, cli_params: &EnvMap) -> Map {
    let mut params: Map = defaults
        .iter()
        .map(|(key, value)| (key.as_str().into(), toml_to_dynamic(value)))
        .collect();
    for (key, value) in cli_params {
        params.insert(key.as_str().into(), Dynamic::from(value.clone()));
    }
    params
}

fn toml_to_dynamic(value: &toml::Value) -> Dynamic {
    match value {
        toml::Value::String(s) => Dynamic::from(s.clone()),
        toml::Value::Integer(i) => Dynamic::from_int(*i),
        toml::Value::Float(f) => Dynamic::from_float(*f),
        toml::Value::Boolean(b) => Dynamic::from_bool(*b),
        toml::Value::Datetime(dt) => Dynamic::from(dt.to_string()),
        toml::Value::Array(items) => {
            Dynamic::from_array(items.iter().map(toml_to_dynamic).collect::<Array>())
        }
        toml::Value::Table(table) => Dynamic::from_map(
            table
                .iter()
                .map(|(key, value)| (key.as_str().into(), toml_to_dynamic(value)))
                .collect::<Map>(),
        ),
    }
}
