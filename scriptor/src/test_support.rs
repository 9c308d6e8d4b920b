//! Test-only fakes and fixtures shared by unit and integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use rhai::{Dynamic, Map};

use crate::core::console::ColoredConsole;
use crate::core::environment::EnvMap;
use crate::core::serialize::serialize;
use crate::core::variables::{VariableDecl, VariableDefinition};
use crate::error::ScriptFailure;
use crate::io::config::LoadedConfig;
use crate::io::prompt::EnvironmentPrompter;
use crate::script::{Export, ExecSettings, ScriptContext, ScriptLogger, ScriptModule};

/// A context with an empty environment and no console.
pub fn test_context() -> Arc<ScriptContext> {
    Arc::new(ScriptContext {
        script_name: "test".to_string(),
        env: EnvMap::new(),
        tmp_dir: std::env::temp_dir(),
        config_path: None,
        params: Map::new(),
        console: None,
        log: ScriptLogger::new("test"),
        exec: ExecSettings::default(),
    })
}

/// Behavior of one phase of a [`FakeModule`].
#[derive(Debug, Clone)]
pub enum FakePhase {
    Return(Dynamic),
    Fail(&'static str),
}

/// One recorded phase invocation.
#[derive(Debug, Clone)]
pub struct FakeCall {
    pub export: Export,
    /// The previous result, serialized.
    pub prior: String,
    pub env: EnvMap,
}

/// In-memory script module that records every phase it runs.
#[derive(Debug)]
pub struct FakeModule {
    name: String,
    variables: Vec<VariableDecl>,
    phases: Vec<(Export, FakePhase)>,
    calls: Mutex<Vec<FakeCall>>,
}

impl FakeModule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            variables: Vec::new(),
            phases: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, export: Export, phase: FakePhase) -> Self {
        self.phases.retain(|(existing, _)| *existing != export);
        self.phases.push((export, phase));
        self
    }

    pub fn with_variables(mut self, variables: Vec<VariableDecl>) -> Self {
        self.variables = variables;
        self
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl ScriptModule for FakeModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        None
    }

    fn variables(&self) -> &[VariableDecl] {
        &self.variables
    }

    fn has_export(&self, export: Export) -> bool {
        self.phases.iter().any(|(existing, _)| *existing == export)
    }

    fn invoke(
        &self,
        export: Export,
        ctx: &Arc<ScriptContext>,
        prior: Dynamic,
    ) -> Result<Dynamic, ScriptFailure> {
        self.calls.lock().expect("calls lock").push(FakeCall {
            export,
            prior: serialize(&prior),
            env: ctx.env.clone(),
        });
        match self.phases.iter().find(|(existing, _)| *existing == export) {
            Some((_, FakePhase::Return(value))) => Ok(value.clone()),
            Some((_, FakePhase::Fail(message))) => Err(ScriptFailure::new("Error", *message)),
            None => Err(ScriptFailure::new("Error", format!("`{export}` is not defined"))),
        }
    }
}

/// Prompter answering from a fixed table and recording what was asked.
///
/// Answers for names that were not requested are returned as well, so tests
/// can check that the engine ignores them.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: EnvMap,
    failure: Option<String>,
    requested: Mutex<Vec<Vec<String>>>,
}

impl ScriptedPrompter {
    pub fn new<K, V>(answers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            answers: answers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Names requested by each call, in order.
    pub fn requested(&self) -> Vec<Vec<String>> {
        self.requested.lock().expect("requested lock").clone()
    }
}

impl EnvironmentPrompter for ScriptedPrompter {
    fn prompt_for_variables(
        &self,
        definitions: &[VariableDefinition],
        _existing: &EnvMap,
    ) -> Result<EnvMap> {
        self.requested
            .lock()
            .expect("requested lock")
            .push(definitions.iter().map(|d| d.name.clone()).collect());
        match &self.failure {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(self.answers.clone()),
        }
    }
}

/// Console sink that keeps every line it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn console(&self) -> ColoredConsole {
        let lines = Arc::clone(&self.lines);
        ColoredConsole::from_fn(move |line| {
            lines.lock().expect("sink lock").push(line.to_string());
        })
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("sink lock").clone()
    }
}

/// A temporary project root with default configuration.
pub struct TestProject {
    // Held so the directory lives as long as the project.
    _dir: tempfile::TempDir,
    config: LoadedConfig,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = LoadedConfig::defaults(dir.path());
        Self { _dir: dir, config }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn config(&self) -> &LoadedConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut LoadedConfig {
        &mut self.config
    }

    pub fn set_default_param(&mut self, name: &str, value: toml::Value) {
        self.config
            .config
            .default_params
            .insert(name.to_string(), value);
    }

    /// Write `contents` to `relative` under the project root.
    pub fn write_file(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    /// Write a script under the scripts directory, adding `.rhai`.
    pub fn write_script(&self, name: &str, source: &str) -> PathBuf {
        let path = self.config.scripts_dir().join(format!("{name}.rhai"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create scripts dir");
        }
        fs::write(&path, source).expect("write script");
        path
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
