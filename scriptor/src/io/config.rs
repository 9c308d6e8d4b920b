//! Project configuration stored in `scriptor.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "scriptor.toml";

/// Project configuration (TOML).
///
/// Meant to be edited by humans. Missing fields fall back to defaults; relative
/// paths resolve against the directory that holds the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScriptorConfig {
    /// Directory scanned for `*.rhai` scripts.
    pub scripts_dir: PathBuf,

    /// Temp working area handed to scripts as `ctx.tmp_dir`.
    pub tmp_dir: PathBuf,

    /// Env files merged in order; later files override earlier ones.
    pub env_files: Vec<PathBuf>,

    /// Glob patterns (relative to `scripts_dir`) hidden from discovery.
    pub exclude_patterns: Vec<String>,

    /// Wall-clock limit for child processes started by scripts. Unset means no limit.
    pub exec_timeout_secs: Option<u64>,

    /// Truncate captured child process output beyond this many bytes.
    pub exec_output_limit_bytes: usize,

    /// Defaults exposed as `ctx.params` and as the config layer of the environment.
    pub default_params: toml::Table,
}

impl Default for ScriptorConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("scripts"),
            tmp_dir: PathBuf::from(".tmp"),
            env_files: vec![PathBuf::from(".env"), PathBuf::from(".env.local")],
            exclude_patterns: Vec::new(),
            exec_timeout_secs: None,
            exec_output_limit_bytes: 1_000_000,
            default_params: toml::Table::new(),
        }
    }
}

impl ScriptorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scripts_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("scripts_dir must not be empty".into()));
        }
        if self.tmp_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("tmp_dir must not be empty".into()));
        }
        if self.exec_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("exec_timeout_secs must be > 0".into()));
        }
        if self.exec_output_limit_bytes == 0 {
            return Err(ConfigError::Invalid(
                "exec_output_limit_bytes must be > 0".into(),
            ));
        }
        for pattern in &self.exclude_patterns {
            glob::Pattern::new(pattern).map_err(|err| {
                ConfigError::Invalid(format!("exclude pattern `{pattern}`: {err}"))
            })?;
        }
        Ok(())
    }
}

/// Configuration together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    /// Base for relative paths.
    pub root: PathBuf,
    /// The file that was loaded, if any.
    pub path: Option<PathBuf>,
    pub config: ScriptorConfig,
}

impl LoadedConfig {
    /// Defaults rooted at `root`, used when no config file exists.
    pub fn defaults(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            path: None,
            config: ScriptorConfig::default(),
        }
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join(&self.config.scripts_dir)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(&self.config.tmp_dir)
    }

    pub fn env_file_paths(&self) -> Vec<PathBuf> {
        self.config
            .env_files
            .iter()
            .map(|file| self.root.join(file))
            .collect()
    }
}

/// Load and validate a config file. The file must exist.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ScriptorConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    let root = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Ok(LoadedConfig {
        root,
        path: Some(path.to_path_buf()),
        config,
    })
}

/// Find `scriptor.toml` in `start` or its nearest ancestor.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Resolve the active configuration.
///
/// An explicit path must load; otherwise the nearest `scriptor.toml` is used,
/// falling back to defaults rooted at `cwd`.
pub fn discover_config(explicit: Option<&Path>, cwd: &Path) -> Result<LoadedConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match find_config(cwd) {
        Some(path) => load_config(&path),
        None => {
            debug!(cwd = %cwd.display(), "no config file found, using defaults");
            Ok(LoadedConfig::defaults(cwd))
        }
    }
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ScriptorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_without_file_returns_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let loaded = discover_config(None, temp.path()).expect("discover");
        assert_eq!(loaded.path, None);
        assert_eq!(loaded.config, ScriptorConfig::default());
        assert_eq!(loaded.scripts_dir(), temp.path().join("scripts"));
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        let mut cfg = ScriptorConfig::default();
        cfg.default_params
            .insert("region".to_string(), toml::Value::String("eu".to_string()));
        cfg.exclude_patterns = vec!["lib/**".to_string()];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded.config, cfg);
        assert_eq!(loaded.root, temp.path());
    }

    #[test]
    fn find_config_walks_up_to_ancestor() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "scripts_dir = \"jobs\"\n").expect("write");
        let nested = temp.path().join("a/b");
        fs::create_dir_all(&nested).expect("mkdir");

        let loaded = discover_config(None, &nested).expect("discover");
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.scripts_dir(), temp.path().join("jobs"));
        assert_eq!(loaded.config.tmp_dir, PathBuf::from(".tmp"));
    }

    #[test]
    fn malformed_config_is_a_hard_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "scripts_dir = [\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn explicit_missing_config_is_a_hard_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = discover_config(Some(&temp.path().join("nope.toml")), temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn invalid_exclude_pattern_is_rejected() {
        let cfg = ScriptorConfig {
            exclude_patterns: vec!["[".to_string()],
            ..ScriptorConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }
}
