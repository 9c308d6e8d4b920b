//! Finding scripts under the configured scripts directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use tracing::{debug, warn};

use super::config::LoadedConfig;

pub const SCRIPT_EXTENSION: &str = "rhai";

/// A script found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    /// Path relative to the scripts directory, without extension, `/`-separated.
    pub name: String,
    pub path: PathBuf,
}

/// List every script under the scripts directory, sorted by name.
///
/// Paths matching one of `exclude_patterns` (relative to the scripts
/// directory) are skipped. A missing scripts directory yields an empty list.
pub fn discover_scripts(config: &LoadedConfig) -> Result<Vec<ScriptEntry>> {
    let dir = config.scripts_dir();
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "scripts directory does not exist");
        return Ok(Vec::new());
    }

    let excludes = config
        .config
        .exclude_patterns
        .iter()
        .map(|raw| Pattern::new(raw).with_context(|| format!("invalid exclude pattern `{raw}`")))
        .collect::<Result<Vec<_>>>()?;

    let pattern = format!(
        "{}/**/*.{SCRIPT_EXTENSION}",
        Pattern::escape(&dir.to_string_lossy())
    );
    let mut entries = Vec::new();
    for item in glob::glob(&pattern).context("build script glob")? {
        let path = match item {
            Ok(path) => path,
            Err(err) => {
                warn!(err = %err, "skipping unreadable path");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let Some(name) = script_name(&dir, &path) else {
            continue;
        };
        let relative = relative_display(&dir, &path);
        if excludes.iter().any(|p| p.matches(&relative)) {
            debug!(script = %relative, "excluded");
            continue;
        }
        entries.push(ScriptEntry { name, path });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Resolve a script argument to a path.
///
/// An existing path is used as given. Otherwise the argument is looked up
/// under the scripts directory, with `.rhai` appended when it has no
/// extension. The returned path may not exist; loading reports that.
pub fn resolve_script_path(config: &LoadedConfig, arg: &str) -> PathBuf {
    let as_given = PathBuf::from(arg);
    if as_given.is_file() {
        return as_given;
    }
    let mut candidate = config.scripts_dir().join(arg);
    if candidate.extension().is_none() {
        candidate.set_extension(SCRIPT_EXTENSION);
    }
    candidate
}

fn relative_display(dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn script_name(dir: &Path, path: &Path) -> Option<String> {
    let relative = relative_display(dir, path);
    let name = relative.strip_suffix(&format!(".{SCRIPT_EXTENSION}"))?;
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project() -> (tempfile::TempDir, LoadedConfig) {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = LoadedConfig::defaults(temp.path());
        fs::create_dir_all(config.scripts_dir().join("db")).expect("mkdir");
        (temp, config)
    }

    fn touch(path: &Path) {
        fs::write(path, "fn main() {}\n").expect("write script");
    }

    #[test]
    fn lists_nested_scripts_sorted() {
        let (_temp, config) = project();
        let dir = config.scripts_dir();
        touch(&dir.join("zeta.rhai"));
        touch(&dir.join("alpha.rhai"));
        touch(&dir.join("db/seed.rhai"));
        fs::write(dir.join("notes.txt"), "not a script").expect("write");

        let names: Vec<_> = discover_scripts(&config)
            .expect("discover")
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["alpha", "db/seed", "zeta"]);
    }

    #[test]
    fn exclude_patterns_apply_to_relative_paths() {
        let (_temp, mut config) = project();
        let dir = config.scripts_dir();
        touch(&dir.join("keep.rhai"));
        touch(&dir.join("db/seed.rhai"));
        config.config.exclude_patterns = vec!["db/**".to_string()];

        let entries = discover_scripts(&config).expect("discover");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "keep");
    }

    #[test]
    fn missing_scripts_dir_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = LoadedConfig::defaults(temp.path().join("nowhere"));
        assert!(discover_scripts(&config).expect("discover").is_empty());
    }

    #[test]
    fn resolves_bare_names_under_scripts_dir() {
        let (_temp, config) = project();
        assert_eq!(
            resolve_script_path(&config, "db/seed"),
            config.scripts_dir().join("db/seed.rhai")
        );
        assert_eq!(
            resolve_script_path(&config, "hello.rhai"),
            config.scripts_dir().join("hello.rhai")
        );
    }

    #[test]
    fn existing_paths_are_used_as_given() {
        let (temp, config) = project();
        let outside = temp.path().join("outside.rhai");
        touch(&outside);
        let arg = outside.to_string_lossy().to_string();
        assert_eq!(resolve_script_path(&config, &arg), outside);
    }
}
