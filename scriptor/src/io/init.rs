//! `scriptor init` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{CONFIG_FILE_NAME, ScriptorConfig, write_config};

/// Files created by `init_project`.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub scripts_dir: PathBuf,
    pub example_script_path: PathBuf,
    pub gitignore_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>, config: &ScriptorConfig) -> Self {
        let root = root.into();
        let scripts_dir = root.join(&config.scripts_dir);
        Self {
            config_path: root.join(CONFIG_FILE_NAME),
            example_script_path: scripts_dir.join("hello.rhai"),
            gitignore_path: root.join(".gitignore"),
            scripts_dir,
            root,
        }
    }
}

/// Options for `init_project`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing config and example script.
    pub force: bool,
}

/// Create `scriptor.toml` and an example script in `root`.
///
/// Fails if `scriptor.toml` already exists unless `options.force` is set.
/// An existing `.gitignore` is appended to, never replaced.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<ProjectPaths> {
    let config = ScriptorConfig::default();
    let paths = ProjectPaths::new(root, &config);
    if paths.config_path.exists() && !options.force {
        return Err(anyhow!(
            "scriptor init: {CONFIG_FILE_NAME} already exists (use --force to overwrite)"
        ));
    }

    write_config(&paths.config_path, &config)?;
    fs::create_dir_all(&paths.scripts_dir)
        .with_context(|| format!("create directory {}", paths.scripts_dir.display()))?;
    if options.force || !paths.example_script_path.exists() {
        fs::write(&paths.example_script_path, EXAMPLE_SCRIPT).with_context(|| {
            format!("write file {}", paths.example_script_path.display())
        })?;
    }
    ignore_tmp_dir(&paths.gitignore_path, &config)?;

    Ok(paths)
}

fn ignore_tmp_dir(gitignore: &Path, config: &ScriptorConfig) -> Result<()> {
    let entry = format!("{}/", config.tmp_dir.display());
    let existing = match fs::read_to_string(gitignore) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(err).with_context(|| format!("read {}", gitignore.display()));
        }
    };
    if existing.lines().any(|line| line.trim() == entry) {
        return Ok(());
    }
    let mut contents = existing;
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(&entry);
    contents.push('\n');
    fs::write(gitignore, contents).with_context(|| format!("write file {}", gitignore.display()))
}

const EXAMPLE_SCRIPT: &str = r#"// Run with: scriptor run hello
const DESCRIPTION = "Greets someone using the assembled environment";

const VARIABLES = [
    #{ name: "GREETING_NAME", message: "Who should be greeted?" },
];

fn tear_up(ctx) {
    ctx.console.info("working directory: " + ctx.tmp_dir);
}

fn main(ctx, prepared) {
    let name = ctx.env["GREETING_NAME"];
    ctx.console.log("Hello, " + name + "!");
    #{ greeted: name }
}

fn tear_down(ctx, result) {
    ctx.log.info("finished");
}
"#;
