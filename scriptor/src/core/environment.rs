//! Environment layer precedence and interpolation.
//!
//! Layers, lowest to highest: env files, config defaults, CLI overrides,
//! prompted values. A higher layer always shadows a lower one.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::{Captures, Regex};

use super::variables::VariableDefinition;

pub type EnvMap = BTreeMap<String, String>;

static VAR_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("variable reference pattern should be valid")
});

/// Merge the four layers into one snapshot.
///
/// Config defaults are rendered to strings and interpolated against the
/// layers applied before them (the file layer).
pub fn assemble(
    file_vars: &EnvMap,
    config_defaults: &toml::Table,
    cli_vars: &EnvMap,
    prompted_vars: &EnvMap,
) -> EnvMap {
    let mut env = file_vars.clone();
    let mut rendered = EnvMap::new();
    for (name, value) in config_defaults {
        rendered.insert(name.clone(), interpolate(&render_default(value), &env));
    }
    env.extend(rendered);
    env.extend(cli_vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    env.extend(prompted_vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

/// Declared variables whose name is absent from, or empty in, `snapshot`.
pub fn missing(declared: &[VariableDefinition], snapshot: &EnvMap) -> Vec<VariableDefinition> {
    declared
        .iter()
        .filter(|def| snapshot.get(&def.name).is_none_or(|value| value.is_empty()))
        .cloned()
        .collect()
}

/// Replace `${NAME}` references with values from `vars`; unknown names become empty.
pub fn interpolate(template: &str, vars: &EnvMap) -> String {
    VAR_REF
        .replace_all(template, |caps: &Captures<'_>| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// String form of a config default: scalars by display, arrays/tables as JSON.
pub fn render_default(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::Array(_) | toml::Value::Table(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

/// Parse a `NAME=value` assignment as given to `--env` / `--param`.
pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=value, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("empty variable name in `{raw}`"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variables::VariableDefinition;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn defaults(raw: &str) -> toml::Table {
        toml::from_str(raw).expect("parse defaults")
    }

    #[test]
    fn higher_layers_shadow_lower_layers() {
        let file = env(&[("A", "file"), ("B", "file"), ("C", "file"), ("D", "file")]);
        let config = defaults("B = \"config\"\nC = \"config\"\nD = \"config\"");
        let cli = env(&[("C", "cli"), ("D", "cli")]);
        let prompted = env(&[("D", "prompted")]);

        let merged = assemble(&file, &config, &cli, &prompted);
        assert_eq!(merged["A"], "file");
        assert_eq!(merged["B"], "config");
        assert_eq!(merged["C"], "cli");
        assert_eq!(merged["D"], "prompted");
    }

    #[test]
    fn cli_overrides_file_value() {
        let merged = assemble(
            &env(&[("A", "1")]),
            &toml::Table::new(),
            &env(&[("A", "2")]),
            &EnvMap::new(),
        );
        assert_eq!(merged["A"], "2");
    }

    #[test]
    fn config_defaults_interpolate_against_file_layer() {
        let merged = assemble(
            &env(&[("HOST", "db.local")]),
            &defaults("DATABASE_URL = \"postgres://${HOST}/app\"\nOTHER = \"${UNSET}x\""),
            &EnvMap::new(),
            &EnvMap::new(),
        );
        assert_eq!(merged["DATABASE_URL"], "postgres://db.local/app");
        assert_eq!(merged["OTHER"], "x");
    }

    #[test]
    fn config_defaults_render_non_strings() {
        let merged = assemble(
            &EnvMap::new(),
            &defaults("RETRIES = 3\nDEBUG = true\nTAGS = [\"a\", \"b\"]"),
            &EnvMap::new(),
            &EnvMap::new(),
        );
        assert_eq!(merged["RETRIES"], "3");
        assert_eq!(merged["DEBUG"], "true");
        assert_eq!(merged["TAGS"], r#"["a","b"]"#);
    }

    #[test]
    fn missing_skips_present_and_keeps_empty() {
        let declared = vec![
            VariableDefinition::input("PRESENT"),
            VariableDefinition::input("EMPTY"),
            VariableDefinition::input("ABSENT"),
        ];
        let snapshot = env(&[("PRESENT", "x"), ("EMPTY", "")]);
        let names: Vec<String> = missing(&declared, &snapshot)
            .into_iter()
            .map(|def| def.name)
            .collect();
        assert_eq!(names, vec!["EMPTY".to_string(), "ABSENT".to_string()]);
    }

    #[test]
    fn prompted_value_cannot_be_overridden() {
        let declared = vec![VariableDefinition::input("API_KEY")];
        let base = assemble(
            &EnvMap::new(),
            &toml::Table::new(),
            &EnvMap::new(),
            &EnvMap::new(),
        );
        assert_eq!(missing(&declared, &base), declared);

        let prompted = env(&[("API_KEY", "xyz")]);
        let merged = assemble(
            &env(&[("API_KEY", "file")]),
            &defaults("API_KEY = \"config\""),
            &env(&[("API_KEY", "cli")]),
            &prompted,
        );
        assert_eq!(merged["API_KEY"], "xyz");
    }

    #[test]
    fn parse_assignment_splits_on_first_equals() {
        assert_eq!(
            parse_assignment("URL=a=b").expect("parse"),
            ("URL".to_string(), "a=b".to_string())
        );
        assert!(parse_assignment("NOVALUE").is_err());
        assert!(parse_assignment("=x").is_err());
    }
}
