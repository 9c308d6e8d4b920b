//! Variable requirements declared by scripts or requested on the command line.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[default]
    Input,
    /// Collected with masked input.
    Password,
}

impl VariableType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "input" => Some(Self::Input),
            "password" => Some(Self::Password),
            _ => None,
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Password => f.write_str("password"),
        }
    }
}

/// A normalized variable requirement. Identity is `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    pub name: String,
    pub message: String,
    pub kind: VariableType,
}

impl VariableDefinition {
    /// Shorthand form: `type = input` with the default message.
    pub fn input(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            message: default_message(&name),
            name,
            kind: VariableType::Input,
        }
    }
}

/// A declaration as written in a script's `VARIABLES` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableDecl {
    Name(String),
    Full {
        name: String,
        message: Option<String>,
        kind: Option<VariableType>,
    },
}

impl VariableDecl {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Full { name, .. } => name,
        }
    }

    pub fn normalize(&self) -> VariableDefinition {
        match self {
            Self::Name(name) => VariableDefinition::input(name.clone()),
            Self::Full {
                name,
                message,
                kind,
            } => VariableDefinition {
                name: name.clone(),
                message: message.clone().unwrap_or_else(|| default_message(name)),
                kind: kind.unwrap_or_default(),
            },
        }
    }
}

pub fn default_message(name: &str) -> String {
    format!("Enter value for {name}:")
}

/// Merge script declarations with CLI-requested names.
///
/// Script entries come first in declaration order, then CLI-only names. A CLI
/// name that the script also declares keeps the script's message and type.
/// Duplicates are dropped by name, first occurrence wins.
pub fn resolve(script_vars: &[VariableDecl], cli_names: &[String]) -> Vec<VariableDefinition> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for decl in script_vars {
        if seen.insert(decl.name().to_string()) {
            resolved.push(decl.normalize());
        }
    }
    for name in cli_names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.to_string()) {
            resolved.push(VariableDefinition::input(name));
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(defs: &[VariableDefinition]) -> Vec<&str> {
        defs.iter().map(|def| def.name.as_str()).collect()
    }

    #[test]
    fn shorthand_normalizes_to_input_with_default_message() {
        let defs = resolve(&[VariableDecl::Name("API_KEY".to_string())], &[]);
        assert_eq!(
            defs,
            vec![VariableDefinition {
                name: "API_KEY".to_string(),
                message: "Enter value for API_KEY:".to_string(),
                kind: VariableType::Input,
            }]
        );
    }

    #[test]
    fn full_entries_fill_missing_fields() {
        let decl = VariableDecl::Full {
            name: "TOKEN".to_string(),
            message: None,
            kind: Some(VariableType::Password),
        };
        let def = decl.normalize();
        assert_eq!(def.message, "Enter value for TOKEN:");
        assert_eq!(def.kind, VariableType::Password);
    }

    #[test]
    fn cli_names_append_after_script_entries() {
        let defs = resolve(
            &[
                VariableDecl::Name("B".to_string()),
                VariableDecl::Name("A".to_string()),
            ],
            &["C".to_string(), "A".to_string(), " ".to_string()],
        );
        assert_eq!(names(&defs), vec!["B", "A", "C"]);
    }

    #[test]
    fn script_password_type_wins_over_cli_name() {
        let defs = resolve(
            &[VariableDecl::Full {
                name: "DB_PASSWORD".to_string(),
                message: Some("Database password:".to_string()),
                kind: Some(VariableType::Password),
            }],
            &["DB_PASSWORD".to_string()],
        );
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].kind, VariableType::Password);
        assert_eq!(defs[0].message, "Database password:");
    }

    #[test]
    fn duplicate_script_entries_keep_first() {
        let defs = resolve(
            &[
                VariableDecl::Full {
                    name: "X".to_string(),
                    message: Some("first".to_string()),
                    kind: None,
                },
                VariableDecl::Name("X".to_string()),
            ],
            &[],
        );
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].message, "first");
    }
}
