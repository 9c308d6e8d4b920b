//! Loading `.rhai` scripts into [`RhaiScript`] modules.
//!
//! Every load re-reads and recompiles the file, so an edited script is picked
//! up by the next run in the same process.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rhai::{AST, CallFnOptions, Dynamic, Map, Scope};
use tracing::{debug, instrument};

use super::context::{ContextHandle, ScriptContext};
use super::host::build_engine;
use super::{Export, ScriptModule};
use crate::core::variables::{VariableDecl, VariableType};
use crate::error::{EngineError, ScriptFailure};

const DESCRIPTION_CONST: &str = "DESCRIPTION";
const VARIABLES_CONST: &str = "VARIABLES";
const MAX_PHASE_PARAMS: usize = 2;

/// A compiled script and the shape it exports.
#[derive(Debug, Clone)]
pub struct RhaiScript {
    name: String,
    path: PathBuf,
    ast: AST,
    description: Option<String>,
    variables: Vec<VariableDecl>,
    /// Exported phases and how many parameters each takes.
    exports: BTreeMap<Export, usize>,
}

impl RhaiScript {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exports(&self) -> impl Iterator<Item = Export> + '_ {
        self.exports.keys().copied()
    }
}

/// Load, compile and validate the script at `path`.
///
/// Top-level statements run once here, without a context, so constants such
/// as `DESCRIPTION` and `VARIABLES` can be read.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_script(path: &Path) -> Result<RhaiScript, EngineError> {
    if !path.is_file() {
        return Err(EngineError::ScriptNotFound {
            path: path.to_path_buf(),
        });
    }
    let name = path
        .file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());

    let source = fs::read_to_string(path)
        .map_err(|err| EngineError::invalid_script(&name, format!("read failed: {err}")))?;
    let engine = build_engine(None);
    let mut ast = engine
        .compile(&source)
        .map_err(|err| EngineError::invalid_script(&name, format!("parse error: {err}")))?;
    ast.set_source(path.display().to_string());

    let mut scope = Scope::new();
    engine.run_ast_with_scope(&mut scope, &ast).map_err(|err| {
        EngineError::invalid_script(
            &name,
            format!("top-level code failed: {}", ScriptFailure::from_eval(&err)),
        )
    })?;

    let description = match scope.get(DESCRIPTION_CONST) {
        None => None,
        Some(value) => Some(value.clone().into_string().map_err(|_| {
            EngineError::invalid_script(&name, format!("{DESCRIPTION_CONST} must be a string"))
        })?),
    };
    let variables = match scope.get(VARIABLES_CONST) {
        None => Vec::new(),
        Some(value) => parse_variables(value)
            .map_err(|reason| EngineError::invalid_script(&name, reason))?,
    };
    let exports =
        collect_exports(&ast).map_err(|reason| EngineError::invalid_script(&name, reason))?;
    if !exports.contains_key(&Export::Execute) && !exports.contains_key(&Export::Main) {
        return Err(EngineError::invalid_script(
            &name,
            "must define `fn execute` or `fn main`",
        ));
    }

    debug!(script = %name, exports = ?exports.keys().collect::<Vec<_>>(), "script loaded");
    Ok(RhaiScript {
        name,
        path: path.to_path_buf(),
        ast,
        description,
        variables,
        exports,
    })
}

fn collect_exports(ast: &AST) -> Result<BTreeMap<Export, usize>, String> {
    let mut exports = BTreeMap::new();
    for func in ast.iter_functions() {
        let Some(export) = Export::from_fn_name(func.name) else {
            continue;
        };
        let arity = func.params.len();
        if arity > MAX_PHASE_PARAMS {
            return Err(format!(
                "`{export}` takes at most {MAX_PHASE_PARAMS} parameters (ctx, previous result)"
            ));
        }
        let entry = exports.entry(export).or_insert(arity);
        *entry = (*entry).max(arity);
    }
    Ok(exports)
}

fn parse_variables(value: &Dynamic) -> Result<Vec<VariableDecl>, String> {
    let items = value
        .read_lock::<rhai::Array>()
        .map(|array| array.to_vec())
        .ok_or_else(|| format!("{VARIABLES_CONST} must be an array"))?;
    items.iter().enumerate().map(|(i, item)| parse_decl(i, item)).collect()
}

fn parse_decl(index: usize, item: &Dynamic) -> Result<VariableDecl, String> {
    if let Ok(name) = item.clone().into_string() {
        return non_empty(index, name).map(VariableDecl::Name);
    }
    let Some(map) = item.read_lock::<Map>().map(|map| (*map).clone()) else {
        return Err(format!(
            "{VARIABLES_CONST}[{index}] must be a string or a map, found {}",
            item.type_name()
        ));
    };
    let name = string_field(&map, "name", index)?
        .ok_or_else(|| format!("{VARIABLES_CONST}[{index}] is missing `name`"))?;
    let message = string_field(&map, "message", index)?;
    let kind = match string_field(&map, "type", index)? {
        None => None,
        Some(raw) => Some(VariableType::parse(&raw).ok_or_else(|| {
            format!("{VARIABLES_CONST}[{index}] has unknown type `{raw}`")
        })?),
    };
    Ok(VariableDecl::Full {
        name: non_empty(index, name)?,
        message,
        kind,
    })
}

fn string_field(map: &Map, key: &str, index: usize) -> Result<Option<String>, String> {
    match map.get(key) {
        None => Ok(None),
        Some(value) if value.is_unit() => Ok(None),
        Some(value) => value
            .clone()
            .into_string()
            .map(Some)
            .map_err(|_| format!("{VARIABLES_CONST}[{index}].{key} must be a string")),
    }
}

fn non_empty(index: usize, name: String) -> Result<String, String> {
    if name.trim().is_empty() {
        Err(format!("{VARIABLES_CONST}[{index}] has an empty name"))
    } else {
        Ok(name)
    }
}

impl ScriptModule for RhaiScript {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn variables(&self) -> &[VariableDecl] {
        &self.variables
    }

    fn has_export(&self, export: Export) -> bool {
        self.exports.contains_key(&export)
    }

    fn invoke(
        &self,
        export: Export,
        ctx: &Arc<ScriptContext>,
        prior: Dynamic,
    ) -> Result<Dynamic, ScriptFailure> {
        let Some(&arity) = self.exports.get(&export) else {
            return Err(ScriptFailure::new(
                "Error",
                format!("`{export}` is not defined"),
            ));
        };
        let engine = build_engine(Some(ctx));
        let mut scope = Scope::new();
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let name = export.fn_name();
        let handle = ContextHandle::new(ctx);
        let result = match arity {
            0 => engine.call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, name, ()),
            1 => {
                engine.call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, name, (handle,))
            }
            _ => engine.call_fn_with_options::<Dynamic>(
                options,
                &mut scope,
                &self.ast,
                name,
                (handle, prior),
            ),
        };
        result.map_err(|err| ScriptFailure::from_eval(&err).within(name))
    }
}
