//! Safe rendering of arbitrary script values for log output.
//!
//! Nothing here fails or panics: values without a faithful text form degrade
//! to fixed tokens so that user data logged from a script can never break the
//! host logging path.

use rhai::{Array, Blob, Dynamic, FLOAT, FnPtr, INT, Map};
use serde_json::{Number, Value as Json};

use crate::error::ScriptFailure;

pub const FUNCTION_TOKEN: &str = "[Function]";
pub const OBJECT_TOKEN: &str = "[Object]";
pub const UNIT_TOKEN: &str = "()";

/// Nesting beyond this depth is treated as a reference cycle.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Append the stack of error values.
    pub verbose: bool,
}

/// Render `value` with default options.
pub fn serialize(value: &Dynamic) -> String {
    serialize_with(value, SerializeOptions::default())
}

pub fn serialize_with(value: &Dynamic, options: SerializeOptions) -> String {
    let value = value.flatten_clone();
    if value.is_unit() {
        return UNIT_TOKEN.to_string();
    }
    if let Ok(text) = value.clone().into_string() {
        return text;
    }
    if value.is::<INT>() || value.is::<FLOAT>() || value.is::<bool>() || value.is::<char>() {
        return value.to_string();
    }
    if value.is::<FnPtr>() {
        return FUNCTION_TOKEN.to_string();
    }
    if let Some(failure) = value.clone().try_cast::<ScriptFailure>() {
        return serialize_failure(&failure, options);
    }
    if let Some((name, message)) = error_fields(&value) {
        let mut failure = ScriptFailure::new(name, message);
        failure.stack = value
            .read_lock::<Map>()
            .and_then(|map| map.get("stack").and_then(|s| s.clone().into_string().ok()));
        return serialize_failure(&failure, options);
    }
    match to_json(&value, 0).and_then(|json| serde_json::to_string(&json).ok()) {
        Some(text) => text,
        None => OBJECT_TOKEN.to_string(),
    }
}

/// Render a script failure as `<name>: <message>`, with its stack when verbose.
pub fn serialize_failure(failure: &ScriptFailure, options: SerializeOptions) -> String {
    match (&failure.stack, options.verbose) {
        (Some(stack), true) => format!("{failure}\n{stack}"),
        _ => failure.to_string(),
    }
}

/// Extract `(name, message)` from an error-shaped map.
///
/// A map is error-shaped when it carries string `name` and `message` fields,
/// the name ends in `Error`, and it has no keys other than `name`, `message`
/// and `stack`.
pub fn error_fields(value: &Dynamic) -> Option<(String, String)> {
    let map = value.read_lock::<Map>()?;
    if map
        .keys()
        .any(|key| !matches!(key.as_str(), "name" | "message" | "stack"))
    {
        return None;
    }
    let name = map.get("name")?.clone().into_string().ok()?;
    let message = map.get("message")?.clone().into_string().ok()?;
    name.ends_with("Error").then_some((name, message))
}

/// Convert to JSON following the rules of `JSON.stringify`: function values are
/// dropped from maps and become `null` inside arrays. Returns `None` for host
/// types with no JSON form and for nesting past [`MAX_DEPTH`].
fn to_json(value: &Dynamic, depth: usize) -> Option<Json> {
    if depth > MAX_DEPTH {
        return None;
    }
    let value = value.flatten_clone();
    if value.is_unit() {
        return Some(Json::Null);
    }
    if let Ok(b) = value.as_bool() {
        return Some(Json::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Some(Json::from(i));
    }
    if let Ok(f) = value.as_float() {
        return Some(Number::from_f64(f).map_or(Json::Null, Json::Number));
    }
    if let Ok(c) = value.as_char() {
        return Some(Json::String(c.to_string()));
    }
    if let Ok(text) = value.clone().into_string() {
        return Some(Json::String(text));
    }
    if value.is::<FnPtr>() {
        return Some(Json::Null);
    }
    if let Some(blob) = value.clone().try_cast::<Blob>() {
        return Some(Json::Array(blob.into_iter().map(Json::from).collect()));
    }
    if let Some(array) = value.clone().try_cast::<Array>() {
        let items = array
            .iter()
            .map(|item| to_json(item, depth + 1))
            .collect::<Option<Vec<_>>>()?;
        return Some(Json::Array(items));
    }
    if let Some(map) = value.try_cast::<Map>() {
        let mut object = serde_json::Map::new();
        for (key, item) in &map {
            if item.is::<FnPtr>() {
                continue;
            }
            object.insert(key.to_string(), to_json(item, depth + 1)?);
        }
        return Some(Json::Object(object));
    }
    None
}
