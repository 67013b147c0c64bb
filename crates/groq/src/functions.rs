// GROQ built-in functions.

use serde_json::Value;

use crate::eval::EvalError;

/// Evaluate a built-in GROQ function by name.
///
/// `this` is the document in scope, used by the one-argument form of `references()`.
pub fn call_builtin(name: &str, args: &[Value], this: &Value) -> Result<Value, EvalError> {
    match name {
        "count" => builtin_count(args),
        "defined" => builtin_defined(args),
        "length" => builtin_length(args),
        "references" => builtin_references(args, this),
        "coalesce" => Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)),
        "lower" => match args.first() {
            Some(Value::String(s)) => Ok(Value::String(s.to_lowercase())),
            _ => Ok(Value::Null),
        },
        _ => Err(EvalError::TypeError(format!("unknown function: {name}"))),
    }
}

fn builtin_count(args: &[Value]) -> Result<Value, EvalError> {
    match args.first() {
        Some(Value::Array(arr)) => Ok(Value::from(arr.len())),
        Some(Value::Null) => Ok(Value::from(0)),
        _ => Err(EvalError::TypeError("count() expects an array".into())),
    }
}

fn builtin_defined(args: &[Value]) -> Result<Value, EvalError> {
    match args.first() {
        Some(Value::Null) | None => Ok(Value::Bool(false)),
        _ => Ok(Value::Bool(true)),
    }
}

fn builtin_length(args: &[Value]) -> Result<Value, EvalError> {
    match args.first() {
        Some(Value::String(s)) => Ok(Value::from(s.chars().count())),
        Some(Value::Array(a)) => Ok(Value::from(a.len())),
        _ => Ok(Value::Null),
    }
}

fn builtin_references(args: &[Value], this: &Value) -> Result<Value, EvalError> {
    let (doc, target) = match args {
        [id] => (this, id),
        [doc, id] => (doc, id),
        _ => return Err(EvalError::TypeError("references() needs 1 or 2 args".into())),
    };
    let ids: Vec<&str> = match target {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => return Ok(Value::Bool(false)),
    };
    Ok(Value::Bool(ids.iter().any(|id| value_references(doc, id))))
}

fn value_references(val: &Value, ref_id: &str) -> bool {
    match val {
        Value::Object(map) => {
            if map.get("_ref").and_then(Value::as_str) == Some(ref_id) {
                return true;
            }
            map.values().any(|v| value_references(v, ref_id))
        }
        Value::Array(arr) => arr.iter().any(|v| value_references(v, ref_id)),
        _ => false,
    }
}
