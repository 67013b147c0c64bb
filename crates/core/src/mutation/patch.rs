//! Patch executor.

use serde_json::{Map, Value};

use super::path::{Path, PathError, Segment};
use super::types::{InsertPosition, PatchOperations};

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("invalid path '{path}': {source}")]
    Path {
        path: String,
        #[source]
        source: PathError,
    },
    #[error("cannot patch system field '{0}'")]
    SystemField(String),
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("'{0}' does not address an array element")]
    NotAnArray(String),
    #[error("insert target '{0}' not found")]
    InsertTargetMissing(String),
}

const SYSTEM_FIELDS: [&str; 5] = ["_id", "_type", "_rev", "_createdAt", "_updatedAt"];

/// Apply `ops` to `doc` in place.
pub fn apply_patch(doc: &mut Value, ops: &PatchOperations) -> Result<(), PatchError> {
    for (raw, value) in &ops.set {
        set_at(doc, parse(raw)?.segments(), value);
    }
    for (raw, value) in &ops.set_if_missing {
        let path = parse(raw)?;
        if get_at(doc, path.segments()).map_or(true, Value::is_null) {
            set_at(doc, path.segments(), value);
        }
    }
    for raw in &ops.unset {
        unset_at(doc, parse(raw)?.segments());
    }
    for (raw, delta) in &ops.inc {
        add_at(doc, raw, delta, 1.0)?;
    }
    for (raw, delta) in &ops.dec {
        add_at(doc, raw, delta, -1.0)?;
    }
    if let Some(insert) = &ops.insert {
        let (raw, mode) = match &insert.position {
            InsertPosition::Before(p) => (p, Mode::Before),
            InsertPosition::After(p) => (p, Mode::After),
            InsertPosition::Replace(p) => (p, Mode::Replace),
        };
        insert_at(doc, raw, mode, &insert.items)?;
    }
    Ok(())
}

fn parse(raw: &str) -> Result<Path, PatchError> {
    let path = Path::parse(raw).map_err(|source| PatchError::Path {
        path: raw.to_string(),
        source,
    })?;
    if let Some(Segment::Field(root)) = path.segments().first() {
        if SYSTEM_FIELDS.contains(&root.as_str()) {
            return Err(PatchError::SystemField(root.clone()));
        }
    }
    Ok(path)
}

fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let idx = if index < 0 {
        len.checked_sub(index.unsigned_abs() as usize)?
    } else {
        index as usize
    };
    (idx < len).then_some(idx)
}

fn item_matches(item: &Value, attr: &str, value: &str) -> bool {
    item.get(attr).and_then(Value::as_str) == Some(value)
}

fn get_at<'v>(target: &'v Value, segments: &[Segment]) -> Option<&'v Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(target);
    };
    let child = match head {
        Segment::Field(name) => target.get(name)?,
        Segment::Index(i) => {
            let items = target.as_array()?;
            &items[resolve_index(items.len(), *i)?]
        }
        Segment::Matching { attr, value } => target
            .as_array()?
            .iter()
            .find(|item| item_matches(item, attr, value))?,
    };
    get_at(child, rest)
}

fn get_at_mut<'v>(target: &'v mut Value, segments: &[Segment]) -> Option<&'v mut Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(target);
    };
    let child = match head {
        Segment::Field(name) => target.get_mut(name)?,
        Segment::Index(i) => {
            let items = target.as_array_mut()?;
            let idx = resolve_index(items.len(), *i)?;
            &mut items[idx]
        }
        Segment::Matching { attr, value } => target
            .as_array_mut()?
            .iter_mut()
            .find(|item| item_matches(item, attr, value))?,
    };
    get_at_mut(child, rest)
}

/// Missing intermediate objects are created; missing array elements make
/// the operation a no-op.
fn set_at(target: &mut Value, segments: &[Segment], value: &Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value.clone();
        return;
    };
    match head {
        Segment::Field(name) => {
            if target.is_null() {
                *target = Value::Object(Map::new());
            }
            let Value::Object(map) = target else { return };
            let addresses_array = matches!(
                rest.first(),
                Some(Segment::Index(_) | Segment::Matching { .. })
            );
            if addresses_array && !map.contains_key(name) {
                return;
            }
            let child = map.entry(name.clone()).or_insert(Value::Null);
            set_at(child, rest, value);
        }
        Segment::Index(i) => {
            let Value::Array(items) = target else { return };
            if let Some(idx) = resolve_index(items.len(), *i) {
                set_at(&mut items[idx], rest, value);
            }
        }
        Segment::Matching { attr, value: wanted } => {
            let Value::Array(items) = target else { return };
            for item in items.iter_mut().filter(|item| item_matches(item, attr, wanted)) {
                set_at(item, rest, value);
            }
        }
    }
}

fn unset_at(target: &mut Value, segments: &[Segment]) {
    match segments {
        [] => {}
        [last] => match (last, target) {
            (Segment::Field(name), Value::Object(map)) => {
                map.remove(name);
            }
            (Segment::Index(i), Value::Array(items)) => {
                if let Some(idx) = resolve_index(items.len(), *i) {
                    items.remove(idx);
                }
            }
            (Segment::Matching { attr, value }, Value::Array(items)) => {
                items.retain(|item| !item_matches(item, attr, value));
            }
            _ => {}
        },
        [head, rest @ ..] => match (head, target) {
            (Segment::Field(name), Value::Object(map)) => {
                if let Some(child) = map.get_mut(name) {
                    unset_at(child, rest);
                }
            }
            (Segment::Index(i), Value::Array(items)) => {
                if let Some(idx) = resolve_index(items.len(), *i) {
                    unset_at(&mut items[idx], rest);
                }
            }
            (Segment::Matching { attr, value }, Value::Array(items)) => {
                for item in items.iter_mut().filter(|item| item_matches(item, attr, value)) {
                    unset_at(item, rest);
                }
            }
            _ => {}
        },
    }
}

fn add_at(doc: &mut Value, raw: &str, delta: &Value, sign: f64) -> Result<(), PatchError> {
    let path = parse(raw)?;
    let delta = delta
        .as_f64()
        .ok_or_else(|| PatchError::NotANumber(raw.to_string()))?;
    let Some(current) = get_at_mut(doc, path.segments()) else {
        return Ok(());
    };
    let next = match &*current {
        Value::Number(n) if n.is_i64() && delta.fract() == 0.0 => {
            Value::from(n.as_i64().unwrap_or_default() + (sign * delta) as i64)
        }
        Value::Number(n) => Value::from(n.as_f64().unwrap_or_default() + sign * delta),
        _ => return Err(PatchError::NotANumber(raw.to_string())),
    };
    *current = next;
    Ok(())
}

#[derive(Clone, Copy)]
enum Mode {
    Before,
    After,
    Replace,
}

fn insert_at(doc: &mut Value, raw: &str, mode: Mode, items: &[Value]) -> Result<(), PatchError> {
    let path = parse(raw)?;
    let Some((last, parent)) = path.split_last() else {
        return Err(PatchError::NotAnArray(raw.to_string()));
    };
    let Some(Value::Array(array)) = get_at_mut(doc, parent) else {
        return Err(PatchError::NotAnArray(raw.to_string()));
    };
    let found = match last {
        Segment::Index(i) => resolve_index(array.len(), *i),
        Segment::Matching { attr, value } => {
            array.iter().position(|item| item_matches(item, attr, value))
        }
        Segment::Field(_) => return Err(PatchError::NotAnArray(raw.to_string())),
    };
    let at = match (found, mode, last) {
        (Some(idx), Mode::Before, _) => idx,
        (Some(idx), Mode::After, _) => idx + 1,
        (Some(idx), Mode::Replace, _) => {
            array.remove(idx);
            idx
        }
        // appending to or prepending into an empty array
        (None, Mode::After, Segment::Index(-1)) | (None, Mode::Before, Segment::Index(0))
            if array.is_empty() =>
        {
            0
        }
        (None, ..) => return Err(PatchError::InsertTargetMissing(raw.to_string())),
    };
    for (offset, item) in items.iter().enumerate() {
        array.insert(at + offset, item.clone());
    }
    Ok(())
}
