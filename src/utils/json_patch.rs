//! JSON Patch (RFC 6902) application over a generic `serde_json::Value`
//! tree, with RFC 6901 pointer resolution. The input document is never
//! mutated; callers get a new document only when every operation succeeds,
//! so a failing operation can never leave a partially patched result.

use serde_json::Value;

use crate::types::{NrfError, PatchItem, PatchOp};

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("invalid JSON pointer `{0}`")]
    InvalidPointer(String),

    #[error("path `{0}` does not exist")]
    PathNotFound(String),

    #[error("invalid array index `{0}`")]
    InvalidIndex(String),

    #[error("test failed at `{0}`")]
    TestFailed(String),

    #[error("`{0}` operation requires a value")]
    MissingValue(&'static str),

    #[error("`{0}` operation requires a `from` pointer")]
    MissingFrom(&'static str),

    #[error("cannot move `{from}` into its own child `{path}`")]
    RecursiveMove { from: String, path: String },
}

impl From<PatchError> for NrfError {
    fn from(err: PatchError) -> Self {
        NrfError::BadPatch(err.to_string())
    }
}

/// Applies `ops` in order against a copy of `doc`. Any failure aborts the
/// whole patch.
pub fn apply_patch(doc: &Value, ops: &[PatchItem]) -> Result<Value, PatchError> {
    let mut out = doc.clone();
    for op in ops {
        apply_one(&mut out, op)?;
    }
    Ok(out)
}

fn apply_one(doc: &mut Value, item: &PatchItem) -> Result<(), PatchError> {
    match item.op {
        PatchOp::Add => {
            let value = require_value(item, "add")?;
            add(doc, &item.path, value)
        }
        PatchOp::Remove => remove(doc, &item.path).map(|_| ()),
        PatchOp::Replace => {
            let value = require_value(item, "replace")?;
            replace(doc, &item.path, value)
        }
        PatchOp::Move => {
            let from = require_from(item, "move")?;
            if item.path.starts_with(&format!("{from}/")) {
                return Err(PatchError::RecursiveMove {
                    from: from.to_string(),
                    path: item.path.clone(),
                });
            }
            if from == item.path {
                return Ok(());
            }
            let value = remove(doc, from)?;
            add(doc, &item.path, value)
        }
        PatchOp::Copy => {
            let from = require_from(item, "copy")?;
            let value = resolve(doc, from)?.clone();
            add(doc, &item.path, value)
        }
        PatchOp::Test => {
            let expected = require_value(item, "test")?;
            let actual = resolve(doc, &item.path)?;
            if *actual == expected {
                Ok(())
            } else {
                Err(PatchError::TestFailed(item.path.clone()))
            }
        }
    }
}

fn require_value(item: &PatchItem, op: &'static str) -> Result<Value, PatchError> {
    item.value.clone().ok_or(PatchError::MissingValue(op))
}

fn require_from<'a>(item: &'a PatchItem, op: &'static str) -> Result<&'a str, PatchError> {
    item.from.as_deref().ok_or(PatchError::MissingFrom(op))
}

fn tokens(pointer: &str) -> Result<Vec<String>, PatchError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let rest = pointer
        .strip_prefix('/')
        .ok_or_else(|| PatchError::InvalidPointer(pointer.to_string()))?;
    Ok(rest
        .split('/')
        .map(|tok| tok.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn parse_index(token: &str, len: usize) -> Result<usize, PatchError> {
    if token.len() > 1 && token.starts_with('0') {
        return Err(PatchError::InvalidIndex(token.to_string()));
    }
    let idx: usize = token
        .parse()
        .map_err(|_| PatchError::InvalidIndex(token.to_string()))?;
    if idx >= len {
        return Err(PatchError::InvalidIndex(token.to_string()));
    }
    Ok(idx)
}

fn resolve<'a>(doc: &'a Value, pointer: &str) -> Result<&'a Value, PatchError> {
    let mut current = doc;
    for token in tokens(pointer)? {
        current = match current {
            Value::Object(map) => map
                .get(&token)
                .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?,
            Value::Array(arr) => &arr[parse_index(&token, arr.len())?],
            _ => return Err(PatchError::PathNotFound(pointer.to_string())),
        };
    }
    Ok(current)
}

/// Walks to the parent of `pointer`, returning it together with the final
/// (unescaped) token.
fn navigate_parent<'a>(
    doc: &'a mut Value,
    pointer: &str,
) -> Result<(&'a mut Value, String), PatchError> {
    let mut toks = tokens(pointer)?;
    let last = toks
        .pop()
        .ok_or_else(|| PatchError::InvalidPointer(pointer.to_string()))?;
    let mut current = doc;
    for token in toks {
        current = match current {
            Value::Object(map) => map
                .get_mut(&token)
                .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?,
            Value::Array(arr) => {
                let len = arr.len();
                &mut arr[parse_index(&token, len)?]
            }
            _ => return Err(PatchError::PathNotFound(pointer.to_string())),
        };
    }
    Ok((current, last))
}

fn add(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    if path.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, last) = navigate_parent(doc, path)?;
    match parent {
        Value::Object(map) => {
            map.insert(last, value);
            Ok(())
        }
        Value::Array(arr) => {
            if last == "-" {
                arr.push(value);
            } else {
                // For add the index may equal the array length (append).
                let idx = parse_index(&last, arr.len() + 1)?;
                arr.insert(idx, value);
            }
            Ok(())
        }
        _ => Err(PatchError::PathNotFound(path.to_string())),
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value, PatchError> {
    if path.is_empty() {
        return Err(PatchError::InvalidPointer(path.to_string()));
    }
    let (parent, last) = navigate_parent(doc, path)?;
    match parent {
        Value::Object(map) => map
            .remove(&last)
            .ok_or_else(|| PatchError::PathNotFound(path.to_string())),
        Value::Array(arr) => {
            let idx = parse_index(&last, arr.len())?;
            Ok(arr.remove(idx))
        }
        _ => Err(PatchError::PathNotFound(path.to_string())),
    }
}

fn replace(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    if path.is_empty() {
        *doc = value;
        return Ok(());
    }
    // Replace requires the path to exist already.
    resolve(doc, path)?;
    let (parent, last) = navigate_parent(doc, path)?;
    match parent {
        Value::Object(map) => {
            map.insert(last, value);
            Ok(())
        }
        Value::Array(arr) => {
            let idx = parse_index(&last, arr.len())?;
            arr[idx] = value;
            Ok(())
        }
        _ => Err(PatchError::PathNotFound(path.to_string())),
    }
}
