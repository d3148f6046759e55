//! Variable storage traversal
//!
//! The REPL keeps a JSON tree for loose data. Commands address into it with
//! a path of keys; keys are cast to integers only when indexing arrays, map
//! elements are always addressed with string keys. Misses are
//! `TraversalError`s, reported to the user rather than propagated.

use serde_json::Value;

/// Storage path miss or bad index.
#[derive(Debug, thiserror::Error)]
pub enum TraversalError {
    #[error("failed to find key {0:?}")]
    NotFound(String),

    #[error("cannot index an array with {0:?}")]
    BadIndex(String),

    #[error("cannot inspect properties of a {0} value")]
    NotIndexable(&'static str),
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Walk `keys` down from `root`.
pub fn traverse<'a>(root: &'a Value, keys: &[String]) -> Result<&'a Value, TraversalError> {
    let mut current = root;
    for key in keys {
        current = match current {
            Value::Object(map) => map
                .get(key)
                .ok_or_else(|| TraversalError::NotFound(key.clone()))?,
            Value::Array(items) => {
                let index: usize = key
                    .parse()
                    .map_err(|_| TraversalError::BadIndex(key.clone()))?;
                items
                    .get(index)
                    .ok_or_else(|| TraversalError::NotFound(key.clone()))?
            }
            other => return Err(TraversalError::NotIndexable(kind(other))),
        };
    }
    Ok(current)
}

/// Mutable walk; same addressing rules as `traverse`.
pub fn traverse_mut<'a>(
    root: &'a mut Value,
    keys: &[String],
) -> Result<&'a mut Value, TraversalError> {
    let mut current = root;
    for key in keys {
        current = match current {
            Value::Object(map) => map
                .get_mut(key)
                .ok_or_else(|| TraversalError::NotFound(key.clone()))?,
            Value::Array(items) => {
                let index: usize = key
                    .parse()
                    .map_err(|_| TraversalError::BadIndex(key.clone()))?;
                items
                    .get_mut(index)
                    .ok_or_else(|| TraversalError::NotFound(key.clone()))?
            }
            other => return Err(TraversalError::NotIndexable(kind(other))),
        };
    }
    Ok(current)
}

/// Set the value at `keys`, creating or replacing the final entry. An array
/// accepts indexes up to and including its length (append).
pub fn set_path(root: &mut Value, keys: &[String], value: Value) -> Result<(), TraversalError> {
    let Some((last, parents)) = keys.split_last() else {
        *root = value;
        return Ok(());
    };
    let parent = traverse_mut(root, parents)?;
    match parent {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index: usize = last
                .parse()
                .map_err(|_| TraversalError::BadIndex(last.clone()))?;
            if index < items.len() {
                items[index] = value;
                Ok(())
            } else if index == items.len() {
                items.push(value);
                Ok(())
            } else {
                Err(TraversalError::NotFound(last.clone()))
            }
        }
        other => Err(TraversalError::NotIndexable(kind(other))),
    }
}

/// Delete the entry at `keys`.
pub fn del_path(root: &mut Value, keys: &[String]) -> Result<(), TraversalError> {
    let Some((last, parents)) = keys.split_last() else {
        *root = Value::Object(Default::default());
        return Ok(());
    };
    let parent = traverse_mut(root, parents)?;
    match parent {
        Value::Object(map) => {
            map.remove(last)
                .ok_or_else(|| TraversalError::NotFound(last.clone()))?;
            Ok(())
        }
        Value::Array(items) => {
            let index: usize = last
                .parse()
                .map_err(|_| TraversalError::BadIndex(last.clone()))?;
            if index < items.len() {
                items.remove(index);
                Ok(())
            } else {
                Err(TraversalError::NotFound(last.clone()))
            }
        }
        other => Err(TraversalError::NotIndexable(kind(other))),
    }
}
