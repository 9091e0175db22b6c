// # Document Paths
//
// Path navigation over a JSON document tree, shared by the state stores.
//
// A path is a slash-separated list of object keys: `/tiltify/42/lastId`.
// Leading, trailing and repeated slashes are ignored. The root itself is not
// addressable.

use serde_json::{Map, Value};

use crate::Error;

fn segments(path: &str) -> Result<Vec<&str>, Error> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(Error::invalid_input(format!(
            "State path must name at least one key: '{}'",
            path
        )));
    }
    Ok(segments)
}

fn as_object<'a>(value: &'a mut Value, path: &str) -> Result<&'a mut Map<String, Value>, Error> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    value
        .as_object_mut()
        .ok_or_else(|| Error::state_store(format!("{}: parent is not an object", path)))
}

/// Walk to the parent object of the last segment, creating objects on the way
fn parent_mut<'a>(
    document: &'a mut Value,
    path: &str,
) -> Result<(&'a mut Map<String, Value>, String), Error> {
    let segments = segments(path)?;
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| Error::invalid_input(format!("Empty state path: '{}'", path)))?;

    let mut current = document;
    for segment in parents {
        let map = as_object(current, path)?;
        current = map
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    Ok((as_object(current, path)?, (*last).to_string()))
}

/// Read the value at `path`
pub(crate) fn get<'a>(document: &'a Value, path: &str) -> Result<&'a Value, Error> {
    let mut current = document;
    for segment in segments(path)? {
        current = current
            .as_object()
            .and_then(|map| map.get(segment))
            .ok_or_else(|| Error::not_found(path.to_string()))?;
    }
    Ok(current)
}

/// Create or replace the value at `path`
pub(crate) fn set(document: &mut Value, path: &str, value: Value) -> Result<(), Error> {
    let (parent, key) = parent_mut(document, path)?;
    parent.insert(key, value);
    Ok(())
}

/// Push `value` onto the array at `path`, creating the array if absent
pub(crate) fn append(document: &mut Value, path: &str, value: Value) -> Result<(), Error> {
    let (parent, key) = parent_mut(document, path)?;
    match parent.entry(key).or_insert_with(|| Value::Array(Vec::new())) {
        Value::Array(items) => {
            items.push(value);
            Ok(())
        }
        _ => Err(Error::state_store(format!("{}: not an array", path))),
    }
}

/// Remove the value at `path`; missing paths are not an error
pub(crate) fn delete(document: &mut Value, path: &str) -> Result<(), Error> {
    let segments = segments(path)?;
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };

    let mut current = document;
    for segment in parents {
        match current.as_object_mut().and_then(|map| map.get_mut(*segment)) {
            Some(next) => current = next,
            None => return Ok(()),
        }
    }

    if let Some(map) = current.as_object_mut() {
        map.remove(*last);
    }
    Ok(())
}

/// An empty document
pub(crate) fn empty() -> Value {
    Value::Object(Map::new())
}
