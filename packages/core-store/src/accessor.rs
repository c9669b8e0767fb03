//! Resolving dotted paths against a document.
//!
//! Reads and deletes are tolerant: a missing or non-container intermediate
//! means "not found". Writes create missing intermediates as empty mappings,
//! and refuse to replace an existing scalar. A failed write leaves the
//! document untouched.

use serde_json::{Map, Value};

use crate::error::{kind_name, Error};
use crate::path::Path;

/// The top-level mapping of a store.
pub type Document = Map<String, Value>;

/// Get a reference to the value at `path`, if every component exists.
pub fn resolve_for_read<'a>(doc: &'a Document, path: &Path) -> Option<&'a Value> {
    let (first, rest) = path.components.split_first()?;
    let mut cursor = doc.get(first)?;
    for component in rest {
        cursor = match cursor {
            Value::Object(map) => map.get(component)?,
            Value::Array(arr) => arr.get(component.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cursor)
}

/// Get a mutable reference to the value at `path`, if every component exists.
pub fn resolve_for_read_mut<'a>(doc: &'a mut Document, path: &Path) -> Option<&'a mut Value> {
    let (first, rest) = path.components.split_first()?;
    let mut cursor = doc.get_mut(first)?;
    for component in rest {
        cursor = match cursor {
            Value::Object(map) => map.get_mut(component)?,
            Value::Array(arr) => arr.get_mut(component.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cursor)
}

/// Set `value` at `path`, creating missing intermediate mappings.
///
/// A `null` intermediate is replaced by a mapping. Sequence components must be
/// an index no greater than the sequence length; the length itself appends.
pub fn resolve_for_write(doc: &mut Document, path: &Path, value: Value) -> Result<(), Error> {
    let (parents, last) = path.split_last();
    let Some((first, rest)) = parents.split_first() else {
        doc.insert(last.to_string(), value);
        return Ok(());
    };

    // Errors only come from existing non-null data. Anything created on the
    // way down is a fresh null or mapping, after which no step can fail.
    let mut holder: &str = first;
    let mut cursor = doc.entry(first.clone()).or_insert(Value::Null);
    for component in rest {
        cursor = descend(cursor, holder, component, path)?;
        holder = component;
    }

    set_child(cursor, holder, last, value, path)
}

/// Remove the value at `path`, returning it if it existed.
///
/// Missing intermediates make this a no-op. Removing from a sequence shifts
/// the following elements down.
pub fn resolve_for_delete(doc: &mut Document, path: &Path) -> Option<Value> {
    let (parents, last) = path.split_last();
    if parents.is_empty() {
        return doc.shift_remove(last);
    }

    let parent_path = Path {
        components: parents.to_vec(),
    };
    match resolve_for_read_mut(doc, &parent_path)? {
        Value::Object(map) => map.shift_remove(last),
        Value::Array(arr) => {
            let index = last.parse::<usize>().ok()?;
            if index < arr.len() {
                Some(arr.remove(index))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn descend<'a>(
    cursor: &'a mut Value,
    holder: &str,
    component: &str,
    path: &Path,
) -> Result<&'a mut Value, Error> {
    if cursor.is_null() {
        *cursor = Value::Object(Map::new());
    }

    match cursor {
        Value::Object(map) => Ok(map.entry(component.to_string()).or_insert(Value::Null)),
        Value::Array(arr) => {
            let index = parse_index(component, path)?;
            let len = arr.len();
            if index < len {
                Ok(&mut arr[index])
            } else if index == len {
                arr.push(Value::Null);
                Ok(&mut arr[len])
            } else {
                Err(Error::IndexOutOfBounds {
                    path: path.clone(),
                    index,
                    len,
                })
            }
        }
        other => Err(Error::NotAContainer {
            path: path.clone(),
            component: holder.to_string(),
            found: kind_name(other),
        }),
    }
}

fn set_child(
    parent: &mut Value,
    holder: &str,
    key: &str,
    value: Value,
    path: &Path,
) -> Result<(), Error> {
    match parent {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
            Ok(())
        }
        Value::Array(arr) => {
            let index = parse_index(key, path)?;
            let len = arr.len();
            if index < len {
                arr[index] = value;
            } else if index == len {
                arr.push(value);
            } else {
                return Err(Error::IndexOutOfBounds {
                    path: path.clone(),
                    index,
                    len,
                });
            }
            Ok(())
        }
        Value::Null => {
            let mut map = Map::new();
            map.insert(key.to_string(), value);
            *parent = Value::Object(map);
            Ok(())
        }
        other => Err(Error::NotAContainer {
            path: path.clone(),
            component: holder.to_string(),
            found: kind_name(other),
        }),
    }
}

fn parse_index(component: &str, path: &Path) -> Result<usize, Error> {
    component.parse::<usize>().map_err(|_| Error::InvalidIndex {
        path: path.clone(),
        component: component.to_string(),
    })
}
