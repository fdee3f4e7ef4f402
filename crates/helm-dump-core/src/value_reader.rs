//! Reading literal values out of decoded manifests.

use serde_json::Value;

use crate::error::{ExtractError, Result};
use crate::path::{FieldPath, Segment};

/// Resolve `path` against `object`.
///
/// Returns the value together with the concrete path that reached it
/// (negative sequence indices replaced by their absolute position), so the
/// syntax-tree matcher can look up the very same node.
pub fn locate<'a>(object: &'a Value, path: &FieldPath) -> Result<(FieldPath, &'a Value)> {
    let mut current = object;
    let mut concrete = FieldPath::root();

    for segment in path.segments() {
        match (segment, current) {
            (Segment::Field(name), Value::Object(map)) => {
                current = map.get(name).ok_or_else(|| {
                    ExtractError::path(
                        path.canonical(),
                        format!("no field {:?} at {}", name, concrete),
                    )
                })?;
                concrete.push(Segment::Field(name.clone()));
            }
            (Segment::Index(index), Value::Array(items)) => {
                let len = items.len() as i64;
                let absolute = if *index < 0 { len + index } else { *index };
                if absolute < 0 || absolute >= len {
                    return Err(ExtractError::path(
                        path.canonical(),
                        format!("index {} out of range at {} (length {})", index, concrete, len),
                    ));
                }
                current = &items[absolute as usize];
                concrete.push(Segment::Index(absolute));
            }
            (segment, other) => {
                let step = match segment {
                    Segment::Field(name) => format!("field {:?}", name),
                    Segment::Index(i) => format!("index {}", i),
                };
                return Err(ExtractError::path(
                    path.canonical(),
                    format!("cannot take {} of {} at {}", step, kind_name(other), concrete),
                ));
            }
        }
    }

    Ok((concrete, current))
}

/// Read the value at `path` as a string.
pub fn read_value(object: &Value, path: &FieldPath) -> Result<String> {
    let (_, value) = locate(object, path)?;
    Ok(render_value(value))
}

/// String form of a decoded value: strings verbatim, scalars in literal
/// form, null as empty, collections as compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
