use serde_json::{Map, Value};

/// Reduce arbitrary JSON metadata to the scalar-only shape the store
/// accepts.
///
/// Null values are dropped, scalars keep their type, and arrays or nested
/// objects are flattened to their JSON text. Never fails; non-object input
/// sanitizes to an empty object.
pub fn sanitize_metadata(metadata: &Value) -> Value {
    let Value::Object(fields) = metadata else {
        return Value::Object(Map::new());
    };

    let mut safe = Map::new();
    for (key, value) in fields {
        match value {
            Value::Null => {}
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                safe.insert(key.clone(), value.clone());
            }
            Value::Array(_) | Value::Object(_) => {
                safe.insert(key.clone(), Value::String(value.to_string()));
            }
        }
    }
    Value::Object(safe)
}
