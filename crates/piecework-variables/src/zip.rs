use serde_json::{Map, Value};

/// Fan an object of parallel arrays out into one object per index.
///
/// Objects become an array of objects; any other value is returned as is.
/// See [`zip_object`].
pub fn zip(value: Value) -> Value {
  match value {
    Value::Object(fields) => Value::Array(zip_object(&fields).into_iter().map(Value::Object).collect()),
    other => other,
  }
}

/// Zip the array-valued fields of `fields`.
///
/// The result has as many objects as the longest array, and at least one.
/// Object `i` takes element `i` of every array field and every scalar field
/// unchanged. A field whose array is shorter than `i + 1` is left out of
/// object `i`.
pub fn zip_object(fields: &Map<String, Value>) -> Vec<Map<String, Value>> {
  let len = fields
    .values()
    .filter_map(Value::as_array)
    .map(Vec::len)
    .max()
    .unwrap_or(0)
    .max(1);

  (0..len)
    .map(|i| {
      fields
        .iter()
        .filter_map(|(key, value)| match value {
          Value::Array(items) => items.get(i).map(|item| (key.clone(), item.clone())),
          scalar => Some((key.clone(), scalar.clone())),
        })
        .collect()
    })
    .collect()
}
