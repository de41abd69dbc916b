use piecework_property::{PropertySchema, PropertyType};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::coerce::Coercer;
use crate::error::VariablesError;

/// Apply defaults, coerce, and check required properties.
///
/// Values are coerced in schema order. A missing or null value takes the
/// property's default first. Keys the schema does not declare are kept
/// untouched, and `Markdown` properties never appear in the output.
#[instrument(skip_all, fields(properties = schema.len()))]
pub async fn process_inputs(
  coercer: &Coercer,
  schema: &PropertySchema,
  raw: &Map<String, Value>,
  cancel: &CancellationToken,
) -> Result<Map<String, Value>, VariablesError> {
  let mut out = Map::new();
  let mut missing = Vec::new();

  for (key, definition) in schema.iter() {
    if definition.property_type() == PropertyType::Markdown {
      continue;
    }

    let value = raw
      .get(key)
      .filter(|v| !v.is_null())
      .or(definition.default_value.as_ref());

    let coerced = match value {
      Some(value) => coercer.coerce_property(definition, value, cancel).await,
      None => None,
    };

    match coerced {
      Some(coerced) => {
        out.insert(key.clone(), coerced.into_json());
      }
      None if definition.required => missing.push(key.clone()),
      None => debug!(property = %key, "optional property left unset"),
    }
  }

  if !missing.is_empty() {
    return Err(VariablesError::MissingRequired { keys: missing });
  }

  for (key, value) in raw {
    if !schema.contains_key(key) {
      out.insert(key.clone(), value.clone());
    }
  }

  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::coerce::CoercionConfig;
  use async_trait::async_trait;
  use piecework_http::{HttpClient, HttpError, HttpRequest, HttpResponse};
  use piecework_property::PropertyDefinition;
  use serde_json::json;
  use std::sync::Arc;

  struct NoHttp;

  #[async_trait]
  impl HttpClient for NoHttp {
    async fn send_request(&self, _request: HttpRequest) -> Result<HttpResponse, HttpError> {
      Ok(HttpResponse::new(404))
    }
  }

  fn coercer() -> Coercer {
    Coercer::new(Arc::new(NoHttp), CoercionConfig::default())
  }

  fn raw(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
  }

  #[tokio::test]
  async fn test_coerces_in_schema_order() {
    let schema = PropertySchema::new()
      .with("count", PropertyDefinition::number("Count"))
      .with("notify", PropertyDefinition::checkbox("Notify"))
      .with("intro", PropertyDefinition::markdown("Intro", "Read me"));

    let out = process_inputs(
      &coercer(),
      &schema,
      &raw(json!({ "count": "4", "notify": "true", "intro": "ignored" })),
      &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(Value::Object(out), json!({ "count": 4, "notify": true }));
  }

  #[tokio::test]
  async fn test_default_applies_before_coercion() {
    let schema = PropertySchema::new()
      .with("limit", PropertyDefinition::number("Limit").default_value("25"));

    let out = process_inputs(&coercer(), &schema, &Map::new(), &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(out["limit"], json!(25));

    let out = process_inputs(
      &coercer(),
      &schema,
      &raw(json!({ "limit": null })),
      &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(out["limit"], json!(25));
  }

  #[tokio::test]
  async fn test_missing_required_is_reported() {
    let schema = PropertySchema::new()
      .with("to", PropertyDefinition::short_text("To").required(true))
      .with("count", PropertyDefinition::number("Count").required(true))
      .with("cc", PropertyDefinition::short_text("Cc"));

    let result = process_inputs(
      &coercer(),
      &schema,
      &raw(json!({ "count": "many" })),
      &CancellationToken::new(),
    )
    .await;

    match result {
      Err(VariablesError::MissingRequired { keys }) => assert_eq!(keys, vec!["to", "count"]),
      other => panic!("expected MissingRequired, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_undeclared_keys_pass_through() {
    let schema = PropertySchema::new().with("a", PropertyDefinition::number("A"));
    let out = process_inputs(
      &coercer(),
      &schema,
      &raw(json!({ "a": 1, "extra": { "x": 1 } })),
      &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(out["extra"], json!({ "x": 1 }));
  }

  #[tokio::test]
  async fn test_invalid_optional_value_is_dropped() {
    let schema = PropertySchema::new().with("a", PropertyDefinition::number("A"));
    let out = process_inputs(
      &coercer(),
      &schema,
      &raw(json!({ "a": "abc" })),
      &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(!out.contains_key("a"));
  }
}
