//! Per-type value coercion.
//!
//! Each [`PropertyType`] maps to one [`CoercionRule`]. Rules never fail: a
//! value that cannot be coerced comes back as `None` so the property is
//! treated as absent.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use futures::future::BoxFuture;
use piecework_http::{HttpClient, HttpRequest};
use piecework_property::{PropertyDefinition, PropertyKind, PropertySchema, PropertyType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::file::{ApFile, filename_from_content_disposition, filename_from_url_path, parse_data_uri};

/// Configuration for [`Coercer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoercionConfig {
  /// Reject data URIs whose payload is not valid base64.
  pub strict_base64: bool,
  /// Largest file, in bytes, downloaded for a URL file value.
  pub max_file_bytes: usize,
}

impl Default for CoercionConfig {
  fn default() -> Self {
    Self {
      strict_base64: false,
      max_file_bytes: 50 * 1024 * 1024,
    }
  }
}

/// A coerced property value.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedValue {
  Json(Value),
  File(ApFile),
}

impl CoercedValue {
  pub fn as_json(&self) -> Option<&Value> {
    match self {
      CoercedValue::Json(value) => Some(value),
      CoercedValue::File(_) => None,
    }
  }

  pub fn as_file(&self) -> Option<&ApFile> {
    match self {
      CoercedValue::File(file) => Some(file),
      CoercedValue::Json(_) => None,
    }
  }

  /// The JSON form; files serialize with base64 data.
  pub fn into_json(self) -> Value {
    match self {
      CoercedValue::Json(value) => value,
      CoercedValue::File(file) => serde_json::to_value(file).unwrap_or(Value::Null),
    }
  }
}

/// How a property type is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionRule {
  /// Strings as-is, scalars stringified, objects and arrays as JSON text.
  Text,
  /// Numbers and numeric strings.
  Number,
  /// Booleans and `"true"`/`"false"`.
  Boolean,
  /// Timestamps normalized to RFC 3339 UTC.
  DateTime,
  /// JSON strings are parsed; other values pass through.
  Json,
  /// Data URIs and URLs materialized as files.
  File,
  /// Objects, or strings holding a JSON object.
  Object,
  /// Arrays, JSON array strings, or a single value wrapped in an array.
  Array,
  /// Value passed through untouched.
  Passthrough,
  /// Display-only; never produces a value.
  Skip,
}

/// The rule applied to each property type.
pub fn rule_for(property_type: PropertyType) -> CoercionRule {
  match property_type {
    PropertyType::ShortText | PropertyType::LongText | PropertyType::SecretText => {
      CoercionRule::Text
    }
    PropertyType::Number => CoercionRule::Number,
    PropertyType::Checkbox => CoercionRule::Boolean,
    PropertyType::DateTime => CoercionRule::DateTime,
    PropertyType::Json => CoercionRule::Json,
    PropertyType::File => CoercionRule::File,
    PropertyType::Object | PropertyType::DynamicProperties => CoercionRule::Object,
    PropertyType::Array
    | PropertyType::StaticMultiSelectDropdown
    | PropertyType::MultiSelectDropdown => CoercionRule::Array,
    PropertyType::StaticDropdown | PropertyType::Dropdown => CoercionRule::Passthrough,
    PropertyType::Markdown => CoercionRule::Skip,
  }
}

/// Coerces raw property values. Holds the HTTP client used for URL files.
#[derive(Clone)]
pub struct Coercer {
  http: Arc<dyn HttpClient>,
  config: CoercionConfig,
}

impl Coercer {
  pub fn new(http: Arc<dyn HttpClient>, config: CoercionConfig) -> Self {
    Self { http, config }
  }

  pub fn config(&self) -> &CoercionConfig {
    &self.config
  }

  /// Coerce `raw` according to `property_type`.
  pub async fn coerce(
    &self,
    property_type: PropertyType,
    raw: &Value,
    cancel: &CancellationToken,
  ) -> Option<CoercedValue> {
    if raw.is_null() {
      return None;
    }

    let rule = rule_for(property_type);
    let coerced = match rule {
      CoercionRule::File => self.coerce_file(raw, cancel).await.map(CoercedValue::File),
      CoercionRule::Skip => None,
      _ => coerce_json(rule, raw).map(CoercedValue::Json),
    };

    if coerced.is_none() && rule != CoercionRule::Skip {
      warn!(property_type = ?property_type, "value could not be coerced");
    }
    coerced
  }

  /// Coerce `raw` for a full definition. Array items are coerced against the
  /// array's item schema when one is declared.
  pub fn coerce_property<'a>(
    &'a self,
    definition: &'a PropertyDefinition,
    raw: &'a Value,
    cancel: &'a CancellationToken,
  ) -> BoxFuture<'a, Option<CoercedValue>> {
    Box::pin(async move {
      let coerced = self.coerce(definition.property_type(), raw, cancel).await?;

      let PropertyKind::Array {
        properties: Some(item_schema),
      } = &definition.kind
      else {
        return Some(coerced);
      };

      let CoercedValue::Json(Value::Array(items)) = coerced else {
        return Some(coerced);
      };

      let mut out = Vec::with_capacity(items.len());
      for item in items {
        out.push(self.coerce_item(item_schema, item, cancel).await);
      }
      Some(CoercedValue::Json(Value::Array(out)))
    })
  }

  async fn coerce_item(
    &self,
    schema: &PropertySchema,
    item: Value,
    cancel: &CancellationToken,
  ) -> Value {
    let Value::Object(mut fields) = item else {
      return item;
    };

    for (key, definition) in schema.iter() {
      let Some(raw) = fields.remove(key) else {
        continue;
      };
      if let Some(coerced) = self.coerce_property(definition, &raw, cancel).await {
        fields.insert(key.to_string(), coerced.into_json());
      }
    }
    Value::Object(fields)
  }

  async fn coerce_file(&self, raw: &Value, cancel: &CancellationToken) -> Option<ApFile> {
    let text = raw.as_str()?.trim();

    if text.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:")) {
      return parse_data_uri(text, self.config.strict_base64);
    }

    let url = url::Url::parse(text).ok()?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
      warn!(url = %url, "file value is not an http(s) URL");
      return None;
    }

    self.fetch_file(url, cancel).await
  }

  async fn fetch_file(&self, url: url::Url, cancel: &CancellationToken) -> Option<ApFile> {
    debug!(url = %url, "downloading file");

    let request = HttpRequest::get(url.as_str()).max_body_bytes(self.config.max_file_bytes);
    let response = match self.http.send_cancellable(request, cancel).await {
      Ok(response) => response,
      Err(e) => {
        warn!(url = %url, error = %e, "file download failed");
        return None;
      }
    };

    if !response.is_success() {
      warn!(url = %url, status = response.status, "file download returned an error status");
      return None;
    }

    // Clients that ignore the request limit.
    if response.body.len() > self.config.max_file_bytes {
      warn!(
        url = %url,
        size = response.body.len(),
        limit = self.config.max_file_bytes,
        "downloaded file exceeds size limit"
      );
      return None;
    }

    let media_type = response
      .header("content-type")
      .unwrap_or("application/octet-stream")
      .to_string();

    let filename = response
      .header("content-disposition")
      .and_then(filename_from_content_disposition)
      .or_else(|| filename_from_url_path(&url));

    Some(match filename {
      Some(name) => ApFile::named(name, response.body, Some(&media_type)),
      None => ApFile::unnamed(response.body, &media_type),
    })
  }
}

fn coerce_json(rule: CoercionRule, raw: &Value) -> Option<Value> {
  match rule {
    CoercionRule::Text => coerce_text(raw),
    CoercionRule::Number => coerce_number(raw),
    CoercionRule::Boolean => coerce_boolean(raw),
    CoercionRule::DateTime => coerce_date_time(raw),
    CoercionRule::Json => coerce_json_value(raw),
    CoercionRule::Object => coerce_object(raw),
    CoercionRule::Array => coerce_array(raw),
    CoercionRule::Passthrough => Some(raw.clone()),
    CoercionRule::File | CoercionRule::Skip => None,
  }
}

fn coerce_text(raw: &Value) -> Option<Value> {
  match raw {
    Value::String(_) => Some(raw.clone()),
    Value::Number(n) => Some(Value::String(n.to_string())),
    Value::Bool(b) => Some(Value::String(b.to_string())),
    Value::Array(_) | Value::Object(_) => serde_json::to_string(raw).ok().map(Value::String),
    Value::Null => None,
  }
}

fn coerce_number(raw: &Value) -> Option<Value> {
  match raw {
    Value::Number(_) => Some(raw.clone()),
    Value::String(s) => {
      let s = s.trim();
      if s.is_empty() {
        return None;
      }
      if let Ok(n) = s.parse::<i64>() {
        return Some(Value::from(n));
      }
      let n = s.parse::<f64>().ok()?;
      serde_json::Number::from_f64(n).map(Value::Number)
    }
    _ => None,
  }
}

fn coerce_boolean(raw: &Value) -> Option<Value> {
  match raw {
    Value::Bool(_) => Some(raw.clone()),
    Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
      "true" => Some(Value::Bool(true)),
      "false" => Some(Value::Bool(false)),
      _ => None,
    },
    _ => None,
  }
}

fn coerce_date_time(raw: &Value) -> Option<Value> {
  let parsed: DateTime<Utc> = match raw {
    Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single()?,
    Value::String(s) => parse_date_time(s.trim())?,
    _ => return None,
  };
  Some(Value::String(
    parsed.to_rfc3339_opts(SecondsFormat::Millis, true),
  ))
}

fn parse_date_time(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
    return Some(naive.and_utc());
  }
  if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
    return Some(naive.and_utc());
  }
  if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
    return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
  }
  let millis = s.parse::<i64>().ok()?;
  Utc.timestamp_millis_opt(millis).single()
}

fn coerce_json_value(raw: &Value) -> Option<Value> {
  match raw {
    Value::String(s) => serde_json::from_str(s).ok(),
    _ => Some(raw.clone()),
  }
}

fn coerce_object(raw: &Value) -> Option<Value> {
  match raw {
    Value::Object(_) => Some(raw.clone()),
    Value::String(s) => match serde_json::from_str::<Value>(s) {
      Ok(parsed @ Value::Object(_)) => Some(parsed),
      _ => None,
    },
    _ => None,
  }
}

fn coerce_array(raw: &Value) -> Option<Value> {
  match raw {
    Value::Array(_) => Some(raw.clone()),
    Value::String(s) => match serde_json::from_str::<Value>(s) {
      Ok(parsed @ Value::Array(_)) => Some(parsed),
      _ => Some(Value::Array(vec![raw.clone()])),
    },
    Value::Null => None,
    other => Some(Value::Array(vec![other.clone()])),
  }
}
