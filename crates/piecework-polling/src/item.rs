use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One item returned by a poller.
///
/// Time-based pollers set `epoch_milli_seconds`, last-item pollers set `id`.
/// An item missing the field its strategy needs is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolledItem {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub epoch_milli_seconds: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<Value>,
  pub data: Value,
}

impl PolledItem {
  pub fn at(epoch_milli_seconds: i64, data: Value) -> Self {
    Self {
      epoch_milli_seconds: Some(epoch_milli_seconds),
      id: None,
      data,
    }
  }

  pub fn with_id(id: impl Into<Value>, data: Value) -> Self {
    Self {
      epoch_milli_seconds: None,
      id: Some(id.into()),
      data,
    }
  }
}
