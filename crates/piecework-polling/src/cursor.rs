use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a trigger tells new items from delivered ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DedupeStrategy {
  Timebased,
  LastItem,
}

/// Persisted dedup state of one trigger instance.
///
/// Only the field of the trigger's strategy is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingCursor {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_item_id: Option<Value>,
  #[serde(
    default,
    rename = "lastFetchEpochMS",
    skip_serializing_if = "Option::is_none"
  )]
  pub last_fetch_epoch_ms: Option<i64>,
}

impl PollingCursor {
  pub fn timebased(last_fetch_epoch_ms: i64) -> Self {
    Self {
      last_fetch_epoch_ms: Some(last_fetch_epoch_ms),
      ..Default::default()
    }
  }

  pub fn last_item(last_item_id: Option<Value>) -> Self {
    Self {
      last_item_id,
      ..Default::default()
    }
  }
}
