use serde::{Deserialize, Serialize};

/// Configuration for a [`PollingTrigger`](crate::PollingTrigger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
  /// Most items delivered per cycle. The cursor still advances past items
  /// beyond the cap.
  pub max_items_to_poll: Option<usize>,
  /// Time allowed for one fetch. `None` waits indefinitely.
  pub timeout_ms: Option<u64>,
}

impl Default for PollingConfig {
  fn default() -> Self {
    Self {
      max_items_to_poll: None,
      timeout_ms: Some(60_000),
    }
  }
}
