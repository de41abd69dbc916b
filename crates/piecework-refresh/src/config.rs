use serde::{Deserialize, Serialize};

/// Configuration for property resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
  /// How many `DynamicProperties` levels may nest inside each other.
  pub max_dynamic_depth: usize,
}

impl Default for ResolverConfig {
  fn default() -> Self {
    Self {
      max_dynamic_depth: 8,
    }
  }
}
