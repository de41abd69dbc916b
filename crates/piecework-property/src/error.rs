use thiserror::Error;

use crate::definition::PropertyType;

/// Errors raised while validating a property schema.
///
/// These are configuration errors in a piece definition. They are reported
/// when the schema is built, never while a flow runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
  /// A property lists a refresher that is not declared in the same schema.
  #[error("property '{property}' refreshes on unknown property '{refresher}'")]
  UnknownRefresher { property: String, refresher: String },

  /// The refresher graph contains a cycle.
  #[error("cycle detected in refreshers: {}", path.join(" -> "))]
  CycleDetected { path: Vec<String> },

  /// A property lists the same refresher twice.
  #[error("property '{property}' lists refresher '{refresher}' more than once")]
  DuplicateRefresher { property: String, refresher: String },

  /// A declaration names a kind that needs a resolver callback.
  #[error("property '{property}' of type {property_type:?} needs a resolver and cannot be declared in JSON")]
  ResolverRequired {
    property: String,
    property_type: PropertyType,
  },
}
