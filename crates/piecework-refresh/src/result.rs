use indexmap::IndexMap;
use piecework_property::{DropdownOption, DropdownState, PropertySchema};
use serde::Serialize;

/// The resolved state of one dependent property.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResolutionResult {
  /// Options of a `Dropdown` or `MultiSelectDropdown`.
  Options(DropdownState),
  /// Nested fields of a `DynamicProperties` property.
  DynamicFields(DynamicFields),
}

impl ResolutionResult {
  pub fn is_disabled(&self) -> bool {
    match self {
      ResolutionResult::Options(state) => state.disabled,
      ResolutionResult::DynamicFields(fields) => fields.disabled,
    }
  }

  pub fn placeholder(&self) -> Option<&str> {
    match self {
      ResolutionResult::Options(state) => state.placeholder.as_deref(),
      ResolutionResult::DynamicFields(fields) => fields.placeholder.as_deref(),
    }
  }

  pub fn options(&self) -> Option<&[DropdownOption]> {
    match self {
      ResolutionResult::Options(state) => Some(&state.options),
      ResolutionResult::DynamicFields(_) => None,
    }
  }

  pub fn dynamic_fields(&self) -> Option<&DynamicFields> {
    match self {
      ResolutionResult::DynamicFields(fields) => Some(fields),
      ResolutionResult::Options(_) => None,
    }
  }
}

/// A nested schema returned by a `DynamicProperties` callback, with the
/// results of its own dependent properties.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicFields {
  pub disabled: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub placeholder: Option<String>,
  pub schema: PropertySchema,
  pub results: IndexMap<String, ResolutionResult>,
}

impl DynamicFields {
  pub fn ready(schema: PropertySchema, results: IndexMap<String, ResolutionResult>) -> Self {
    Self {
      disabled: false,
      placeholder: None,
      schema,
      results,
    }
  }

  pub fn disabled(placeholder: impl Into<String>) -> Self {
    Self {
      disabled: true,
      placeholder: Some(placeholder.into()),
      ..Default::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_serialized_shape() {
    let result = ResolutionResult::Options(DropdownState::disabled("Select Base first"));
    assert_eq!(
      serde_json::to_value(&result).unwrap(),
      json!({
        "kind": "options",
        "disabled": true,
        "placeholder": "Select Base first",
        "options": [],
      })
    );
  }

  #[test]
  fn test_accessors() {
    let result = ResolutionResult::DynamicFields(DynamicFields::disabled("Connect your account first"));
    assert!(result.is_disabled());
    assert_eq!(result.placeholder(), Some("Connect your account first"));
    assert!(result.options().is_none());
    assert!(result.dynamic_fields().unwrap().schema.is_empty());
  }
}
