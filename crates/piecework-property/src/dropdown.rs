use serde::{Deserialize, Serialize};

/// A single selectable choice of a dropdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropdownOption {
  pub label: String,
  pub value: serde_json::Value,
}

impl DropdownOption {
  pub fn new(label: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
    Self {
      label: label.into(),
      value: value.into(),
    }
  }
}

/// The options a dropdown currently offers.
///
/// A disabled state carries an explanatory placeholder instead of options,
/// e.g. while an upstream selection is missing or the remote fetch failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropdownState {
  pub disabled: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub placeholder: Option<String>,
  pub options: Vec<DropdownOption>,
}

impl DropdownState {
  /// An enabled dropdown offering `options`.
  pub fn ready(options: Vec<DropdownOption>) -> Self {
    Self {
      disabled: false,
      placeholder: None,
      options,
    }
  }

  /// A disabled dropdown with no options.
  pub fn disabled(placeholder: impl Into<String>) -> Self {
    Self {
      disabled: true,
      placeholder: Some(placeholder.into()),
      options: Vec::new(),
    }
  }

  /// Attach a placeholder shown while nothing is selected.
  pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
    self.placeholder = Some(placeholder.into());
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_disabled_state_has_no_options() {
    let state = DropdownState::disabled("Select a base first");
    assert!(state.disabled);
    assert!(state.options.is_empty());
    assert_eq!(state.placeholder.as_deref(), Some("Select a base first"));
  }

  #[test]
  fn test_serializes_camel_case_without_empty_placeholder() {
    let state = DropdownState::ready(vec![DropdownOption::new("Main", "app123")]);
    let value = serde_json::to_value(&state).unwrap();
    assert_eq!(
      value,
      json!({
        "disabled": false,
        "options": [{ "label": "Main", "value": "app123" }]
      })
    );
  }
}
