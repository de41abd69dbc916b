//! Variables error types.

/// Errors that fail a step before it runs.
///
/// Malformed values are not errors: coercion returns `None` for them.
#[derive(Debug, thiserror::Error)]
pub enum VariablesError {
  /// A template could not be parsed or rendered.
  #[error("failed to resolve input '{input}' of step '{step}': {message}")]
  TemplateRendering {
    step: String,
    input: String,
    message: String,
  },

  /// Required properties have no usable value after coercion.
  #[error("missing required properties: {}", keys.join(", "))]
  MissingRequired { keys: Vec<String> },
}
