//! Input templates rendered with minijinja.
//!
//! # Single Upstream Step
//! The context is the upstream step's output directly:
//! ```json
//! { "channel": "{{ channel_id }}", "text": "New row: {{ row.name | title }}" }
//! ```
//!
//! # Join Step (Multiple Upstream)
//! The context is keyed by upstream step name:
//! ```json
//! { "email": "{{ lookup_user.email }}", "rows": "{{ read_sheet.rows }}" }
//! ```
//!
//! An input that is exactly one `{{ expression }}` evaluates to the
//! expression's value, so `"{{ read_sheet.rows }}"` stays an array. Anything
//! else renders to a string.

use std::collections::HashMap;

use minijinja::{Environment, Value};
use serde_json::{Map, json};

use crate::error::VariablesError;

/// Resolve a step's input templates against upstream output.
///
/// # Arguments
/// * `step` - The step being resolved (for error messages)
/// * `inputs` - The step's input templates
/// * `upstream` - Output of upstream steps, keyed by step name
/// * `is_join` - Whether the step has more than one upstream
pub fn resolve_inputs(
  step: &str,
  inputs: &HashMap<String, String>,
  upstream: &HashMap<String, serde_json::Value>,
  is_join: bool,
) -> Result<Map<String, serde_json::Value>, VariablesError> {
  let env = Environment::new();

  let context = if is_join {
    let ctx: Map<String, serde_json::Value> = upstream
      .iter()
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect();
    serde_json::Value::Object(ctx)
  } else {
    upstream.values().next().cloned().unwrap_or(json!({}))
  };

  let ctx_value = Value::from_serialize(&context);

  let mut resolved = Map::new();
  for (key, template) in inputs {
    let value = resolve_template(&env, step, key, template, &ctx_value)?;
    resolved.insert(key.clone(), value);
  }

  Ok(resolved)
}

fn resolve_template(
  env: &Environment,
  step: &str,
  input: &str,
  template: &str,
  context: &Value,
) -> Result<serde_json::Value, VariablesError> {
  let error = |e: minijinja::Error| VariablesError::TemplateRendering {
    step: step.to_string(),
    input: input.to_string(),
    message: e.to_string(),
  };

  if let Some(expr) = whole_expression(template) {
    let value = env
      .compile_expression(expr)
      .and_then(|compiled| compiled.eval(context.clone()))
      .map_err(error)?;
    if value.is_undefined() || value.is_none() {
      return Ok(serde_json::Value::Null);
    }
    return serde_json::to_value(&value).map_err(|e| VariablesError::TemplateRendering {
      step: step.to_string(),
      input: input.to_string(),
      message: e.to_string(),
    });
  }

  if !template.contains("{{") && !template.contains("{%") {
    return Ok(serde_json::Value::String(template.to_string()));
  }

  env
    .render_str(template, context.clone())
    .map(serde_json::Value::String)
    .map_err(error)
}

/// The inner expression of a template that is exactly `{{ expr }}`.
fn whole_expression(template: &str) -> Option<&str> {
  let inner = template
    .trim()
    .strip_prefix("{{")?
    .strip_suffix("}}")?;
  if inner.contains("{{") || inner.contains("}}") || inner.trim().is_empty() {
    return None;
  }
  Some(inner.trim())
}
