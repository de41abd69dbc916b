use futures::future::{BoxFuture, join_all};
use indexmap::IndexMap;
use piecework_property::{
  AUTH_REFRESHER, DependencyGraph, DropdownState, PropertyDefinition, PropertyKind, PropertySchema,
  ResolveContext, ResolverError,
};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, instrument, warn};

use crate::config::ResolverConfig;
use crate::error::RefreshError;
use crate::result::{DynamicFields, ResolutionResult};

pub(crate) const CONNECT_FIRST: &str = "Connect your account first";

pub(crate) fn select_first(definition: &PropertyDefinition) -> String {
  format!("Select {} first", definition.display_name)
}

pub(crate) fn load_failed(definition: &PropertyDefinition) -> String {
  format!(
    "Couldn't load {}, check your connection credentials",
    definition.display_name
  )
}

pub(crate) fn too_deep(depth: usize) -> String {
  format!("Fields are nested more than {depth} levels deep")
}

/// A disabled result of the right shape for `definition`.
pub(crate) fn disabled_for(definition: &PropertyDefinition, placeholder: String) -> ResolutionResult {
  match definition.kind {
    PropertyKind::DynamicProperties { .. } => {
      ResolutionResult::DynamicFields(DynamicFields::disabled(placeholder))
    }
    _ => ResolutionResult::Options(DropdownState::disabled(placeholder)),
  }
}

/// Collect the upstream values a dependent property reads.
///
/// Returns the short-circuit placeholder when a required upstream is missing
/// or currently disabled. Optional upstreams that are missing are passed as
/// `null`.
pub(crate) fn gather_upstream(
  definition: &PropertyDefinition,
  schema: &PropertySchema,
  auth: Option<&Value>,
  values: &Map<String, Value>,
  results: &IndexMap<String, ResolutionResult>,
) -> Result<Map<String, Value>, String> {
  let mut upstream = Map::new();

  for refresher in definition.refreshers() {
    let Some(upstream_def) = schema.get(refresher) else {
      // Only `auth` can be undeclared in a validated schema.
      if refresher == AUTH_REFRESHER && auth.is_none() {
        return Err(CONNECT_FIRST.to_string());
      }
      continue;
    };

    let disabled = results
      .get(refresher)
      .is_some_and(ResolutionResult::is_disabled);
    let value = values.get(refresher).filter(|v| !v.is_null() && !disabled);

    match value {
      Some(value) => {
        upstream.insert(refresher.clone(), value.clone());
      }
      None if upstream_def.required => return Err(select_first(upstream_def)),
      None => {
        upstream.insert(refresher.clone(), Value::Null);
      }
    }
  }

  Ok(upstream)
}

/// Nested values of a `DynamicProperties` property.
pub(crate) fn nested_values(values: &Map<String, Value>, key: &str) -> Map<String, Value> {
  values
    .get(key)
    .and_then(Value::as_object)
    .cloned()
    .unwrap_or_default()
}

/// Invoke the callback of one dependent property.
///
/// Returns `None` when `cancel` fires before the callback settles.
#[allow(clippy::too_many_arguments)]
pub(crate) fn resolve_property<'a>(
  key: &'a str,
  definition: &'a PropertyDefinition,
  upstream: Map<String, Value>,
  auth: Option<Value>,
  nested: Map<String, Value>,
  config: &'a ResolverConfig,
  depth: usize,
  cancel: CancellationToken,
) -> BoxFuture<'a, Option<ResolutionResult>> {
  let span = debug_span!("resolve_property", property = %key, depth);
  Box::pin(
    async move {
      let ctx = ResolveContext {
        auth: auth.clone(),
        values: upstream,
        cancel: cancel.clone(),
      };

      match &definition.kind {
        PropertyKind::Dropdown { options, .. } | PropertyKind::MultiSelectDropdown { options, .. } => {
          let outcome = tokio::select! {
            _ = cancel.cancelled() => return None,
            outcome = options.options(ctx) => outcome,
          };

          match outcome {
            Ok(state) => Some(ResolutionResult::Options(state)),
            Err(ResolverError::Cancelled) => None,
            Err(e) => {
              warn!(error = %e, "options resolver failed");
              Some(disabled_for(definition, load_failed(definition)))
            }
          }
        }
        PropertyKind::DynamicProperties { props, .. } => {
          if depth >= config.max_dynamic_depth {
            warn!(depth, "dynamic properties nested too deep");
            return Some(disabled_for(definition, too_deep(config.max_dynamic_depth)));
          }

          let outcome = tokio::select! {
            _ = cancel.cancelled() => return None,
            outcome = props.props(ctx) => outcome,
          };

          let schema = match outcome {
            Ok(schema) => schema,
            Err(ResolverError::Cancelled) => return None,
            Err(e) => {
              warn!(error = %e, "props resolver failed");
              return Some(disabled_for(definition, load_failed(definition)));
            }
          };

          let graph = match schema.validate() {
            Ok(graph) => graph,
            Err(e) => {
              warn!(error = %e, "props resolver returned an invalid schema");
              return Some(disabled_for(definition, load_failed(definition)));
            }
          };

          let results =
            resolve_schema(&schema, &graph, &nested, auth.as_ref(), config, depth + 1, &cancel)
              .await?;
          Some(ResolutionResult::DynamicFields(DynamicFields::ready(
            schema, results,
          )))
        }
        _ => None,
      }
    }
    .instrument(span),
  )
}

/// Resolve every dependent property of a validated schema, level by level.
/// Properties within a level run concurrently.
pub(crate) fn resolve_schema<'a>(
  schema: &'a PropertySchema,
  graph: &'a DependencyGraph,
  values: &'a Map<String, Value>,
  auth: Option<&'a Value>,
  config: &'a ResolverConfig,
  depth: usize,
  cancel: &'a CancellationToken,
) -> BoxFuture<'a, Option<IndexMap<String, ResolutionResult>>> {
  Box::pin(async move {
    let mut results: IndexMap<String, ResolutionResult> = IndexMap::new();

    for level in graph.levels() {
      let mut pending = Vec::new();

      for key in level {
        let Some(definition) = schema.get(key) else {
          continue;
        };
        if !definition.property_type().is_dependent() {
          continue;
        }

        match gather_upstream(definition, schema, auth, values, &results) {
          Ok(upstream) => pending.push((key, definition, upstream)),
          Err(placeholder) => {
            debug!(property = %key, placeholder = %placeholder, "short-circuited");
            results.insert(key.clone(), disabled_for(definition, placeholder));
          }
        }
      }

      let resolved = join_all(pending.into_iter().map(|(key, definition, upstream)| async move {
        let result = resolve_property(
          key,
          definition,
          upstream,
          auth.cloned(),
          nested_values(values, key),
          config,
          depth,
          cancel.child_token(),
        )
        .await;
        (key, result)
      }))
      .await;

      for (key, result) in resolved {
        results.insert(key.clone(), result?);
      }
    }

    Some(
      schema
        .keys()
        .filter_map(|key| results.shift_remove(key).map(|result| (key.clone(), result)))
        .collect(),
    )
  })
}

/// Resolve all dependent properties of `schema` once.
///
/// Fails only for an invalid schema or cancellation; callback failures come
/// back as disabled results.
#[instrument(skip_all, fields(properties = schema.len()))]
pub async fn resolve_properties(
  schema: &PropertySchema,
  values: &Map<String, Value>,
  auth: Option<&Value>,
  config: &ResolverConfig,
  cancel: &CancellationToken,
) -> Result<IndexMap<String, ResolutionResult>, RefreshError> {
  let graph = schema.validate()?;
  resolve_schema(schema, &graph, values, auth, config, 0, cancel)
    .await
    .ok_or(RefreshError::Cancelled)
}
