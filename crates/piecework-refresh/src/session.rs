use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use indexmap::IndexMap;
use piecework_property::{AUTH_REFRESHER, DependencyGraph, PropertySchema};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::ResolverConfig;
use crate::error::RefreshError;
use crate::resolve::{disabled_for, gather_upstream, nested_values, resolve_property};
use crate::result::ResolutionResult;

/// The latest dispatch of one property. Only a result carrying the current
/// generation is committed.
#[derive(Debug, Clone)]
struct Ticket {
  generation: u64,
  cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct SessionState {
  auth: Option<Value>,
  values: Map<String, Value>,
  results: IndexMap<String, ResolutionResult>,
  tickets: HashMap<String, Ticket>,
}

/// Resolution state for one step being configured in the builder.
///
/// Changing a value recomputes that property (if dependent) and everything
/// transitively downstream of it. Every recomputation takes a new
/// generation and cancels the previous in-flight call for the same property,
/// so a stale response can never overwrite a newer one. Results of
/// invalidated properties are absent until their recomputation commits.
pub struct RefreshSession {
  schema: PropertySchema,
  graph: DependencyGraph,
  config: ResolverConfig,
  shutdown: CancellationToken,
  state: Mutex<SessionState>,
}

impl RefreshSession {
  /// Validate `schema` and create an empty session.
  pub fn new(
    schema: PropertySchema,
    auth: Option<Value>,
    values: Map<String, Value>,
    config: ResolverConfig,
  ) -> Result<Self, RefreshError> {
    let graph = schema.validate()?;
    Ok(Self {
      schema,
      graph,
      config,
      shutdown: CancellationToken::new(),
      state: Mutex::new(SessionState {
        auth,
        values,
        ..Default::default()
      }),
    })
  }

  pub fn schema(&self) -> &PropertySchema {
    &self.schema
  }

  /// Resolve every dependent property.
  #[instrument(skip_all)]
  pub async fn resolve_all(&self) -> Vec<String> {
    let keys: Vec<String> = self
      .graph
      .order()
      .iter()
      .filter(|key| self.is_dependent(key))
      .cloned()
      .collect();

    let tickets = {
      let mut state = self.lock();
      self.invalidate(&mut state, &keys)
    };
    self.refresh(tickets).await;
    keys
  }

  /// Set (or with `null`, clear) a value and recompute what depends on it.
  ///
  /// Returns the keys that were recomputed, in resolution order.
  #[instrument(skip(self, value), fields(property = %key))]
  pub async fn set_value(&self, key: &str, value: Value) -> Vec<String> {
    let mut affected = Vec::new();
    if self.is_dependent(key) {
      affected.push(key.to_string());
    }
    affected.extend(self.graph.affected_by(key));

    let tickets = {
      let mut state = self.lock();
      if value.is_null() {
        state.values.remove(key);
      } else {
        state.values.insert(key.to_string(), value);
      }
      self.invalidate(&mut state, &affected)
    };

    self.refresh(tickets).await;
    affected
  }

  /// Replace the connection and recompute everything that reads `auth`.
  #[instrument(skip_all)]
  pub async fn set_auth(&self, auth: Option<Value>) -> Vec<String> {
    let affected = self.affected_by_auth();

    let tickets = {
      let mut state = self.lock();
      state.auth = auth;
      self.invalidate(&mut state, &affected)
    };

    self.refresh(tickets).await;
    affected
  }

  /// The committed result for `key`, if any.
  pub fn result(&self, key: &str) -> Option<ResolutionResult> {
    self.lock().results.get(key).cloned()
  }

  /// All committed results, in schema order.
  pub fn results(&self) -> IndexMap<String, ResolutionResult> {
    let state = self.lock();
    self
      .schema
      .keys()
      .filter_map(|key| state.results.get(key).map(|r| (key.clone(), r.clone())))
      .collect()
  }

  pub fn values(&self) -> Map<String, Value> {
    self.lock().values.clone()
  }

  /// Cancel every in-flight call. Calls made afterwards are cancelled as
  /// soon as they start.
  pub fn close(&self) {
    info!("closing refresh session");
    self.shutdown.cancel();
  }

  fn lock(&self) -> MutexGuard<'_, SessionState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn is_dependent(&self, key: &str) -> bool {
    self
      .schema
      .get(key)
      .is_some_and(|d| d.property_type().is_dependent())
  }

  fn affected_by_auth(&self) -> Vec<String> {
    if self.schema.contains_key(AUTH_REFRESHER) {
      return self.graph.affected_by(AUTH_REFRESHER);
    }

    let mut affected: Vec<&str> = Vec::new();
    for (key, definition) in self.schema.iter() {
      if definition.refreshers().iter().any(|r| r == AUTH_REFRESHER) {
        affected.push(key);
      }
    }
    let downstream: Vec<String> = affected
      .iter()
      .flat_map(|key| self.graph.affected_by(key))
      .collect();

    self
      .graph
      .order()
      .iter()
      .filter(|key| affected.contains(&key.as_str()) || downstream.contains(key))
      .cloned()
      .collect()
  }

  /// Issue new tickets for `keys`, cancelling their in-flight calls and
  /// dropping their results.
  fn invalidate(&self, state: &mut SessionState, keys: &[String]) -> Vec<(String, Ticket)> {
    keys
      .iter()
      .map(|key| {
        let generation = match state.tickets.get(key) {
          Some(previous) => {
            previous.cancel.cancel();
            previous.generation + 1
          }
          None => 1,
        };
        let ticket = Ticket {
          generation,
          cancel: self.shutdown.child_token(),
        };
        state.tickets.insert(key.clone(), ticket.clone());
        state.results.shift_remove(key);
        (key.clone(), ticket)
      })
      .collect()
  }

  /// Recompute ticketed properties level by level. Within a level, calls run
  /// concurrently. A result is committed only if its ticket is still current.
  async fn refresh(&self, mut tickets: Vec<(String, Ticket)>) {
    tickets.sort_by_key(|(key, _)| self.graph.level_of(key).unwrap_or(usize::MAX));

    let mut start = 0;
    while start < tickets.len() {
      let level = self.graph.level_of(&tickets[start].0);
      let end = tickets[start..]
        .iter()
        .position(|(key, _)| self.graph.level_of(key) != level)
        .map_or(tickets.len(), |offset| start + offset);

      self.refresh_level(&tickets[start..end]).await;
      start = end;
    }
  }

  async fn refresh_level(&self, tickets: &[(String, Ticket)]) {
    let mut pending = Vec::new();

    {
      let mut state = self.lock();
      for (key, ticket) in tickets {
        if !is_current(&state, key, ticket) {
          debug!(property = %key, "superseded before dispatch");
          continue;
        }
        let Some(definition) = self.schema.get(key) else {
          continue;
        };

        match gather_upstream(
          definition,
          &self.schema,
          state.auth.as_ref(),
          &state.values,
          &state.results,
        ) {
          Ok(upstream) => pending.push((
            key,
            ticket,
            definition,
            upstream,
            state.auth.clone(),
            nested_values(&state.values, key),
          )),
          Err(placeholder) => {
            debug!(property = %key, placeholder = %placeholder, "short-circuited");
            state
              .results
              .insert(key.clone(), disabled_for(definition, placeholder));
          }
        }
      }
    }

    let resolved = join_all(pending.into_iter().map(
      |(key, ticket, definition, upstream, auth, nested)| async move {
        let result = resolve_property(
          key,
          definition,
          upstream,
          auth,
          nested,
          &self.config,
          0,
          ticket.cancel.clone(),
        )
        .await;
        (key, ticket, result)
      },
    ))
    .await;

    let mut state = self.lock();
    for (key, ticket, result) in resolved {
      commit(&mut state, key, ticket, result);
    }
  }
}

fn is_current(state: &SessionState, key: &str, ticket: &Ticket) -> bool {
  state
    .tickets
    .get(key)
    .is_some_and(|current| current.generation == ticket.generation)
}

/// Store `result` if `ticket` is still the latest for `key`.
fn commit(
  state: &mut SessionState,
  key: &str,
  ticket: &Ticket,
  result: Option<ResolutionResult>,
) -> bool {
  match result {
    Some(result) if is_current(state, key, ticket) => {
      state.results.insert(key.to_string(), result);
      true
    }
    _ => {
      debug!(property = %key, generation = ticket.generation, "discarded stale result");
      false
    }
  }
}
