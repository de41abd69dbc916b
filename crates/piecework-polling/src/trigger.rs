use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use piecework_kv::{KvError, KvStore, ScopedKvStore};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::PollingConfig;
use crate::cursor::{DedupeStrategy, PollingCursor};
use crate::error::{FetchError, PollError};
use crate::item::PolledItem;
use crate::poller::{PollContext, Poller};

const CURSOR_KEY: &str = "cursor";

/// The configured inputs of a trigger instance.
#[derive(Debug, Clone, Default)]
pub struct PollInput {
  pub auth: Option<Value>,
  pub props_value: Map<String, Value>,
}

impl PollInput {
  pub fn new(auth: Option<Value>, props_value: Map<String, Value>) -> Self {
    Self { auth, props_value }
  }
}

/// Whether a trigger instance has a stored cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerState {
  Enabled,
  Disabled,
}

/// One polling trigger instance and its persisted cursor.
///
/// At most one `run` per instance may be in flight at a time; callers
/// schedule accordingly.
pub struct PollingTrigger {
  trigger_id: String,
  strategy: DedupeStrategy,
  poller: Arc<dyn Poller>,
  store: ScopedKvStore,
  clock: Arc<dyn Clock>,
  config: PollingConfig,
}

impl PollingTrigger {
  /// Create a trigger whose cursor lives in `store` under the `trigger_id`
  /// scope.
  pub fn new(
    trigger_id: impl Into<String>,
    strategy: DedupeStrategy,
    poller: Arc<dyn Poller>,
    store: Arc<dyn KvStore>,
  ) -> Self {
    let trigger_id = trigger_id.into();
    Self {
      store: ScopedKvStore::new(store, trigger_id.clone()),
      trigger_id,
      strategy,
      poller,
      clock: Arc::new(SystemClock),
      config: PollingConfig::default(),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_config(mut self, config: PollingConfig) -> Self {
    self.config = config;
    self
  }

  pub fn trigger_id(&self) -> &str {
    &self.trigger_id
  }

  pub fn strategy(&self) -> DedupeStrategy {
    self.strategy
  }

  /// Store the initial cursor. Nothing is delivered.
  ///
  /// Time-based triggers start from the current time. Last-item triggers
  /// fetch once and start from the newest item.
  #[instrument(skip_all, fields(trigger_id = %self.trigger_id, strategy = ?self.strategy))]
  pub async fn on_enable(
    &self,
    input: &PollInput,
    cancel: &CancellationToken,
  ) -> Result<(), PollError> {
    let cursor = match self.strategy {
      DedupeStrategy::Timebased => PollingCursor::timebased(self.clock.now_ms()),
      DedupeStrategy::LastItem => {
        let items = self.fetch(input, PollingCursor::default(), cancel).await?;
        PollingCursor::last_item(items.into_iter().find_map(|item| item.id))
      }
    };

    if cancel.is_cancelled() {
      return Err(PollError::Cancelled);
    }
    self.save(&cursor).await?;
    info!(cursor = ?cursor, "trigger_enabled");
    Ok(())
  }

  /// Delete the cursor. Disabling a disabled trigger is a no-op.
  #[instrument(skip_all, fields(trigger_id = %self.trigger_id))]
  pub async fn on_disable(&self) -> Result<(), PollError> {
    self.store.delete(CURSOR_KEY).await?;
    info!("trigger_disabled");
    Ok(())
  }

  /// Fetch, keep the items not delivered before, and advance the cursor.
  ///
  /// The cursor is written before the items are returned. On any error the
  /// cursor is left as it was.
  #[instrument(skip_all, fields(trigger_id = %self.trigger_id, strategy = ?self.strategy))]
  pub async fn run(
    &self,
    input: &PollInput,
    cancel: &CancellationToken,
  ) -> Result<Vec<Value>, PollError> {
    self.poll(input, cancel, true).await
  }

  /// Like [`run`](Self::run), but never writes the cursor.
  #[instrument(skip_all, fields(trigger_id = %self.trigger_id, strategy = ?self.strategy))]
  pub async fn test(
    &self,
    input: &PollInput,
    cancel: &CancellationToken,
  ) -> Result<Vec<Value>, PollError> {
    self.poll(input, cancel, false).await
  }

  pub async fn state(&self) -> Result<TriggerState, PollError> {
    Ok(match self.cursor().await? {
      Some(_) => TriggerState::Enabled,
      None => TriggerState::Disabled,
    })
  }

  /// The stored cursor, if the trigger is enabled.
  pub async fn cursor(&self) -> Result<Option<PollingCursor>, PollError> {
    match self.store.get(CURSOR_KEY).await? {
      Some(value) => serde_json::from_value(value)
        .map(Some)
        .map_err(|e| PollError::CorruptCursor {
          message: e.to_string(),
        }),
      None => Ok(None),
    }
  }

  async fn poll(
    &self,
    input: &PollInput,
    cancel: &CancellationToken,
    commit: bool,
  ) -> Result<Vec<Value>, PollError> {
    let cursor = match self.cursor().await? {
      Some(cursor) => cursor,
      None => {
        warn!("no cursor stored, treating every item as new");
        PollingCursor::default()
      }
    };

    let items = self.fetch(input, cursor.clone(), cancel).await?;
    let fetched = items.len();

    let (mut fresh, next) = match self.strategy {
      DedupeStrategy::Timebased => dedupe_timebased(&cursor, items),
      DedupeStrategy::LastItem => dedupe_last_item(&cursor, items),
    };

    if cancel.is_cancelled() {
      return Err(PollError::Cancelled);
    }

    if commit && next != cursor {
      self.save(&next).await?;
      debug!(cursor = ?next, "cursor advanced");
    }

    match self.config.max_items_to_poll {
      Some(max) if fresh.len() > max => {
        debug!(max, dropped = fresh.len() - max, "capping delivered items");
        fresh.truncate(max);
      }
      _ => {}
    }

    info!(fetched, new = fresh.len(), committed = commit, "poll_completed");
    Ok(fresh)
  }

  async fn fetch(
    &self,
    input: &PollInput,
    cursor: PollingCursor,
    cancel: &CancellationToken,
  ) -> Result<Vec<PolledItem>, PollError> {
    let ctx = PollContext {
      auth: input.auth.clone(),
      props_value: input.props_value.clone(),
      last_fetch_epoch_ms: cursor.last_fetch_epoch_ms,
      last_item_id: cursor.last_item_id,
      cancel: cancel.clone(),
    };

    let outcome = tokio::select! {
      _ = cancel.cancelled() => Err(PollError::Cancelled),
      outcome = with_timeout(self.config.timeout_ms, self.poller.items(ctx)) => outcome,
    };

    if let Err(e) = &outcome {
      error!(error = %e, "poll aborted");
    }
    outcome
  }

  async fn save(&self, cursor: &PollingCursor) -> Result<(), PollError> {
    let value = serde_json::to_value(cursor).map_err(KvError::from)?;
    self.store.put(CURSOR_KEY, value).await?;
    Ok(())
  }
}

async fn with_timeout<F>(timeout_ms: Option<u64>, request: F) -> Result<Vec<PolledItem>, PollError>
where
  F: Future<Output = Result<Vec<PolledItem>, FetchError>>,
{
  match timeout_ms {
    Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), request).await {
      Ok(result) => result.map_err(PollError::from),
      Err(_) => Err(PollError::TimedOut { timeout_ms: ms }),
    },
    None => request.await.map_err(PollError::from),
  }
}

/// Keep items strictly newer than the cursor. The next cursor is the newest
/// timestamp seen, and never less than the current one.
fn dedupe_timebased(cursor: &PollingCursor, items: Vec<PolledItem>) -> (Vec<Value>, PollingCursor) {
  let last = cursor.last_fetch_epoch_ms.unwrap_or(0);
  let mut newest = last;
  let mut fresh = Vec::new();

  for item in items {
    let Some(epoch) = item.epoch_milli_seconds else {
      warn!("polled item has no epochMilliSeconds, skipping");
      continue;
    };
    newest = newest.max(epoch);
    if epoch > last {
      fresh.push(item.data);
    }
  }

  (fresh, PollingCursor::timebased(newest))
}

/// Keep the items ahead of the last delivered id. Items come newest first;
/// when the last id is not in the batch every item is new. The next cursor
/// is the newest id.
fn dedupe_last_item(cursor: &PollingCursor, items: Vec<PolledItem>) -> (Vec<Value>, PollingCursor) {
  let last = cursor.last_item_id.as_ref();
  let mut newest: Option<Value> = None;
  let mut fresh = Vec::new();

  for item in items {
    let Some(id) = item.id else {
      warn!("polled item has no id, skipping");
      continue;
    };
    if newest.is_none() {
      newest = Some(id.clone());
    }
    if Some(&id) == last {
      break;
    }
    fresh.push(item.data);
  }

  let next = PollingCursor::last_item(newest.or_else(|| cursor.last_item_id.clone()));
  (fresh, next)
}
