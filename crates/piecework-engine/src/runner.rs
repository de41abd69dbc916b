//! Interval loop driving a polling trigger.
//!
//! Each tick runs the trigger once and dispatches every new item as its own
//! flow run. A failed cycle leaves the cursor untouched and is retried on
//! the next tick.

use std::sync::Arc;
use std::time::Duration;

use piecework_polling::{PollInput, PollingTrigger};
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::dispatcher::{FlowDispatcher, FlowRun};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventNotifier, NoopNotifier};

/// Default poll interval: five minutes.
const DEFAULT_INTERVAL_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PollingRunnerConfig {
  pub interval_ms: u64,
}

impl Default for PollingRunnerConfig {
  fn default() -> Self {
    Self {
      interval_ms: DEFAULT_INTERVAL_MS,
    }
  }
}

/// Polls one trigger instance on an interval.
///
/// # Usage
///
/// ```ignore
/// let runner = PollingRunner::new("flow-1", trigger, input, dispatcher);
///
/// let cancel = CancellationToken::new();
/// tokio::spawn(runner.start(cancel.clone()));
/// ```
pub struct PollingRunner<N: EventNotifier = NoopNotifier> {
  flow_id: String,
  trigger: Arc<PollingTrigger>,
  input: PollInput,
  dispatcher: Arc<dyn FlowDispatcher>,
  config: PollingRunnerConfig,
  notifier: N,
}

impl PollingRunner {
  pub fn new(
    flow_id: impl Into<String>,
    trigger: Arc<PollingTrigger>,
    input: PollInput,
    dispatcher: Arc<dyn FlowDispatcher>,
  ) -> Self {
    Self {
      flow_id: flow_id.into(),
      trigger,
      input,
      dispatcher,
      config: PollingRunnerConfig::default(),
      notifier: NoopNotifier,
    }
  }
}

impl<N: EventNotifier> PollingRunner<N> {
  pub fn with_config(mut self, config: PollingRunnerConfig) -> Self {
    self.config = config;
    self
  }

  pub fn with_notifier<M: EventNotifier>(self, notifier: M) -> PollingRunner<M> {
    PollingRunner {
      flow_id: self.flow_id,
      trigger: self.trigger,
      input: self.input,
      dispatcher: self.dispatcher,
      config: self.config,
      notifier,
    }
  }

  pub fn trigger(&self) -> &PollingTrigger {
    &self.trigger
  }

  /// Run one poll cycle and dispatch the new items.
  ///
  /// Returns the number of runs dispatched. Items are already committed to
  /// the cursor when they are dispatched, so a rejected dispatch is logged
  /// and the remaining items are still sent.
  pub async fn tick(&self, cancel: &CancellationToken) -> Result<usize, EngineError> {
    let trigger_id = self.trigger.trigger_id().to_string();

    let items = match self.trigger.run(&self.input, cancel).await {
      Ok(items) => items,
      Err(e) => {
        self.notifier.notify(EngineEvent::PollFailed {
          trigger_id,
          error: e.to_string(),
        });
        return Err(e.into());
      }
    };

    let mut dispatched = 0;
    for item in items.iter().cloned() {
      let run = FlowRun::new(&self.flow_id, item);
      let run_id = run.run_id.clone();
      match self.dispatcher.dispatch(run).await {
        Ok(()) => {
          dispatched += 1;
          self.notifier.notify(EngineEvent::RunDispatched {
            run_id,
            flow_id: self.flow_id.clone(),
          });
        }
        Err(e) => {
          error!(
              trigger_id = %trigger_id,
              run_id = %run_id,
              error = %e,
              "dispatch failed"
          );
          self.notifier.notify(EngineEvent::DispatchFailed {
            run_id,
            flow_id: self.flow_id.clone(),
            error: e.to_string(),
          });
        }
      }
    }

    self.notifier.notify(EngineEvent::PollCompleted {
      trigger_id,
      delivered: items.len(),
    });
    Ok(dispatched)
  }

  /// Start the polling loop.
  ///
  /// The first cycle runs immediately. Blocks until the cancellation token
  /// is triggered.
  pub async fn start(self, cancel: CancellationToken) {
    info!(
        flow_id = %self.flow_id,
        trigger_id = %self.trigger.trigger_id(),
        interval_ms = self.config.interval_ms,
        "starting polling runner"
    );

    let mut interval = tokio::time::interval(Duration::from_millis(self.config.interval_ms.max(1)));
    // One cycle at a time; ticks missed during a slow cycle are dropped.
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
      tokio::select! {
          _ = cancel.cancelled() => {
              info!(
                  trigger_id = %self.trigger.trigger_id(),
                  "polling runner cancelled"
              );
              break;
          }
          _ = interval.tick() => {
              match self.tick(&cancel.child_token()).await {
                  Ok(dispatched) => {
                      info!(
                          trigger_id = %self.trigger.trigger_id(),
                          dispatched,
                          "poll cycle dispatched"
                      );
                  }
                  Err(e) => {
                      warn!(
                          trigger_id = %self.trigger.trigger_id(),
                          error = %e,
                          "poll cycle failed, retrying on next tick"
                      );
                  }
              }
          }
      }
    }
  }
}
