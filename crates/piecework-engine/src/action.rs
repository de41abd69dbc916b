//! Action steps: render inputs, coerce them, fan out, dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use piecework_property::PropertySchema;
use piecework_variables::{Coercer, process_inputs, resolve_inputs, zip};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::dispatcher::{FlowDispatcher, FlowRun};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventNotifier, NoopNotifier};

/// An action step as declared in a flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
  pub name: String,
  /// Input templates keyed by property.
  #[serde(default)]
  pub inputs: HashMap<String, String>,
  #[serde(default)]
  pub props: PropertySchema,
  /// Zip array-valued inputs into one bag per index.
  #[serde(default)]
  pub expand_arrays: bool,
}

/// Turns upstream output into coerced property bags.
pub struct ActionRunner<N: EventNotifier = NoopNotifier> {
  coercer: Coercer,
  notifier: N,
}

impl ActionRunner {
  pub fn new(coercer: Coercer) -> Self {
    Self {
      coercer,
      notifier: NoopNotifier,
    }
  }
}

impl<N: EventNotifier> ActionRunner<N> {
  pub fn with_notifier<M: EventNotifier>(self, notifier: M) -> ActionRunner<M> {
    ActionRunner {
      coercer: self.coercer,
      notifier,
    }
  }

  /// Render, coerce, and optionally zip a step's inputs.
  ///
  /// Returns one bag, or one bag per zipped index when the step expands
  /// arrays.
  #[instrument(skip_all, fields(step = %step.name))]
  pub async fn prepare(
    &self,
    step: &ActionStep,
    upstream: &HashMap<String, Value>,
    cancel: &CancellationToken,
  ) -> Result<Vec<Value>, EngineError> {
    let result = self.prepare_inner(step, upstream, cancel).await;
    match &result {
      Ok(bags) => self.notifier.notify(EngineEvent::ActionExpanded {
        step: step.name.clone(),
        bags: bags.len(),
      }),
      Err(e) => self.notifier.notify(EngineEvent::ActionFailed {
        step: step.name.clone(),
        error: e.to_string(),
      }),
    }
    result
  }

  async fn prepare_inner(
    &self,
    step: &ActionStep,
    upstream: &HashMap<String, Value>,
    cancel: &CancellationToken,
  ) -> Result<Vec<Value>, EngineError> {
    let is_join = upstream.len() > 1;
    let rendered = resolve_inputs(&step.name, &step.inputs, upstream, is_join)?;
    let processed = process_inputs(&self.coercer, &step.props, &rendered, cancel).await?;

    let bags = if step.expand_arrays {
      match zip(Value::Object(processed)) {
        Value::Array(bags) => bags,
        other => vec![other],
      }
    } else {
      vec![Value::Object(processed)]
    };
    Ok(bags)
  }

  /// Prepare the step's bags and dispatch each as its own flow run.
  ///
  /// Stops at the first dispatch failure. Runs already dispatched stay
  /// dispatched.
  #[instrument(skip_all, fields(step = %step.name, flow_id = %flow_id))]
  pub async fn run(
    &self,
    flow_id: &str,
    step: &ActionStep,
    upstream: &HashMap<String, Value>,
    dispatcher: &Arc<dyn FlowDispatcher>,
    cancel: &CancellationToken,
  ) -> Result<Vec<String>, EngineError> {
    let bags = self.prepare(step, upstream, cancel).await?;

    let mut run_ids = Vec::with_capacity(bags.len());
    for bag in bags {
      let run = FlowRun::new(flow_id, bag);
      let run_id = run.run_id.clone();
      if let Err(e) = dispatcher.dispatch(run).await {
        error!(run_id = %run_id, error = %e, "dispatch failed");
        self.notifier.notify(EngineEvent::DispatchFailed {
          run_id,
          flow_id: flow_id.to_string(),
          error: e.to_string(),
        });
        return Err(e.into());
      }
      self.notifier.notify(EngineEvent::RunDispatched {
        run_id: run_id.clone(),
        flow_id: flow_id.to_string(),
      });
      run_ids.push(run_id);
    }

    info!(runs = run_ids.len(), "action_dispatched");
    Ok(run_ids)
  }
}
