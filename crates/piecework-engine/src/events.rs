//! Engine events and notifiers for observability.
//!
//! Events are emitted while actions fan out and polling triggers run, so
//! consumers can persist state, stream progress to a UI, and so on.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
  /// An action's inputs resolved into one or more property bags.
  ActionExpanded { step: String, bags: usize },

  /// An action's inputs could not be resolved.
  ActionFailed { step: String, error: String },

  /// A flow run was handed to the dispatcher.
  RunDispatched { run_id: String, flow_id: String },

  /// The dispatcher rejected a flow run.
  DispatchFailed {
    run_id: String,
    flow_id: String,
    error: String,
  },

  /// A polling cycle finished.
  PollCompleted { trigger_id: String, delivered: usize },

  /// A polling cycle aborted. The cursor was left untouched.
  PollFailed { trigger_id: String, error: String },
}

/// Receives engine events.
///
/// The engine calls `notify` for each event; implementations decide what to
/// do with them.
pub trait EventNotifier: Send + Sync {
  fn notify(&self, event: EngineEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl EventNotifier for NoopNotifier {
  fn notify(&self, _event: EngineEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a poll cycle. Volume is a few
  // events per cycle.
  sender: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<EngineEvent>) -> Self {
    Self { sender }
  }
}

impl EventNotifier for ChannelNotifier {
  fn notify(&self, event: EngineEvent) {
    // The receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
