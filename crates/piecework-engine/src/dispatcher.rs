//! The flow-run dispatcher collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One independent flow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRun {
  pub run_id: String,
  pub flow_id: String,
  pub payload: serde_json::Value,
}

impl FlowRun {
  /// A run with a fresh id.
  pub fn new(flow_id: impl Into<String>, payload: serde_json::Value) -> Self {
    Self {
      run_id: uuid::Uuid::new_v4().to_string(),
      flow_id: flow_id.into(),
      payload,
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
  #[error("dispatcher channel closed")]
  Closed,

  #[error("dispatcher rejected run: {message}")]
  Rejected { message: String },
}

/// Starts flow executions.
#[async_trait]
pub trait FlowDispatcher: Send + Sync {
  async fn dispatch(&self, run: FlowRun) -> Result<(), DispatchError>;
}

/// Dispatches runs into an mpsc channel consumed by an executor loop.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
  sender: mpsc::Sender<FlowRun>,
}

impl ChannelDispatcher {
  pub fn new(sender: mpsc::Sender<FlowRun>) -> Self {
    Self { sender }
  }

  /// Create a dispatcher and the receiving end of its channel.
  pub fn channel(buffer_size: usize) -> (Self, mpsc::Receiver<FlowRun>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (Self { sender }, receiver)
  }
}

#[async_trait]
impl FlowDispatcher for ChannelDispatcher {
  async fn dispatch(&self, run: FlowRun) -> Result<(), DispatchError> {
    self.sender.send(run).await.map_err(|_| DispatchError::Closed)
  }
}
