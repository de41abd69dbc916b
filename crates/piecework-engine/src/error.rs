use piecework_polling::PollError;
use piecework_variables::VariablesError;

use crate::dispatcher::DispatchError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  #[error("input resolution failed: {0}")]
  Inputs(#[from] VariablesError),

  #[error("polling failed: {0}")]
  Poll(#[from] PollError),

  #[error("dispatch failed: {0}")]
  Dispatch(#[from] DispatchError),
}
