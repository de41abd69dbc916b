use piecework_kv::KvError;

/// Error returned by a [`Poller`](crate::Poller) when its fetch fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
  pub message: String,
}

impl FetchError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Errors that abort a polling cycle. The cursor is never advanced when one
/// of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
  #[error("fetching items failed: {0}")]
  Fetch(#[from] FetchError),

  #[error("cursor store failed: {0}")]
  Store(#[from] KvError),

  #[error("stored cursor is unreadable: {message}")]
  CorruptCursor { message: String },

  #[error("poll was cancelled")]
  Cancelled,

  #[error("poll timed out after {timeout_ms}ms")]
  TimedOut { timeout_ms: u64 },
}
