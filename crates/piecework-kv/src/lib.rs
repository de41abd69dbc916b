//! Piecework KV
//!
//! The key/value store collaborator used for per-trigger state such as
//! polling cursors. The store has no schema: values are JSON.
//!
//! [`ScopedKvStore`] prefixes every key with a scope (typically
//! `{flow_id}/{trigger_id}`) so one trigger instance never sees another's
//! entries.

mod memory;
mod scoped;

pub use memory::InMemoryKvStore;
pub use scoped::ScopedKvStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Error type for key/value store operations.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
  /// The backend could not be reached or rejected the operation.
  #[error("kv backend error: {message}")]
  Backend { message: String },

  /// A stored value could not be encoded or decoded.
  #[error("kv serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl KvError {
  pub fn backend(message: impl Into<String>) -> Self {
    Self::Backend {
      message: message.into(),
    }
  }
}

/// Key/value store trait.
#[async_trait]
pub trait KvStore: Send + Sync {
  /// Get a value by key. Missing keys return `None`.
  async fn get(&self, key: &str) -> Result<Option<Value>, KvError>;

  /// Store a value, replacing any previous one.
  async fn put(&self, key: &str, value: Value) -> Result<(), KvError>;

  /// Delete a value. Deleting a missing key is not an error.
  async fn delete(&self, key: &str) -> Result<(), KvError>;
}

#[async_trait]
impl<T: KvStore + ?Sized> KvStore for Arc<T> {
  async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
    (**self).get(key).await
  }

  async fn put(&self, key: &str, value: Value) -> Result<(), KvError> {
    (**self).put(key, value).await
  }

  async fn delete(&self, key: &str) -> Result<(), KvError> {
    (**self).delete(key).await
  }
}
