use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{KvError, KvStore};

/// In-memory KV store implementation.
///
/// Suitable for a single process or testing. State is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
  data: RwLock<HashMap<String, Value>>,
}

impl InMemoryKvStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of stored entries.
  pub async fn len(&self) -> usize {
    self.data.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.data.read().await.is_empty()
  }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
  async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
    Ok(self.data.read().await.get(key).cloned())
  }

  async fn put(&self, key: &str, value: Value) -> Result<(), KvError> {
    self.data.write().await.insert(key.to_string(), value);
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<(), KvError> {
    self.data.write().await.remove(key);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn test_put_get_delete() {
    let store = InMemoryKvStore::new();

    assert_eq!(store.get("cursor").await.unwrap(), None);

    store.put("cursor", json!({ "lastItemId": "42" })).await.unwrap();
    assert_eq!(
      store.get("cursor").await.unwrap(),
      Some(json!({ "lastItemId": "42" }))
    );

    store.delete("cursor").await.unwrap();
    assert_eq!(store.get("cursor").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_delete_missing_key_is_ok() {
    let store = InMemoryKvStore::new();
    store.delete("never-written").await.unwrap();
    assert!(store.is_empty().await);
  }

  #[tokio::test]
  async fn test_put_overwrites() {
    let store = InMemoryKvStore::new();
    store.put("k", json!(1)).await.unwrap();
    store.put("k", json!(2)).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
    assert_eq!(store.len().await, 1);
  }
}
