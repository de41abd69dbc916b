use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{KvError, KvStore};

/// A view of a store restricted to one scope.
///
/// Keys are stored as `{scope}/{key}` in the underlying store.
#[derive(Clone)]
pub struct ScopedKvStore {
  inner: Arc<dyn KvStore>,
  scope: String,
}

impl ScopedKvStore {
  pub fn new(inner: Arc<dyn KvStore>, scope: impl Into<String>) -> Self {
    Self {
      inner,
      scope: scope.into(),
    }
  }

  pub fn scope(&self) -> &str {
    &self.scope
  }

  fn scoped_key(&self, key: &str) -> String {
    format!("{}/{}", self.scope, key)
  }
}

#[async_trait]
impl KvStore for ScopedKvStore {
  async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
    self.inner.get(&self.scoped_key(key)).await
  }

  async fn put(&self, key: &str, value: Value) -> Result<(), KvError> {
    self.inner.put(&self.scoped_key(key), value).await
  }

  async fn delete(&self, key: &str) -> Result<(), KvError> {
    self.inner.delete(&self.scoped_key(key)).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::InMemoryKvStore;
  use serde_json::json;

  #[tokio::test]
  async fn test_scopes_are_isolated() {
    let backing: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
    let first = ScopedKvStore::new(backing.clone(), "flow-1/trigger");
    let second = ScopedKvStore::new(backing.clone(), "flow-2/trigger");

    first.put("cursor", json!(1000)).await.unwrap();

    assert_eq!(first.get("cursor").await.unwrap(), Some(json!(1000)));
    assert_eq!(second.get("cursor").await.unwrap(), None);
    assert_eq!(
      backing.get("flow-1/trigger/cursor").await.unwrap(),
      Some(json!(1000))
    );
  }
}
