use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::item::PolledItem;

/// Input handed to [`Poller::items`].
#[derive(Debug, Clone)]
pub struct PollContext {
  pub auth: Option<Value>,
  pub props_value: Map<String, Value>,
  /// Cursor of a time-based trigger (`None` on enable).
  pub last_fetch_epoch_ms: Option<i64>,
  /// Cursor of a last-item trigger (`None` on enable or after an empty feed).
  pub last_item_id: Option<Value>,
  pub cancel: CancellationToken,
}

/// Fetches the recent items of a polling trigger.
///
/// Last-item pollers must return items newest first.
#[async_trait]
pub trait Poller: Send + Sync {
  async fn items(&self, ctx: PollContext) -> Result<Vec<PolledItem>, FetchError>;
}

/// Adapts an async closure into a [`Poller`].
pub struct PollerFn<F>(pub F);

#[async_trait]
impl<F, Fut> Poller for PollerFn<F>
where
  F: Fn(PollContext) -> Fut + Send + Sync,
  Fut: Future<Output = Result<Vec<PolledItem>, FetchError>> + Send,
{
  async fn items(&self, ctx: PollContext) -> Result<Vec<PolledItem>, FetchError> {
    (self.0)(ctx).await
  }
}

pub fn poller_fn<F, Fut>(f: F) -> Arc<dyn Poller>
where
  F: Fn(PollContext) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Vec<PolledItem>, FetchError>> + Send + 'static,
{
  Arc::new(PollerFn(f))
}
