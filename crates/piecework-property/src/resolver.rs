//! Async callbacks that dependent properties use to load their choices.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::dropdown::DropdownState;
use crate::schema::PropertySchema;

/// Error returned by a resolver callback.
///
/// Resolver failures are local: the dependency resolver turns them into a
/// disabled dropdown rather than failing the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
  /// The remote fetch failed.
  #[error("resolver failed: {message}")]
  Failed { message: String },

  /// The credentials were rejected by the remote service.
  #[error("unauthorized: {message}")]
  Unauthorized { message: String },

  /// The call was superseded or cancelled by the caller.
  #[error("resolver cancelled")]
  Cancelled,
}

impl ResolverError {
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }

  pub fn unauthorized(message: impl Into<String>) -> Self {
    Self::Unauthorized {
      message: message.into(),
    }
  }
}

/// Input handed to a resolver callback.
///
/// `values` holds exactly the keys listed in the property's `refreshers`
/// (except `auth`, which is passed separately).
#[derive(Debug, Clone)]
pub struct ResolveContext {
  pub auth: Option<Value>,
  pub values: Map<String, Value>,
  pub cancel: CancellationToken,
}

impl ResolveContext {
  pub fn new(auth: Option<Value>, values: Map<String, Value>) -> Self {
    Self {
      auth,
      values,
      cancel: CancellationToken::new(),
    }
  }

  /// Get an upstream value by key.
  pub fn value(&self, key: &str) -> Option<&Value> {
    self.values.get(key)
  }

  /// Get an upstream value as a string slice.
  pub fn str_value(&self, key: &str) -> Option<&str> {
    self.values.get(key).and_then(|v| v.as_str())
  }
}

/// Loads the options of a `Dropdown` or `MultiSelectDropdown`.
#[async_trait]
pub trait OptionsResolver: Send + Sync {
  async fn options(&self, ctx: ResolveContext) -> Result<DropdownState, ResolverError>;
}

/// Loads the nested schema of a `DynamicProperties` field.
#[async_trait]
pub trait PropsResolver: Send + Sync {
  async fn props(&self, ctx: ResolveContext) -> Result<PropertySchema, ResolverError>;
}

/// Adapts an async closure into an [`OptionsResolver`].
pub struct OptionsFn<F>(pub F);

#[async_trait]
impl<F, Fut> OptionsResolver for OptionsFn<F>
where
  F: Fn(ResolveContext) -> Fut + Send + Sync,
  Fut: Future<Output = Result<DropdownState, ResolverError>> + Send,
{
  async fn options(&self, ctx: ResolveContext) -> Result<DropdownState, ResolverError> {
    (self.0)(ctx).await
  }
}

/// Adapts an async closure into a [`PropsResolver`].
pub struct PropsFn<F>(pub F);

#[async_trait]
impl<F, Fut> PropsResolver for PropsFn<F>
where
  F: Fn(ResolveContext) -> Fut + Send + Sync,
  Fut: Future<Output = Result<PropertySchema, ResolverError>> + Send,
{
  async fn props(&self, ctx: ResolveContext) -> Result<PropertySchema, ResolverError> {
    (self.0)(ctx).await
  }
}

/// Wrap an async closure as a shared options resolver.
pub fn options_fn<F, Fut>(f: F) -> Arc<dyn OptionsResolver>
where
  F: Fn(ResolveContext) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<DropdownState, ResolverError>> + Send + 'static,
{
  Arc::new(OptionsFn(f))
}

/// Wrap an async closure as a shared props resolver.
pub fn props_fn<F, Fut>(f: F) -> Arc<dyn PropsResolver>
where
  F: Fn(ResolveContext) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<PropertySchema, ResolverError>> + Send + 'static,
{
  Arc::new(PropsFn(f))
}
