use piecework_property::SchemaError;

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
  #[error(transparent)]
  Schema(#[from] SchemaError),

  #[error("resolution was cancelled")]
  Cancelled,
}
