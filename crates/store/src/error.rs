use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("Collection not found: {0}")]
  CollectionNotFound(String),

  #[error("Collection already exists: {0}")]
  CollectionExists(String),

  #[error("Vector dimension mismatch: expected {expected}, got {got}")]
  DimensionMismatch { expected: usize, got: usize },

  #[error("Connection error: {0}")]
  Connection(String),

  #[error("LanceDB error: {0}")]
  Lance(#[from] lancedb::Error),

  #[error("Arrow error: {0}")]
  Arrow(#[from] arrow::error::ArrowError),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Malformed row: {0}")]
  MalformedRow(String),
}
