use crate::Result;
use async_trait::async_trait;
use semantica_core::Chunk;
use serde::{Deserialize, Serialize};

/// Options for a similarity search against one collection.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
  pub limit: usize,
  /// Hits scoring below this are dropped before returning.
  pub min_score: Option<f32>,
  /// Conjunctive equality filters on scalar metadata fields
  /// (e.g. `("language", "rust")`).
  pub filters: Vec<(String, String)>,
}

/// One search result: the stored chunk plus its cosine score in [0, 1].
#[derive(Debug, Clone)]
pub struct SearchHit {
  pub chunk: Chunk,
  pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
  pub name: String,
  pub row_count: usize,
  pub dimensions: usize,
}

/// A named-collection vector store.
///
/// Collections are created with a fixed dimension; changing embedding
/// dimensions requires dropping the collection. Re-inserting an id
/// replaces the existing row.
#[async_trait]
pub trait VectorStore: Send + Sync {
  /// Create a collection; fails with `CollectionExists` if present.
  /// After success the collection is ready for insert and search.
  async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

  async fn delete_collection(&self, name: &str) -> Result<()>;

  async fn collection_exists(&self, name: &str) -> Result<bool>;

  /// Insert embedded chunks; fails with `CollectionNotFound` if the
  /// collection is absent, `DimensionMismatch` if a vector does not
  /// match the collection. Data is flushed before returning.
  async fn insert(&self, name: &str, chunks: &[Chunk]) -> Result<usize>;

  /// Top-`limit` cosine similarity search, scores descending.
  /// `min_score` and metadata filters are applied before returning.
  async fn search(&self, name: &str, vector: &[f32], options: &SearchOptions) -> Result<Vec<SearchHit>>;

  async fn delete(&self, name: &str, ids: &[String]) -> Result<()>;

  /// Remove every chunk whose `file_path` metadata equals the given
  /// path. This is the incremental pipeline's cleanup primitive.
  async fn delete_by_file(&self, name: &str, file_path: &str) -> Result<()>;

  async fn stats(&self, name: &str) -> Result<CollectionStats>;

  async fn health_check(&self) -> bool;

  async fn close(&self);
}
