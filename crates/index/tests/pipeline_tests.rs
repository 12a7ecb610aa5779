//! End-to-end pipeline tests against a real on-disk vector store and a
//! deterministic in-process embedding provider.

use async_trait::async_trait;
use embedding::{EmbeddingError, EmbeddingProvider, ResilientProvider, RetryConfig};
use index::{COLLECTION, Indexer, IndexError, reindex_changed_files};
use semantica_core::{Config, semantica_dir};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use store::{LanceStore, SearchOptions, VectorStore};
use tempfile::TempDir;

const DIMS: usize = 4;

/// Deterministic provider: the vector is a hash of the text, so equal
/// content always embeds identically.
struct MockProvider {
  calls: AtomicU32,
  fail_first_with: Option<fn() -> EmbeddingError>,
  delay: Option<Duration>,
}

impl MockProvider {
  fn ok() -> Self {
    Self {
      calls: AtomicU32::new(0),
      fail_first_with: None,
      delay: None,
    }
  }

  fn rate_limited_once() -> Self {
    Self {
      fail_first_with: Some(|| EmbeddingError::RateLimited("429".into())),
      ..Self::ok()
    }
  }

  fn slow() -> Self {
    Self {
      delay: Some(Duration::from_millis(300)),
      ..Self::ok()
    }
  }

  fn vector_for(text: &str) -> Vec<f32> {
    let mut seed = 0u64;
    for b in text.bytes() {
      seed = seed.wrapping_mul(31).wrapping_add(b as u64);
    }
    let mut v: Vec<f32> = (0..DIMS).map(|i| ((seed >> (i * 8)) & 0xff) as f32 / 255.0 + 0.01).collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter_mut().for_each(|x| *x /= norm);
    v
  }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
  fn name(&self) -> &str {
    "mock"
  }
  fn model_id(&self) -> &str {
    "mock-model"
  }
  fn dimensions(&self) -> usize {
    DIMS
  }
  fn max_tokens(&self) -> usize {
    8192
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    Ok(Self::vector_for(text))
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    let call = self.calls.fetch_add(1, Ordering::SeqCst);
    if call == 0
      && let Some(make_error) = self.fail_first_with
    {
      return Err(make_error());
    }
    Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
  }

  async fn health_check(&self) -> bool {
    true
  }

  fn estimate_cost(&self, _tokens: u64) -> f64 {
    0.0
  }
}

struct AuthFailProvider;

#[async_trait]
impl EmbeddingProvider for AuthFailProvider {
  fn name(&self) -> &str {
    "mock"
  }
  fn model_id(&self) -> &str {
    "mock-model"
  }
  fn dimensions(&self) -> usize {
    DIMS
  }
  fn max_tokens(&self) -> usize {
    8192
  }

  async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
    Err(EmbeddingError::Auth("invalid api key".into()))
  }

  async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    Err(EmbeddingError::Auth("invalid api key".into()))
  }

  async fn health_check(&self) -> bool {
    false
  }

  fn estimate_cost(&self, _tokens: u64) -> f64 {
    0.0
  }
}

async fn indexer_for(project: &Path, provider: Arc<dyn EmbeddingProvider>) -> Indexer {
  let store = LanceStore::connect(&semantica_dir(project).join("lancedb")).await.unwrap();
  let mut config = Config::default();
  config.embedding.dimensions = DIMS;
  config.embedding.batch_size = 8;
  config.embedding.concurrency = 2;
  Indexer::new(project.to_path_buf(), config, provider, Arc::new(store))
}

fn write_sample(project: &Path) {
  std::fs::write(
    project.join("lib.rs"),
    r#"
pub fn authenticate(user: &str) -> bool {
    !user.is_empty()
}

pub fn configure(key: &str, value: &str) -> String {
    format!("{}={}", key, value)
}
"#,
  )
  .unwrap();
}

async fn rows_for_file(indexer: &Indexer, file: &str) -> usize {
  // Probe by filtered search; the filter is conjunctive equality on
  // file_path, so this returns only that file's rows.
  let options = SearchOptions {
    limit: 100,
    min_score: None,
    filters: vec![("file_path".to_string(), file.to_string())],
  };
  indexer
    .store()
    .search(COLLECTION, &MockProvider::vector_for("probe"), &options)
    .await
    .unwrap()
    .len()
}

#[tokio::test]
async fn test_empty_project_succeeds_vacuously() {
  let dir = TempDir::new().unwrap();
  let indexer = indexer_for(dir.path(), Arc::new(MockProvider::ok())).await;

  let result = indexer.index_codebase(None).await.unwrap();

  assert!(result.success);
  assert_eq!(result.total_files, 0);
  assert_eq!(result.total_chunks, 0);
  // No chunks means the collection was never created
  assert!(!indexer.store().collection_exists(COLLECTION).await.unwrap());
}

#[tokio::test]
async fn test_single_file_full_index() {
  let dir = TempDir::new().unwrap();
  write_sample(dir.path());

  let indexer = indexer_for(dir.path(), Arc::new(MockProvider::ok())).await;
  let result = indexer.index_codebase(None).await.unwrap();

  assert!(result.success);
  assert_eq!(result.total_files, 1);
  assert!(result.total_chunks > 0);
  assert_eq!(result.embedded_chunks, result.total_chunks);
  assert_eq!(result.stored_chunks, result.total_chunks);
  assert!(result.errors.is_empty());

  let stats = indexer.store().stats(COLLECTION).await.unwrap();
  assert_eq!(stats.row_count, result.total_chunks);
  assert_eq!(stats.dimensions, DIMS);
}

#[tokio::test]
async fn test_incremental_modify_replaces_rows() {
  let dir = TempDir::new().unwrap();
  write_sample(dir.path());

  let indexer = indexer_for(dir.path(), Arc::new(MockProvider::ok())).await;
  indexer.index_codebase(None).await.unwrap();
  let before = rows_for_file(&indexer, "lib.rs").await;
  assert!(before > 0);

  // Unchanged project: the diff is empty and nothing reprocesses
  let noop = reindex_changed_files(&indexer, None, false, None).await.unwrap();
  assert!(noop.is_noop());

  // Edit the file; the ledger reports it modified and rows are replaced
  std::fs::write(
    dir.path().join("lib.rs"),
    "pub fn authenticate(user: &str) -> bool {\n    user.len() > 1\n}\n",
  )
  .unwrap();

  let result = reindex_changed_files(&indexer, None, false, None).await.unwrap();
  assert_eq!(result.modified, vec!["lib.rs".to_string()]);
  assert!(result.added.is_empty());
  assert!(result.deleted.is_empty());
  assert!(result.success);

  let after = rows_for_file(&indexer, "lib.rs").await;
  assert_eq!(after, result.stored_chunks);

  // Committed ledger: a second run is a no-op again
  let noop = reindex_changed_files(&indexer, None, false, None).await.unwrap();
  assert!(noop.is_noop());
}

#[tokio::test]
async fn test_incremental_delete_removes_rows() {
  let dir = TempDir::new().unwrap();
  write_sample(dir.path());
  std::fs::write(dir.path().join("other.rs"), "pub fn keep() {}\n").unwrap();

  let indexer = indexer_for(dir.path(), Arc::new(MockProvider::ok())).await;
  indexer.index_codebase(None).await.unwrap();
  assert!(rows_for_file(&indexer, "lib.rs").await > 0);

  std::fs::remove_file(dir.path().join("lib.rs")).unwrap();

  let result = reindex_changed_files(&indexer, None, false, None).await.unwrap();
  assert_eq!(result.deleted, vec!["lib.rs".to_string()]);

  assert_eq!(rows_for_file(&indexer, "lib.rs").await, 0);
  assert!(rows_for_file(&indexer, "other.rs").await > 0);
}

#[tokio::test]
async fn test_specific_files_treated_as_modified() {
  let dir = TempDir::new().unwrap();
  write_sample(dir.path());

  let indexer = indexer_for(dir.path(), Arc::new(MockProvider::ok())).await;
  indexer.index_codebase(None).await.unwrap();

  let files = vec!["lib.rs".to_string()];
  let result = reindex_changed_files(&indexer, Some(&files), false, None).await.unwrap();
  assert_eq!(result.modified, vec!["lib.rs".to_string()]);
  assert!(result.success);
}

#[tokio::test]
async fn test_rate_limited_batch_retries_to_success() {
  let dir = TempDir::new().unwrap();
  write_sample(dir.path());

  // One 429 on the first batch attempt; the retry wrapper recovers and
  // the error list stays empty.
  let provider = ResilientProvider::with_config(
    MockProvider::rate_limited_once(),
    RetryConfig {
      initial_backoff: Duration::from_millis(1),
      max_backoff: Duration::from_millis(4),
      ..Default::default()
    },
  );
  let indexer = indexer_for(dir.path(), Arc::new(provider)).await;

  let result = indexer.index_codebase(None).await.unwrap();
  assert!(result.success);
  assert!(result.errors.is_empty());
  assert_eq!(result.embedded_chunks, result.total_chunks);
}

#[tokio::test]
async fn test_auth_failure_aborts_without_collection() {
  let dir = TempDir::new().unwrap();
  write_sample(dir.path());

  let indexer = indexer_for(dir.path(), Arc::new(AuthFailProvider)).await;
  let result = indexer.index_codebase(None).await;

  assert!(matches!(
    result,
    Err(IndexError::Embedding(EmbeddingError::Auth(_)))
  ));
  // Fresh project: the abort happened before the collection existed
  assert!(!indexer.store().collection_exists(COLLECTION).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_runs_one_wins_one_busy() {
  let dir = TempDir::new().unwrap();
  write_sample(dir.path());

  let first = indexer_for(dir.path(), Arc::new(MockProvider::slow())).await;
  let second = indexer_for(dir.path(), Arc::new(MockProvider::slow())).await;

  let a = tokio::spawn(async move { first.index_codebase(None).await });
  tokio::time::sleep(Duration::from_millis(100)).await;
  let b = tokio::spawn(async move { second.index_codebase(None).await });

  let results = [a.await.unwrap(), b.await.unwrap()];
  let ok_count = results.iter().filter(|r| r.is_ok()).count();
  let busy_count = results
    .iter()
    .filter(|r| matches!(r, Err(IndexError::Lock(index::LockError::Busy { .. }))))
    .count();

  assert_eq!(ok_count, 1);
  assert_eq!(busy_count, 1);
}

#[tokio::test]
async fn test_chunk_ids_stable_across_full_runs() {
  let dir = TempDir::new().unwrap();
  write_sample(dir.path());

  let indexer = indexer_for(dir.path(), Arc::new(MockProvider::ok())).await;
  let first = indexer.index_codebase(None).await.unwrap();
  // Second run re-inserts the same ids; row count must not grow
  let second = indexer.index_codebase(None).await.unwrap();

  assert_eq!(first.total_chunks, second.total_chunks);
  let stats = indexer.store().stats(COLLECTION).await.unwrap();
  assert_eq!(stats.row_count, first.total_chunks);
}
