//! Full indexing pipeline: discovery → parsing → embedding → storing.
//!
//! Discovery and parsing run on a single task so chunk ids stay
//! deterministic. Embedding fans out in fixed-size batches with a
//! bounded number in flight. Storing runs sequentially in batches of
//! 100. Per-file and per-batch failures are collected, never fatal;
//! auth and missing-model failures abort the run.

use crate::ledger::{ChangeLedger, LedgerError};
use crate::lock::{LockError, LockGuard};
use crate::scanner::{FileRecord, ScanError, Scanner};
use crate::{COLLECTION, Chunker, ChunkerConfig};
use embedding::{EmbeddingError, EmbeddingProvider};
use parser::CodeParser;
use semantica_core::{Chunk, Config};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use store::{StoreError, VectorStore};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Rows per insert into the vector store
const STORE_BATCH_SIZE: usize = 100;

/// Embedding success rate at or above which a run counts as successful
const SUCCESS_THRESHOLD: f64 = 0.80;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
  #[error("Scan error: {0}")]
  Scan(#[from] ScanError),
  #[error("Ledger error: {0}")]
  Ledger(#[from] LedgerError),
  #[error("Lock error: {0}")]
  Lock(#[from] LockError),
  #[error("Embedding error: {0}")]
  Embedding(#[from] EmbeddingError),
  #[error("Store error: {0}")]
  Store(#[from] StoreError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
  Discovery,
  Parsing,
  Embedding,
  Storing,
}

impl Phase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::Discovery => "discovery",
      Phase::Parsing => "parsing",
      Phase::Embedding => "embedding",
      Phase::Storing => "storing",
    }
  }
}

impl std::fmt::Display for Phase {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// One progress event
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
  pub phase: Phase,
  pub current: usize,
  pub total: usize,
}

pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

/// A collected, non-fatal failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexErrorEntry {
  pub key: String,
  pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingResult {
  pub total_files: usize,
  pub total_chunks: usize,
  pub embedded_chunks: usize,
  pub stored_chunks: usize,
  pub success: bool,
  pub errors: Vec<IndexErrorEntry>,
  pub elapsed_ms: u64,
}

impl IndexingResult {
  pub fn embed_rate(&self) -> f64 {
    if self.total_chunks == 0 {
      1.0
    } else {
      self.embedded_chunks as f64 / self.total_chunks as f64
    }
  }

  /// User-facing completion summary
  pub fn completion_message(&self) -> String {
    let rate = self.embed_rate();
    if rate >= 1.0 {
      format!(
        "Indexing complete: {} chunks from {} files",
        self.embedded_chunks, self.total_files
      )
    } else if rate >= 0.95 {
      format!(
        "Indexing complete with minor gaps: {}/{} chunks embedded ({} errors)",
        self.embedded_chunks,
        self.total_chunks,
        self.errors.len()
      )
    } else if rate >= SUCCESS_THRESHOLD {
      format!(
        "Partial index built: {}/{} chunks embedded ({} errors); results remain searchable",
        self.embedded_chunks,
        self.total_chunks,
        self.errors.len()
      )
    } else {
      format!(
        "Indexing failed: only {}/{} chunks embedded ({} errors)",
        self.embedded_chunks,
        self.total_chunks,
        self.errors.len()
      )
    }
  }
}

/// Orchestrates scanning, chunking, embedding, and storage for one
/// project. Holds the configured collaborators; concrete provider and
/// store variants are resolved by the caller at config time.
pub struct Indexer {
  project_root: PathBuf,
  config: Config,
  provider: Arc<dyn EmbeddingProvider>,
  store: Arc<dyn VectorStore>,
}

impl Indexer {
  pub fn new(
    project_root: PathBuf,
    config: Config,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
  ) -> Self {
    Self {
      project_root,
      config,
      provider,
      store,
    }
  }

  pub fn project_root(&self) -> &PathBuf {
    &self.project_root
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn store(&self) -> &Arc<dyn VectorStore> {
    &self.store
  }

  pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
    &self.provider
  }

  /// Run the full pipeline. The provider is closed on every exit path.
  pub async fn index_codebase(&self, on_progress: Option<ProgressFn>) -> Result<IndexingResult, IndexError> {
    let lock = LockGuard::acquire(&self.project_root, "index")?;
    let result = self.run_full(on_progress).await;
    self.provider.close().await;
    lock.release()?;
    result
  }

  async fn run_full(&self, on_progress: Option<ProgressFn>) -> Result<IndexingResult, IndexError> {
    let started = Instant::now();
    let progress = progress_fn(on_progress);

    // Phase 1: discovery
    let scanner = Scanner::new(&self.project_root, &self.config.indexing)?;
    let files = scanner.scan();
    progress(Progress {
      phase: Phase::Discovery,
      current: files.len(),
      total: files.len(),
    });
    info!(files = files.len(), root = %self.project_root.display(), "Discovery complete");

    // Phase 2: parsing (single task; deterministic chunk order)
    let (chunks, mut errors) = self.parse_and_chunk(&files, &progress).await;
    let total_chunks = chunks.len();

    // Phase 3: embedding (bounded fan-out)
    let (chunks, embed_errors) = self.embed_chunks(chunks, &progress).await?;
    errors.extend(embed_errors);

    let embedded: Vec<Chunk> = chunks.into_iter().filter(|c| c.embedding.is_some()).collect();
    let embedded_count = embedded.len();

    // Phase 4: storing
    let stored_chunks = self.store_chunks(&embedded, &progress, &mut errors).await?;

    let success = total_chunks == 0 || (embedded_count as f64 / total_chunks as f64) >= SUCCESS_THRESHOLD;

    if success {
      ChangeLedger::for_project(&self.project_root).commit(&files)?;
    }

    let result = IndexingResult {
      total_files: files.len(),
      total_chunks,
      embedded_chunks: embedded_count,
      stored_chunks,
      success,
      errors,
      elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
      files = result.total_files,
      chunks = result.total_chunks,
      embedded = result.embedded_chunks,
      success = result.success,
      "Indexing finished"
    );
    Ok(result)
  }

  /// Read, parse, and chunk each file in order. Per-file failures are
  /// recorded under the relative path and never abort the run.
  pub(crate) async fn parse_and_chunk(
    &self,
    files: &[FileRecord],
    progress: &ProgressFn,
  ) -> (Vec<Chunk>, Vec<IndexErrorEntry>) {
    let chunker = Chunker::new(ChunkerConfig {
      max_tokens: self.config.indexing.max_tokens as u32,
      min_tokens: self.config.indexing.min_tokens as u32,
      merge_siblings: self.config.indexing.merge_siblings,
    });
    let mut code_parser = CodeParser::new();

    let mut chunks = Vec::new();
    let mut errors = Vec::new();

    for (i, file) in files.iter().enumerate() {
      match tokio::fs::read_to_string(&file.absolute_path).await {
        Ok(content) => match code_parser.parse(&content, file.language) {
          Ok(tree) => {
            let imports = code_parser.extract_imports(&content, file.language).unwrap_or_default();
            chunks.extend(chunker.chunk(&tree, file, &imports));
          }
          Err(e) => {
            warn!(file = %file.relative_path, error = %e, "Parse failed");
            errors.push(IndexErrorEntry {
              key: file.relative_path.clone(),
              message: e.to_string(),
            });
          }
        },
        Err(e) => {
          warn!(file = %file.relative_path, error = %e, "Read failed");
          errors.push(IndexErrorEntry {
            key: file.relative_path.clone(),
            message: e.to_string(),
          });
        }
      }

      progress(Progress {
        phase: Phase::Parsing,
        current: i + 1,
        total: files.len(),
      });
    }

    debug!(chunks = chunks.len(), errors = errors.len(), "Parsing complete");
    (chunks, errors)
  }

  /// Embed chunks in fixed-size batches, at most `concurrency` batches
  /// in flight. Vectors attach to chunks by position within the batch.
  /// Batch failures become `batch-<startIndex>` entries; fatal provider
  /// errors abort.
  pub(crate) async fn embed_chunks(
    &self,
    mut chunks: Vec<Chunk>,
    progress: &ProgressFn,
  ) -> Result<(Vec<Chunk>, Vec<IndexErrorEntry>), IndexError> {
    let total = chunks.len();
    if total == 0 {
      return Ok((chunks, Vec::new()));
    }

    let batch_size = self.config.embedding.batch_size.max(1);
    let concurrency = self.config.embedding.concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks: JoinSet<(usize, usize, Result<Vec<Vec<f32>>, EmbeddingError>)> = JoinSet::new();

    for start in (0..total).step_by(batch_size) {
      let end = (start + batch_size).min(total);
      let texts: Vec<String> = chunks[start..end].iter().map(|c| c.content.clone()).collect();
      let provider = self.provider.clone();
      let permit_source = semaphore.clone();

      tasks.spawn(async move {
        let _permit = match permit_source.acquire().await {
          Ok(permit) => permit,
          Err(_) => {
            return (
              start,
              texts.len(),
              Err(EmbeddingError::Provider("batch limiter closed".into())),
            );
          }
        };
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let result = provider.embed_batch(&refs).await;
        (start, texts.len(), result)
      });
    }

    let mut errors = Vec::new();
    let mut fatal: Option<EmbeddingError> = None;
    let mut completed_batches = 0usize;

    while let Some(joined) = tasks.join_next().await {
      let (start, len, result) = match joined {
        Ok(output) => output,
        Err(e) => {
          errors.push(IndexErrorEntry {
            key: "batch-task".to_string(),
            message: format!("batch task panicked: {}", e),
          });
          continue;
        }
      };

      completed_batches += 1;
      progress(Progress {
        phase: Phase::Embedding,
        current: (completed_batches * batch_size).min(total),
        total,
      });

      match result {
        Ok(vectors) => {
          for (offset, vector) in vectors.into_iter().enumerate() {
            if let Some(chunk) = chunks.get_mut(start + offset) {
              chunk.embedding = Some(vector);
            }
          }
        }
        Err(e) if e.is_fatal() => {
          warn!(start, error = %e, "Fatal embedding failure");
          if fatal.is_none() {
            fatal = Some(e);
          }
        }
        Err(e) => {
          warn!(start, len, error = %e, "Embedding batch failed");
          errors.push(IndexErrorEntry {
            key: format!("batch-{}", start),
            message: e.to_string(),
          });
        }
      }
    }

    if let Some(e) = fatal {
      return Err(IndexError::Embedding(e));
    }

    Ok((chunks, errors))
  }

  /// Insert embedded chunks in store-batches, creating the collection
  /// on first need with the provider's dimensions.
  pub(crate) async fn store_chunks(
    &self,
    chunks: &[Chunk],
    progress: &ProgressFn,
    errors: &mut Vec<IndexErrorEntry>,
  ) -> Result<usize, IndexError> {
    if chunks.is_empty() {
      return Ok(0);
    }

    self.ensure_collection().await?;

    let mut stored = 0usize;
    for (batch_idx, batch) in chunks.chunks(STORE_BATCH_SIZE).enumerate() {
      let start = batch_idx * STORE_BATCH_SIZE;
      match self.store.insert(COLLECTION, batch).await {
        Ok(count) => stored += count,
        Err(e @ StoreError::Connection(_)) => return Err(IndexError::Store(e)),
        Err(e) => {
          warn!(start, error = %e, "Store batch failed");
          errors.push(IndexErrorEntry {
            key: format!("store-{}", start),
            message: e.to_string(),
          });
        }
      }

      progress(Progress {
        phase: Phase::Storing,
        current: (start + batch.len()).min(chunks.len()),
        total: chunks.len(),
      });
    }

    Ok(stored)
  }

  /// Create the chunk collection if it does not exist yet
  pub(crate) async fn ensure_collection(&self) -> Result<(), IndexError> {
    if !self.store.collection_exists(COLLECTION).await? {
      self.store.create_collection(COLLECTION, self.provider.dimensions()).await?;
    }
    Ok(())
  }
}

pub(crate) fn progress_fn(on_progress: Option<ProgressFn>) -> ProgressFn {
  on_progress.unwrap_or_else(|| Arc::new(|_| {}))
}
