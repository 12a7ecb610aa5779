//! Incremental pipeline: re-index only what the change ledger (or an
//! explicit file list) says moved, deleting obsolete vectors first.
//!
//! The ledger commits only after a completed run, so a crash mid-run
//! leaves the previous snapshot in place and the next run recomputes
//! the same diff - re-processing is idempotent.

use crate::ledger::ChangeLedger;
use crate::lock::{LockError, LockGuard};
use crate::pipeline::{IndexError, IndexErrorEntry, Indexer, Phase, Progress, ProgressFn, progress_fn};
use crate::scanner::{FileRecord, Scanner};
use crate::COLLECTION;
use semantica_core::Chunk;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const SUCCESS_THRESHOLD: f64 = 0.80;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalResult {
  pub added: Vec<String>,
  pub modified: Vec<String>,
  pub deleted: Vec<String>,
  pub total_chunks: usize,
  pub embedded_chunks: usize,
  pub stored_chunks: usize,
  pub success: bool,
  pub errors: Vec<IndexErrorEntry>,
  pub elapsed_ms: u64,
}

impl IncrementalResult {
  pub fn is_noop(&self) -> bool {
    self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
  }
}

/// Run an incremental update for a project.
///
/// With `specific_files`, the given paths are treated as modified
/// (missing ones as deleted) and the ledger diff is skipped. With
/// `force`, a live lock holder is terminated best-effort before
/// re-acquiring.
pub async fn reindex_changed_files(
  indexer: &Indexer,
  specific_files: Option<&[String]>,
  force: bool,
  on_progress: Option<ProgressFn>,
) -> Result<IncrementalResult, IndexError> {
  let root = indexer.project_root().clone();

  let lock = match LockGuard::acquire(&root, "reindex") {
    Ok(guard) => guard,
    Err(LockError::Busy { pid, .. }) if force => {
      warn!(pid, "Forcing reindex: terminating lock holder");
      LockGuard::kill_holder(&root)?;
      match LockGuard::acquire(&root, "reindex") {
        Ok(guard) => guard,
        Err(e) => return Err(IndexError::Lock(e)),
      }
    }
    Err(e @ LockError::Busy { .. }) => {
      debug!("Reindex refused: {}", e);
      return Err(IndexError::Lock(e));
    }
    Err(e) => return Err(IndexError::Lock(e)),
  };

  let result = run_incremental(indexer, specific_files, on_progress).await;
  indexer.provider().close().await;
  lock.release()?;
  result
}

async fn run_incremental(
  indexer: &Indexer,
  specific_files: Option<&[String]>,
  on_progress: Option<ProgressFn>,
) -> Result<IncrementalResult, IndexError> {
  let started = Instant::now();
  let progress = progress_fn(on_progress);
  let root = indexer.project_root().clone();

  let scanner = Scanner::new(&root, &indexer.config().indexing)?;
  let current_files = scanner.scan();
  progress(Progress {
    phase: Phase::Discovery,
    current: current_files.len(),
    total: current_files.len(),
  });

  // Work out the change set
  let ledger = ChangeLedger::for_project(&root);
  let (added_paths, modified_paths, deleted_paths) = match specific_files {
    Some(paths) => {
      let mut modified = Vec::new();
      let mut deleted = Vec::new();
      for raw in paths {
        let absolute = resolve(&root, raw);
        if scanner.scan_file(&absolute).is_some() {
          modified.push(absolute);
        } else {
          deleted.push(absolute);
        }
      }
      (Vec::new(), modified, deleted)
    }
    None => {
      let diff = ledger.diff(&current_files)?;
      (diff.added, diff.modified, diff.deleted)
    }
  };

  info!(
    added = added_paths.len(),
    modified = modified_paths.len(),
    deleted = deleted_paths.len(),
    "Incremental change set"
  );

  // Drop stale vectors for deleted and modified files
  let mut errors: Vec<IndexErrorEntry> = Vec::new();
  if indexer.store().collection_exists(COLLECTION).await? {
    for path in deleted_paths.iter().chain(modified_paths.iter()) {
      let relative = relative_of(&root, path);
      if let Err(e) = indexer.store().delete_by_file(COLLECTION, &relative).await {
        warn!(file = %relative, error = %e, "Failed to delete stale chunks");
        errors.push(IndexErrorEntry {
          key: relative,
          message: e.to_string(),
        });
      }
    }
  }

  // Re-process added and modified files
  let to_process: Vec<FileRecord> = {
    let wanted: HashSet<&PathBuf> = added_paths.iter().chain(modified_paths.iter()).collect();
    current_files
      .iter()
      .filter(|f| wanted.contains(&f.absolute_path))
      .cloned()
      .collect()
  };

  let (chunks, parse_errors) = indexer.parse_and_chunk(&to_process, &progress).await;
  errors.extend(parse_errors);
  let total_chunks = chunks.len();

  let (chunks, embed_errors) = indexer.embed_chunks(chunks, &progress).await?;
  errors.extend(embed_errors);

  let embedded: Vec<Chunk> = chunks.into_iter().filter(|c| c.embedding.is_some()).collect();
  let embedded_count = embedded.len();

  let stored_chunks = indexer.store_chunks(&embedded, &progress, &mut errors).await?;

  let success = total_chunks == 0 || (embedded_count as f64 / total_chunks as f64) >= SUCCESS_THRESHOLD;

  if success {
    ledger.commit(&current_files)?;
  }

  Ok(IncrementalResult {
    added: added_paths.iter().map(|p| relative_of(&root, p)).collect(),
    modified: modified_paths.iter().map(|p| relative_of(&root, p)).collect(),
    deleted: deleted_paths.iter().map(|p| relative_of(&root, p)).collect(),
    total_chunks,
    embedded_chunks: embedded_count,
    stored_chunks,
    success,
    errors,
    elapsed_ms: started.elapsed().as_millis() as u64,
  })
}

fn resolve(root: &Path, raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() { path } else { root.join(path) }
}

fn relative_of(root: &Path, path: &Path) -> String {
  let relative = path.strip_prefix(root).unwrap_or(path);
  let mut normalized = relative.to_string_lossy().to_string();
  if normalized.contains('\\') {
    normalized = normalized.replace('\\', "/");
  }
  normalized
}
