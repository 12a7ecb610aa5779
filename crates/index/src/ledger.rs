use crate::FileRecord;
use semantica_core::semantica_dir;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const LEDGER_FILE: &str = "file-ledger.json";

#[derive(Error, Debug)]
pub enum LedgerError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

/// On-disk snapshot: absolute path → content hash, plus roll-up fields
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
  root: RootEntry,
  timestamp: i64,
  #[serde(rename = "fileCount")]
  file_count: usize,
  #[serde(rename = "totalHash")]
  total_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RootEntry {
  hash: String,
  children: BTreeMap<String, ChildEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChildEntry {
  hash: String,
  #[serde(rename = "isDirectory")]
  is_directory: bool,
}

/// Result of diffing the current enumeration against the snapshot
#[derive(Debug, Clone, Default)]
pub struct LedgerDiff {
  pub added: Vec<PathBuf>,
  pub modified: Vec<PathBuf>,
  pub deleted: Vec<PathBuf>,
}

impl LedgerDiff {
  pub fn is_empty(&self) -> bool {
    self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
  }
}

/// Content-addressed file snapshot enabling fast incremental diffs.
/// Created on the first full index; rewritten at the end of every
/// successful pipeline run, never mid-run.
pub struct ChangeLedger {
  path: PathBuf,
}

impl ChangeLedger {
  pub fn for_project(project_root: &Path) -> Self {
    Self {
      path: semantica_dir(project_root).join(LEDGER_FILE),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.path.exists()
  }

  /// Compare the current enumeration against the stored snapshot.
  /// Without a snapshot everything counts as added.
  pub fn diff(&self, current: &[FileRecord]) -> Result<LedgerDiff, LedgerError> {
    let Some(snapshot) = self.load()? else {
      return Ok(LedgerDiff {
        added: current.iter().map(|f| f.absolute_path.clone()).collect(),
        ..Default::default()
      });
    };

    let mut diff = LedgerDiff::default();
    let mut seen = std::collections::HashSet::new();

    for file in current {
      let key = file.absolute_path.to_string_lossy().to_string();
      seen.insert(key.clone());

      match snapshot.root.children.get(&key) {
        None => diff.added.push(file.absolute_path.clone()),
        Some(entry) => {
          let hash = hash_file(&file.absolute_path)?;
          if hash != entry.hash {
            diff.modified.push(file.absolute_path.clone());
          }
        }
      }
    }

    for key in snapshot.root.children.keys() {
      if !seen.contains(key) {
        diff.deleted.push(PathBuf::from(key));
      }
    }

    debug!(
      added = diff.added.len(),
      modified = diff.modified.len(),
      deleted = diff.deleted.len(),
      "Ledger diff"
    );
    Ok(diff)
  }

  /// Replace the snapshot with the current enumeration. Written to a
  /// temp file first and renamed into place.
  pub fn commit(&self, current: &[FileRecord]) -> Result<(), LedgerError> {
    let mut children = BTreeMap::new();
    for file in current {
      let key = file.absolute_path.to_string_lossy().to_string();
      children.insert(
        key,
        ChildEntry {
          hash: hash_file(&file.absolute_path)?,
          is_directory: false,
        },
      );
    }

    let total_hash = roll_up(&children);
    let snapshot = Snapshot {
      root: RootEntry {
        hash: total_hash.clone(),
        children,
      },
      timestamp: chrono::Utc::now().timestamp(),
      file_count: current.len(),
      total_hash,
    };

    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let tmp = self.path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(&snapshot)?)?;
    std::fs::rename(&tmp, &self.path)?;

    debug!(files = snapshot.file_count, path = %self.path.display(), "Ledger committed");
    Ok(())
  }

  /// Remove the snapshot entirely (index reset)
  pub fn clear(&self) -> Result<(), LedgerError> {
    if self.path.exists() {
      std::fs::remove_file(&self.path)?;
    }
    Ok(())
  }

  /// Roll-up info from the stored snapshot: (commit timestamp, file
  /// count). None when no snapshot exists.
  pub fn snapshot_info(&self) -> Result<Option<(i64, usize)>, LedgerError> {
    Ok(self.load()?.map(|s| (s.timestamp, s.file_count)))
  }

  fn load(&self) -> Result<Option<Snapshot>, LedgerError> {
    if !self.path.exists() {
      return Ok(None);
    }
    let raw = std::fs::read_to_string(&self.path)?;
    Ok(Some(serde_json::from_str(&raw)?))
  }
}

/// SHA-256 of the file's bytes, streamed
fn hash_file(path: &Path) -> Result<String, std::io::Error> {
  let mut file = std::fs::File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let n = file.read(&mut buffer)?;
    if n == 0 {
      break;
    }
    hasher.update(&buffer[..n]);
  }

  Ok(hex::encode(hasher.finalize()))
}

/// Hash over the sorted `path:hash` lines; BTreeMap iteration is
/// already sorted, so the roll-up is order-independent of input.
fn roll_up(children: &BTreeMap<String, ChildEntry>) -> String {
  let mut hasher = Sha256::new();
  for (path, entry) in children {
    hasher.update(path.as_bytes());
    hasher.update(b":");
    hasher.update(entry.hash.as_bytes());
    hasher.update(b"\n");
  }
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;
  use semantica_core::Language;
  use tempfile::TempDir;

  fn record_for(root: &Path, name: &str) -> FileRecord {
    let path = root.join(name);
    FileRecord {
      absolute_path: path.clone(),
      relative_path: name.to_string(),
      extension: "rs".to_string(),
      language: Language::Rust,
      size: std::fs::metadata(&path).unwrap().len(),
      last_modified: 1,
    }
  }

  #[test]
  fn test_first_diff_is_all_added() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();

    let ledger = ChangeLedger::for_project(dir.path());
    let diff = ledger.diff(&[record_for(dir.path(), "a.rs")]).unwrap();

    assert_eq!(diff.added.len(), 1);
    assert!(diff.modified.is_empty());
    assert!(diff.deleted.is_empty());
  }

  #[test]
  fn test_diff_idempotent_after_commit() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
    let files = vec![record_for(dir.path(), "a.rs")];

    let ledger = ChangeLedger::for_project(dir.path());
    ledger.commit(&files).unwrap();

    let diff = ledger.diff(&files).unwrap();
    assert!(diff.is_empty());
  }

  #[test]
  fn test_modified_file_detected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
    let files = vec![record_for(dir.path(), "a.rs")];

    let ledger = ChangeLedger::for_project(dir.path());
    ledger.commit(&files).unwrap();

    std::fs::write(dir.path().join("a.rs"), "fn a() { changed() }").unwrap();
    let diff = ledger.diff(&files).unwrap();

    assert!(diff.added.is_empty());
    assert_eq!(diff.modified.len(), 1);
    assert!(diff.deleted.is_empty());
  }

  #[test]
  fn test_deleted_file_detected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
    std::fs::write(dir.path().join("b.rs"), "fn b() {}").unwrap();
    let all = vec![record_for(dir.path(), "a.rs"), record_for(dir.path(), "b.rs")];

    let ledger = ChangeLedger::for_project(dir.path());
    ledger.commit(&all).unwrap();

    let remaining = vec![all[0].clone()];
    let diff = ledger.diff(&remaining).unwrap();

    assert!(diff.added.is_empty());
    assert!(diff.modified.is_empty());
    assert_eq!(diff.deleted.len(), 1);
    assert!(diff.deleted[0].ends_with("b.rs"));
  }

  #[test]
  fn test_snapshot_layout_on_disk() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
    let files = vec![record_for(dir.path(), "a.rs")];

    let ledger = ChangeLedger::for_project(dir.path());
    ledger.commit(&files).unwrap();

    let raw = std::fs::read_to_string(ledger.path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(value.get("root").is_some());
    assert_eq!(value["fileCount"], 1);
    assert!(value.get("totalHash").is_some());
    let children = value["root"]["children"].as_object().unwrap();
    assert_eq!(children.len(), 1);
    let entry = children.values().next().unwrap();
    assert_eq!(entry["isDirectory"], false);
    // Full SHA-256 of the file bytes
    assert_eq!(entry["hash"].as_str().unwrap().len(), 64);
  }

  #[test]
  fn test_commit_replaces_snapshot() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
    std::fs::write(dir.path().join("b.rs"), "fn b() {}").unwrap();

    let ledger = ChangeLedger::for_project(dir.path());
    ledger
      .commit(&[record_for(dir.path(), "a.rs"), record_for(dir.path(), "b.rs")])
      .unwrap();
    ledger.commit(&[record_for(dir.path(), "a.rs")]).unwrap();

    // b.rs fell out of the snapshot, so re-adding it reads as added
    let diff = ledger
      .diff(&[record_for(dir.path(), "a.rs"), record_for(dir.path(), "b.rs")])
      .unwrap();
    assert_eq!(diff.added.len(), 1);
  }

  #[test]
  fn test_snapshot_info() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
    let ledger = ChangeLedger::for_project(dir.path());

    assert!(ledger.snapshot_info().unwrap().is_none());

    ledger.commit(&[record_for(dir.path(), "a.rs")]).unwrap();
    let (timestamp, file_count) = ledger.snapshot_info().unwrap().unwrap();
    assert!(timestamp > 0);
    assert_eq!(file_count, 1);
  }

  #[test]
  fn test_clear() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
    let ledger = ChangeLedger::for_project(dir.path());
    ledger.commit(&[record_for(dir.path(), "a.rs")]).unwrap();
    assert!(ledger.exists());
    ledger.clear().unwrap();
    assert!(!ledger.exists());
  }
}
