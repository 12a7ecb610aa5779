//! Indexing pipeline: file enumeration, AST chunking, change tracking,
//! full and incremental runs, plus the lock / estimator / trigger glue.

mod chunker;
mod estimator;
mod incremental;
mod ledger;
mod lock;
mod pipeline;
mod scanner;
mod tokens;
mod trigger;

pub use chunker::{Chunker, ChunkerConfig};
pub use estimator::{PreflightChecks, PreflightReport, preflight};
pub use incremental::{IncrementalResult, reindex_changed_files};
pub use ledger::{ChangeLedger, LedgerDiff, LedgerError};
pub use lock::{LockError, LockGuard, LockRecord, lock_path};
pub use pipeline::{IndexError, IndexErrorEntry, Indexer, IndexingResult, Phase, Progress, ProgressFn};
pub use scanner::{FileRecord, ScanError, Scanner};
pub use tokens::{count_tokens, extract_keywords};
pub use trigger::{TriggerFile, poll_trigger, spawn_trigger_watcher, trigger_path};

/// Name of the per-project chunk collection in the vector store.
pub const COLLECTION: &str = "chunks";

/// Chunker name recorded in chunk metadata.
pub const GRANULARITY: &str = "ast-split-merge";
