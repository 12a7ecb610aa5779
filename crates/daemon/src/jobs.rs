//! In-process registry of background jobs with live progress.
//!
//! Process-wide state tied to the server lifetime; nothing here is
//! persisted, so a daemon restart loses in-flight progress visibility.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Terminal job records kept after cleanup
const RETAINED_JOBS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
  Indexing,
  Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
  Running,
  Completed,
  Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
  pub id: String,
  pub kind: JobKind,
  pub status: JobStatus,
  pub phase: String,
  pub current: usize,
  pub total: usize,
  pub started_at: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ended_at: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[derive(Default)]
struct Inner {
  jobs: HashMap<String, JobRecord>,
  /// The last-started running indexing job, if any
  current_indexing: Option<String>,
}

/// Job registry. A plain mutex keeps it callable from both sync
/// progress callbacks and async tool handlers.
#[derive(Default)]
pub struct JobRegistry {
  inner: Mutex<Inner>,
  sequence: AtomicU64,
}

impl JobRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a running job and return its id. An indexing job becomes
  /// the current one.
  pub fn start_job(&self, kind: JobKind) -> String {
    let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
    let id = format!("job-{}-{}", chrono::Utc::now().timestamp_millis(), sequence);

    let record = JobRecord {
      id: id.clone(),
      kind,
      status: JobStatus::Running,
      phase: "starting".to_string(),
      current: 0,
      total: 0,
      started_at: chrono::Utc::now().timestamp_millis(),
      ended_at: None,
      result: None,
      error: None,
    };

    let mut inner = self.inner.lock().expect("job registry poisoned");
    if kind == JobKind::Indexing {
      inner.current_indexing = Some(id.clone());
    }
    inner.jobs.insert(id.clone(), record);
    debug!(job = %id, ?kind, "Job started");
    id
  }

  pub fn update_progress(&self, id: &str, phase: &str, current: usize, total: usize) {
    let mut inner = self.inner.lock().expect("job registry poisoned");
    if let Some(job) = inner.jobs.get_mut(id) {
      job.phase = phase.to_string();
      job.current = current;
      job.total = total;
    }
  }

  pub fn complete_job(&self, id: &str, result: serde_json::Value) {
    self.finish(id, JobStatus::Completed, Some(result), None);
  }

  pub fn fail_job(&self, id: &str, error: String) {
    self.finish(id, JobStatus::Failed, None, Some(error));
  }

  fn finish(&self, id: &str, status: JobStatus, result: Option<serde_json::Value>, error: Option<String>) {
    let mut inner = self.inner.lock().expect("job registry poisoned");
    if let Some(job) = inner.jobs.get_mut(id) {
      job.status = status;
      job.ended_at = Some(chrono::Utc::now().timestamp_millis());
      job.result = result;
      job.error = error;
    }
    if inner.current_indexing.as_deref() == Some(id) {
      inner.current_indexing = None;
    }
    debug!(job = %id, ?status, "Job finished");
  }

  pub fn get_job(&self, id: &str) -> Option<JobRecord> {
    self.inner.lock().expect("job registry poisoned").jobs.get(id).cloned()
  }

  /// The running indexing job, if one is in flight
  pub fn current_indexing_job(&self) -> Option<JobRecord> {
    let inner = self.inner.lock().expect("job registry poisoned");
    inner
      .current_indexing
      .as_ref()
      .and_then(|id| inner.jobs.get(id))
      .cloned()
  }

  /// Drop old terminal records, keeping the 10 most recent. Running
  /// jobs are never dropped.
  pub fn cleanup(&self) {
    let mut inner = self.inner.lock().expect("job registry poisoned");

    let mut terminal: Vec<(String, i64)> = inner
      .jobs
      .values()
      .filter(|j| j.status != JobStatus::Running)
      .map(|j| (j.id.clone(), j.ended_at.unwrap_or(j.started_at)))
      .collect();

    if terminal.len() <= RETAINED_JOBS {
      return;
    }

    terminal.sort_by_key(|(_, ended)| std::cmp::Reverse(*ended));
    for (id, _) in terminal.into_iter().skip(RETAINED_JOBS) {
      inner.jobs.remove(&id);
    }
  }

  pub fn job_count(&self) -> usize {
    self.inner.lock().expect("job registry poisoned").jobs.len()
  }
}
