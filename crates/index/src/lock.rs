// Exclusion lock for pipeline runs - one holder per project.
//
// On-disk JSON record with pid liveness probing:
// - Stale locks (dead pid) are removed transparently
// - Corrupted lock files are removed
// - Release only deletes a lock this process owns

use semantica_core::semantica_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

const LOCK_FILE: &str = ".indexing.lock";

#[derive(Error, Debug)]
pub enum LockError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
  #[error("Indexing already in progress (pid {pid}, operation {operation})")]
  Busy { pid: u32, operation: String },
}

/// Lock file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
  pub pid: u32,
  pub operation: String,
  pub timestamp: u64,
  #[serde(rename = "projectRoot")]
  pub project_root: String,
}

impl LockRecord {
  fn new(operation: &str, project_root: &Path) -> Self {
    let now = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs();

    Self {
      pid: std::process::id(),
      operation: operation.to_string(),
      timestamp: now,
      project_root: project_root.to_string_lossy().to_string(),
    }
  }
}

/// Path of the lock file for a project
pub fn lock_path(project_root: &Path) -> PathBuf {
  semantica_dir(project_root).join(LOCK_FILE)
}

/// Held lock. Dropping the guard releases the lock; `release` does the
/// same explicitly and reports errors.
pub struct LockGuard {
  path: PathBuf,
  released: bool,
}

impl LockGuard {
  /// Try to acquire the lock for a project. Non-blocking: a live
  /// holder means `Busy`, a dead or corrupted one is cleaned up first.
  pub fn acquire(project_root: &Path, operation: &str) -> Result<Self, LockError> {
    let path = lock_path(project_root);

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    if path.exists() {
      match read_lock(&path) {
        Ok(existing) => {
          if is_process_running(existing.pid) {
            debug!(pid = existing.pid, "Lock held by live process");
            return Err(LockError::Busy {
              pid: existing.pid,
              operation: existing.operation,
            });
          }
          info!(pid = existing.pid, "Removing stale lock from dead process");
          std::fs::remove_file(&path)?;
        }
        Err(e) => {
          warn!(error = %e, "Removing corrupted lock file");
          std::fs::remove_file(&path)?;
        }
      }
    }

    let record = LockRecord::new(operation, project_root);
    std::fs::write(&path, serde_json::to_string_pretty(&record)?)?;
    debug!(operation, path = %path.display(), "Acquired indexing lock");

    Ok(Self { path, released: false })
  }

  /// Read the current lock record for a project, if any
  pub fn current(project_root: &Path) -> Option<LockRecord> {
    let path = lock_path(project_root);
    if !path.exists() {
      return None;
    }
    read_lock(&path).ok()
  }

  /// Best-effort termination of the current holder, then remove the
  /// lock file. Returns true when a process was signalled.
  pub fn kill_holder(project_root: &Path) -> Result<bool, LockError> {
    let path = lock_path(project_root);
    if !path.exists() {
      return Ok(false);
    }

    let record = read_lock(&path)?;

    if record.pid == std::process::id() {
      // Our own lock; just remove it.
      std::fs::remove_file(&path)?;
      return Ok(false);
    }

    if !is_process_running(record.pid) {
      std::fs::remove_file(&path)?;
      return Ok(false);
    }

    info!(pid = record.pid, "Terminating lock holder");
    let signalled = terminate_process(record.pid);
    if signalled {
      std::thread::sleep(Duration::from_millis(500));
      if is_process_running(record.pid) {
        kill_process(record.pid);
        std::thread::sleep(Duration::from_millis(100));
      }
    }

    let _ = std::fs::remove_file(&path);
    Ok(signalled)
  }

  /// Release explicitly, surfacing IO errors
  pub fn release(mut self) -> Result<(), LockError> {
    self.release_inner()?;
    Ok(())
  }

  fn release_inner(&mut self) -> Result<(), LockError> {
    if self.released {
      return Ok(());
    }
    self.released = true;

    if self.path.exists() {
      match read_lock(&self.path) {
        Ok(record) if record.pid == std::process::id() => {
          std::fs::remove_file(&self.path)?;
          debug!(path = %self.path.display(), "Released indexing lock");
        }
        Ok(record) => {
          warn!(
            holder = record.pid,
            us = std::process::id(),
            "Not releasing lock owned by another process"
          );
        }
        Err(_) => {
          let _ = std::fs::remove_file(&self.path);
        }
      }
    }
    Ok(())
  }
}

impl Drop for LockGuard {
  fn drop(&mut self) {
    let _ = self.release_inner();
  }
}

fn read_lock(path: &Path) -> Result<LockRecord, LockError> {
  let contents = std::fs::read_to_string(path)?;
  Ok(serde_json::from_str(&contents)?)
}

/// Check if a process is running
#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
  // kill(pid, 0) returns 0 if the process exists
  unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(windows)]
fn is_process_running(pid: u32) -> bool {
  use windows_sys::Win32::Foundation::{CloseHandle, STILL_ACTIVE};
  use windows_sys::Win32::System::Threading::{GetExitCodeProcess, OpenProcess, PROCESS_QUERY_INFORMATION};

  unsafe {
    let handle = OpenProcess(PROCESS_QUERY_INFORMATION, 0, pid);
    if handle.is_null() {
      return false;
    }
    let mut exit_code = 0;
    let result = GetExitCodeProcess(handle, &mut exit_code);
    CloseHandle(handle);
    result != 0 && exit_code == STILL_ACTIVE as u32
  }
}

#[cfg(not(any(unix, windows)))]
fn is_process_running(_pid: u32) -> bool {
  // Assume running to stay safe
  true
}

#[cfg(unix)]
fn terminate_process(pid: u32) -> bool {
  unsafe { libc::kill(pid as i32, libc::SIGTERM) == 0 }
}

#[cfg(windows)]
fn terminate_process(pid: u32) -> bool {
  use windows_sys::Win32::Foundation::CloseHandle;
  use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_TERMINATE, TerminateProcess as WinTerminate};

  unsafe {
    let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
    if handle.is_null() {
      return false;
    }
    let result = WinTerminate(handle, 1) != 0;
    CloseHandle(handle);
    result
  }
}

#[cfg(not(any(unix, windows)))]
fn terminate_process(_pid: u32) -> bool {
  false
}

#[cfg(unix)]
fn kill_process(pid: u32) -> bool {
  unsafe { libc::kill(pid as i32, libc::SIGKILL) == 0 }
}

#[cfg(windows)]
fn kill_process(pid: u32) -> bool {
  terminate_process(pid)
}

#[cfg(not(any(unix, windows)))]
fn kill_process(_pid: u32) -> bool {
  false
}
