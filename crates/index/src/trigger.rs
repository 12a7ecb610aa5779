//! Trigger watcher: external hook scripts signal a running daemon by
//! dropping `.semantica/reindex-trigger.json` into the project. The
//! watcher polls for the sentinel, consumes fresh ones, and silently
//! discards stale ones.

use semantica_core::semantica_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

const TRIGGER_FILE: &str = "reindex-trigger.json";

/// A trigger older than this is discarded without scheduling a run
const MAX_TRIGGER_AGE_SECS: i64 = 5 * 60;

/// Sentinel file contents written by hook scripts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerFile {
  /// Unix seconds when the hook fired
  pub timestamp: i64,
  /// What fired the hook ("post-commit", "post-merge", ...)
  pub trigger: String,
  #[serde(rename = "changedFiles", default)]
  pub changed_files: Vec<String>,
}

pub fn trigger_path(project_root: &Path) -> PathBuf {
  semantica_dir(project_root).join(TRIGGER_FILE)
}

/// Check for a trigger file and consume it. Returns the trigger when it
/// is fresh; stale or unreadable sentinels are deleted and ignored.
pub fn poll_trigger(project_root: &Path) -> Option<TriggerFile> {
  let path = trigger_path(project_root);
  if !path.exists() {
    return None;
  }

  let parsed: Option<TriggerFile> = std::fs::read_to_string(&path)
    .ok()
    .and_then(|raw| serde_json::from_str(&raw).ok());

  // Consume the sentinel atomically before acting on it, so a rapid
  // re-trigger writes a fresh file rather than racing this one.
  if let Err(e) = std::fs::remove_file(&path) {
    warn!(error = %e, "Failed to remove trigger file");
    return None;
  }

  let trigger = match parsed {
    Some(t) => t,
    None => {
      warn!(path = %path.display(), "Discarding unreadable trigger file");
      return None;
    }
  };

  let age = chrono::Utc::now().timestamp() - trigger.timestamp;
  if age > MAX_TRIGGER_AGE_SECS {
    debug!(age, trigger = %trigger.trigger, "Discarding stale trigger");
    return None;
  }

  debug!(trigger = %trigger.trigger, files = trigger.changed_files.len(), "Trigger accepted");
  Some(trigger)
}

/// Spawn a background poll loop. Fresh triggers are forwarded on the
/// returned channel; the loop exits on the shutdown signal.
pub fn spawn_trigger_watcher(
  project_root: PathBuf,
  poll_interval: Duration,
  mut shutdown: broadcast::Receiver<()>,
) -> mpsc::Receiver<TriggerFile> {
  let (tx, rx) = mpsc::channel(8);

  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
      tokio::select! {
        _ = ticker.tick() => {
          if let Some(trigger) = poll_trigger(&project_root)
            && tx.send(trigger).await.is_err()
          {
            break;
          }
        }
        _ = shutdown.recv() => {
          debug!(root = %project_root.display(), "Trigger watcher shutting down");
          break;
        }
      }
    }
  });

  rx
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn write_trigger(root: &Path, timestamp: i64) {
    let dir = semantica_dir(root);
    std::fs::create_dir_all(&dir).unwrap();
    let trigger = TriggerFile {
      timestamp,
      trigger: "post-commit".to_string(),
      changed_files: vec!["src/main.rs".to_string()],
    };
    std::fs::write(trigger_path(root), serde_json::to_string(&trigger).unwrap()).unwrap();
  }

  #[test]
  fn test_no_trigger() {
    let dir = TempDir::new().unwrap();
    assert!(poll_trigger(dir.path()).is_none());
  }

  #[test]
  fn test_fresh_trigger_consumed() {
    let dir = TempDir::new().unwrap();
    write_trigger(dir.path(), chrono::Utc::now().timestamp());

    let trigger = poll_trigger(dir.path()).unwrap();
    assert_eq!(trigger.trigger, "post-commit");
    assert_eq!(trigger.changed_files, vec!["src/main.rs".to_string()]);

    // Consumed: the sentinel is gone
    assert!(!trigger_path(dir.path()).exists());
    assert!(poll_trigger(dir.path()).is_none());
  }

  #[test]
  fn test_stale_trigger_deleted_silently() {
    let dir = TempDir::new().unwrap();
    write_trigger(dir.path(), chrono::Utc::now().timestamp() - 600);

    assert!(poll_trigger(dir.path()).is_none());
    assert!(!trigger_path(dir.path()).exists());
  }

  #[test]
  fn test_unreadable_trigger_deleted() {
    let dir = TempDir::new().unwrap();
    let path = trigger_path(dir.path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ nope").unwrap();

    assert!(poll_trigger(dir.path()).is_none());
    assert!(!path.exists());
  }

  #[tokio::test]
  async fn test_watcher_forwards_triggers() {
    let dir = TempDir::new().unwrap();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let mut rx = spawn_trigger_watcher(dir.path().to_path_buf(), Duration::from_millis(10), shutdown_rx);

    write_trigger(dir.path(), chrono::Utc::now().timestamp());

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert!(received.is_some());

    let _ = shutdown_tx.send(());
  }
}
