use embedding::{EmbeddingError, EmbeddingProvider, provider_from_config};
use index::{COLLECTION, Indexer, reindex_changed_files};
use semantica_core::{Config, ConfigError, resolve_project_path, semantica_dir};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use store::{LanceStore, StoreError, VectorStore};
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ProjectError {
  #[error("Project path does not exist: {0}")]
  InvalidPath(String),
  #[error("Config error: {0}")]
  Config(#[from] ConfigError),
  #[error("Embedding error: {0}")]
  Embedding(#[from] EmbeddingError),
  #[error("Store error: {0}")]
  Store(#[from] StoreError),
}

/// Everything the tools need for one project: resolved root, loaded
/// config, and the configured collaborators.
pub struct ProjectContext {
  pub root: PathBuf,
  pub config: Config,
  pub provider: Arc<dyn EmbeddingProvider>,
  pub store: Arc<dyn VectorStore>,
}

impl ProjectContext {
  pub fn indexer(&self) -> Indexer {
    Indexer::new(
      self.root.clone(),
      self.config.clone(),
      self.provider.clone(),
      self.store.clone(),
    )
  }
}

/// Lazily-opened per-project contexts, shared across connections.
pub struct ProjectRegistry {
  contexts: Mutex<HashMap<PathBuf, Arc<ProjectContext>>>,
  trigger_poll_interval: Duration,
  shutdown_tx: broadcast::Sender<()>,
}

impl ProjectRegistry {
  pub fn new(trigger_poll_interval: Duration) -> Self {
    let (shutdown_tx, _) = broadcast::channel(1);
    Self {
      contexts: Mutex::new(HashMap::new()),
      trigger_poll_interval,
      shutdown_tx,
    }
  }

  /// Open (or reuse) the context for a project path. First open also
  /// starts the project's trigger watcher.
  pub async fn get_or_open(&self, path: &Path) -> Result<Arc<ProjectContext>, ProjectError> {
    if !path.exists() {
      return Err(ProjectError::InvalidPath(path.display().to_string()));
    }
    let root = resolve_project_path(path);

    {
      let contexts = self.contexts.lock().await;
      if let Some(context) = contexts.get(&root) {
        return Ok(context.clone());
      }
    }

    let config = Config::load_for_project(&root)?;
    let provider = provider_from_config(&config.embedding)?;
    let store = LanceStore::connect(&semantica_dir(&root).join("lancedb")).await?;

    let context = Arc::new(ProjectContext {
      root: root.clone(),
      config,
      provider,
      store: Arc::new(store),
    });

    let mut contexts = self.contexts.lock().await;
    // A concurrent open may have won the race; reuse theirs.
    if let Some(existing) = contexts.get(&root) {
      return Ok(existing.clone());
    }
    contexts.insert(root.clone(), context.clone());
    drop(contexts);

    info!(root = %root.display(), "Opened project");
    self.spawn_trigger_loop(context.clone());

    Ok(context)
  }

  /// Watch for reindex triggers dropped by hook scripts and run the
  /// incremental pipeline when one lands.
  fn spawn_trigger_loop(&self, context: Arc<ProjectContext>) {
    let shutdown = self.shutdown_tx.subscribe();
    let mut triggers = index::spawn_trigger_watcher(context.root.clone(), self.trigger_poll_interval, shutdown);

    tokio::spawn(async move {
      while let Some(trigger) = triggers.recv().await {
        info!(root = %context.root.display(), trigger = %trigger.trigger, "Trigger-driven reindex");

        let files = if trigger.changed_files.is_empty() {
          None
        } else {
          Some(trigger.changed_files)
        };

        let indexer = context.indexer();
        match reindex_changed_files(&indexer, files.as_deref(), false, None).await {
          Ok(result) => {
            info!(
              added = result.added.len(),
              modified = result.modified.len(),
              deleted = result.deleted.len(),
              "Trigger-driven reindex finished"
            );
          }
          Err(e) => warn!(error = %e, "Trigger-driven reindex failed"),
        }
      }
    });
  }

  pub async fn list(&self) -> Vec<PathBuf> {
    self.contexts.lock().await.keys().cloned().collect()
  }

  /// Release any indexing lock files held by this process. Called from
  /// the signal path so an interrupted run does not strand its lock.
  pub async fn release_own_locks(&self) {
    let contexts = self.contexts.lock().await;
    for root in contexts.keys() {
      if let Some(record) = index::LockGuard::current(root)
        && record.pid == std::process::id()
      {
        let _ = std::fs::remove_file(index::lock_path(root));
        info!(root = %root.display(), "Released indexing lock on shutdown");
      }
    }
  }

  /// Signal trigger watchers to stop and close stores.
  pub async fn close_all(&self) {
    let _ = self.shutdown_tx.send(());
    let mut contexts = self.contexts.lock().await;
    for (root, context) in contexts.drain() {
      context.store.close().await;
      info!(root = %root.display(), "Closed project");
    }
  }

  /// Collection stats shortcut used by status reporting
  pub async fn collection_stats(&self, context: &ProjectContext) -> Result<Option<store::CollectionStats>, StoreError> {
    if !context.store.collection_exists(COLLECTION).await? {
      return Ok(None);
    }
    Ok(Some(context.store.stats(COLLECTION).await?))
  }
}
