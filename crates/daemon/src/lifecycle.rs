use crate::projects::ProjectRegistry;
use crate::router::Router;
use crate::scheduler::spawn_scheduler;
use crate::server::{Server, ServerError, default_socket_path};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum LifecycleError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Server error: {0}")]
  Server(#[from] ServerError),
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
  /// Socket path for the JSON-RPC transport
  pub socket_path: PathBuf,
  /// How often each project's trigger sentinel is polled
  pub trigger_poll_interval: Duration,
}

impl Default for DaemonConfig {
  fn default() -> Self {
    Self {
      socket_path: default_socket_path(),
      trigger_poll_interval: Duration::from_secs(30),
    }
  }
}

/// Daemon lifecycle: wires the registry, router, and server together,
/// and releases indexing locks on signal-driven shutdown.
pub struct Daemon {
  config: DaemonConfig,
  registry: Arc<ProjectRegistry>,
}

impl Daemon {
  pub fn new(config: DaemonConfig) -> Self {
    let registry = Arc::new(ProjectRegistry::new(config.trigger_poll_interval));
    Self { config, registry }
  }

  pub fn registry(&self) -> Arc<ProjectRegistry> {
    Arc::clone(&self.registry)
  }

  pub async fn run(&self) -> Result<(), LifecycleError> {
    info!(socket = %self.config.socket_path.display(), "Starting semantica daemon");

    let router = Arc::new(Router::with_registry(Arc::clone(&self.registry)));
    let server = Server::with_socket_path(Arc::clone(&router), self.config.socket_path.clone());
    let shutdown = server.shutdown_handle();
    router.set_shutdown_handle(shutdown.clone()).await;

    let (scheduler_tx, scheduler_rx) = broadcast::channel(1);
    let _scheduler = spawn_scheduler(Arc::clone(router.jobs()), scheduler_rx);

    // SIGINT / SIGTERM: release lock files before the server exits so
    // an interrupted pipeline run never strands its lock.
    let signal_registry = Arc::clone(&self.registry);
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
      if wait_for_signal().await {
        info!("Termination signal received, shutting down");
        signal_registry.release_own_locks().await;
        signal_shutdown.shutdown();
      }
    });

    server.run().await?;

    let _ = scheduler_tx.send(());
    self.registry.release_own_locks().await;
    self.registry.close_all().await;
    info!("Daemon shutdown complete");

    Ok(())
  }
}

#[cfg(unix)]
async fn wait_for_signal() -> bool {
  let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
    Ok(s) => s,
    Err(e) => {
      warn!(error = %e, "Failed to install SIGTERM handler");
      return signal::ctrl_c().await.is_ok();
    }
  };

  tokio::select! {
    result = signal::ctrl_c() => result.is_ok(),
    _ = sigterm.recv() => true,
  }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
  signal::ctrl_c().await.is_ok()
}
