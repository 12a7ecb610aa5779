use crate::jobs::JobRegistry;
use crate::projects::ProjectRegistry;
use crate::server::ShutdownHandle;
use crate::tools::ToolHandler;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// JSON-RPC style request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
  #[serde(default)]
  pub id: Option<serde_json::Value>,
  pub method: String,
  #[serde(default)]
  pub params: serde_json::Value,
}

/// JSON-RPC style response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
  pub code: i32,
  pub message: String,
}

impl Response {
  pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
    Self {
      id,
      result: Some(result),
      error: None,
    }
  }

  pub fn error(id: Option<serde_json::Value>, code: i32, message: &str) -> Self {
    Self {
      id,
      result: None,
      error: Some(RpcError {
        code,
        message: message.to_string(),
      }),
    }
  }
}

/// Error codes beyond the standard JSON-RPC set
pub mod codes {
  pub const PARSE_ERROR: i32 = -32700;
  pub const METHOD_NOT_FOUND: i32 = -32601;
  pub const INVALID_PARAMS: i32 = -32602;
  pub const INTERNAL: i32 = -32000;
  /// Lock contention; retry with force
  pub const BUSY: i32 = -32001;
  /// Tool exists but is handled outside this process
  pub const EXTERNAL: i32 = -32002;
}

/// Request router for the tool surface
pub struct Router {
  registry: Arc<ProjectRegistry>,
  jobs: Arc<JobRegistry>,
  tool_handler: ToolHandler,
  shutdown_handle: Mutex<Option<ShutdownHandle>>,
}

impl Router {
  pub fn new() -> Self {
    Self::with_registry(Arc::new(ProjectRegistry::new(Duration::from_secs(30))))
  }

  pub fn with_registry(registry: Arc<ProjectRegistry>) -> Self {
    let jobs = Arc::new(JobRegistry::new());
    let tool_handler = ToolHandler::new(Arc::clone(&registry), Arc::clone(&jobs));

    Self {
      registry,
      jobs,
      tool_handler,
      shutdown_handle: Mutex::new(None),
    }
  }

  /// Set the shutdown handle (called after the server is created)
  pub async fn set_shutdown_handle(&self, handle: ShutdownHandle) {
    let mut guard = self.shutdown_handle.lock().await;
    *guard = Some(handle);
  }

  pub fn registry(&self) -> &Arc<ProjectRegistry> {
    &self.registry
  }

  pub fn jobs(&self) -> &Arc<JobRegistry> {
    &self.jobs
  }

  /// Handle one request
  pub async fn handle(&self, request: Request) -> Response {
    debug!(method = %request.method, "Handling request");

    match request.method.as_str() {
      // Health/meta
      "ping" => Response::success(request.id, serde_json::json!("pong")),
      "status" => self.handle_status(request).await,
      "shutdown" => self.handle_shutdown(request).await,

      // Core tools
      "index_codebase" => self.tool_handler.index_codebase(request).await,
      "search_code" => self.tool_handler.search_code(request).await,
      "get_index_status" => self.tool_handler.get_index_status(request).await,
      "reindex_changed_files" => self.tool_handler.reindex_changed_files(request).await,
      "clear_index" => self.tool_handler.clear_index(request).await,
      "preflight" => self.tool_handler.preflight(request).await,
      "health_check" => self.tool_handler.health_check(request).await,

      // Tools owned by outer tooling, not this process
      "enable_git_hooks" | "onboard_project" | "reset_state" => Response::error(
        request.id,
        codes::EXTERNAL,
        &format!("{} is handled by the onboarding tooling, not the daemon", request.method),
      ),

      _ => {
        warn!(method = %request.method, "Unknown method");
        Response::error(
          request.id,
          codes::METHOD_NOT_FOUND,
          &format!("Method not found: {}", request.method),
        )
      }
    }
  }

  async fn handle_status(&self, request: Request) -> Response {
    let projects = self.registry.list().await;
    let status = serde_json::json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "projects": projects.len(),
    });
    Response::success(request.id, status)
  }

  async fn handle_shutdown(&self, request: Request) -> Response {
    info!("Shutdown requested via RPC");
    let guard = self.shutdown_handle.lock().await;
    if let Some(ref handle) = *guard {
      handle.shutdown();
      Response::success(request.id, serde_json::json!({"status": "shutting_down"}))
    } else {
      Response::error(request.id, codes::INTERNAL, "Shutdown handle not available")
    }
  }
}

impl Default for Router {
  fn default() -> Self {
    Self::new()
  }
}
