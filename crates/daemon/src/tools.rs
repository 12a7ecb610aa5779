use crate::jobs::{JobKind, JobRegistry};
use crate::projects::ProjectRegistry;
use crate::router::{Request, Response, codes};
use index::{COLLECTION, ChangeLedger, IndexError, LockError, Progress, ProgressFn, preflight, reindex_changed_files};
use search::{SearchEngine, SearchError, SearchRequest};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

fn default_true() -> bool {
  true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexParams {
  path: String,
  #[serde(default = "default_true")]
  background: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
  query: String,
  max_results: Option<usize>,
  min_score: Option<f32>,
  language: Option<String>,
  path_pattern: Option<String>,
  path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusParams {
  path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReindexParams {
  path: String,
  files: Option<Vec<String>>,
  #[serde(default)]
  force: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearParams {
  path: String,
  #[serde(default)]
  confirm: bool,
}

/// Handlers for the core tool surface
pub struct ToolHandler {
  registry: Arc<ProjectRegistry>,
  jobs: Arc<JobRegistry>,
}

impl ToolHandler {
  pub fn new(registry: Arc<ProjectRegistry>, jobs: Arc<JobRegistry>) -> Self {
    Self { registry, jobs }
  }

  /// index_codebase: pre-flight, then the full pipeline. background
  /// (the default) returns a job id immediately and reports progress
  /// through the job registry.
  pub async fn index_codebase(&self, request: Request) -> Response {
    let params: IndexParams = match serde_json::from_value(request.params.clone()) {
      Ok(p) => p,
      Err(e) => return Response::error(request.id, codes::INVALID_PARAMS, &e.to_string()),
    };

    let context = match self.registry.get_or_open(Path::new(&params.path)).await {
      Ok(c) => c,
      Err(e) => return Response::error(request.id, codes::INTERNAL, &e.to_string()),
    };

    let report = match preflight(
      &context.root,
      &context.config,
      context.provider.as_ref(),
      context.store.as_ref(),
    )
    .await
    {
      Ok(r) => r,
      Err(e) => return Response::error(request.id, codes::INTERNAL, &e.to_string()),
    };
    let preflight_json = serde_json::to_value(&report).unwrap_or_default();

    if params.background {
      let job_id = self.jobs.start_job(JobKind::Indexing);
      let jobs = self.jobs.clone();
      let progress_jobs = self.jobs.clone();
      let progress_id = job_id.clone();
      let progress: ProgressFn = Arc::new(move |p: Progress| {
        progress_jobs.update_progress(&progress_id, p.phase.as_str(), p.current, p.total);
      });

      let task_id = job_id.clone();
      tokio::spawn(async move {
        let indexer = context.indexer();
        match indexer.index_codebase(Some(progress)).await {
          Ok(result) => {
            info!(job = %task_id, "Background indexing finished: {}", result.completion_message());
            let mut value = serde_json::to_value(&result).unwrap_or_default();
            if let Some(map) = value.as_object_mut() {
              map.insert("message".to_string(), serde_json::json!(result.completion_message()));
            }
            jobs.complete_job(&task_id, value);
          }
          Err(e) => {
            warn!(job = %task_id, error = %e, "Background indexing failed");
            jobs.fail_job(&task_id, e.to_string());
          }
        }
        jobs.cleanup();
      });

      return Response::success(
        request.id,
        serde_json::json!({ "jobId": job_id, "preflight": preflight_json }),
      );
    }

    let indexer = context.indexer();
    match indexer.index_codebase(None).await {
      Ok(result) => {
        let mut value = serde_json::to_value(&result).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
          map.insert("message".to_string(), serde_json::json!(result.completion_message()));
          map.insert("preflight".to_string(), preflight_json);
        }
        Response::success(request.id, value)
      }
      Err(e) => index_error_response(request.id, e),
    }
  }

  /// search_code: ranked results over the project's collection
  pub async fn search_code(&self, request: Request) -> Response {
    let params: SearchParams = match serde_json::from_value(request.params.clone()) {
      Ok(p) => p,
      Err(e) => return Response::error(request.id, codes::INVALID_PARAMS, &e.to_string()),
    };

    let path = params.path.clone().unwrap_or_else(|| ".".to_string());
    let context = match self.registry.get_or_open(Path::new(&path)).await {
      Ok(c) => c,
      Err(e) => return Response::error(request.id, codes::INTERNAL, &e.to_string()),
    };

    match context.store.collection_exists(COLLECTION).await {
      Ok(true) => {}
      Ok(false) => {
        return Response::error(
          request.id,
          codes::INTERNAL,
          "No index for this project; run index_codebase first",
        );
      }
      Err(e) => return Response::error(request.id, codes::INTERNAL, &e.to_string()),
    }

    let engine = SearchEngine::new(
      context.provider.clone(),
      context.store.clone(),
      COLLECTION,
      context.config.search.clone(),
    );

    let search_request = SearchRequest {
      max_results: params.max_results,
      min_score: params.min_score,
      language: params.language,
      path_pattern: params.path_pattern,
    };

    match engine.search(&params.query, &search_request).await {
      Ok(results) => Response::success(
        request.id,
        serde_json::json!({
            "total": results.len(),
            "results": results,
        }),
      ),
      Err(e @ (SearchError::EmptyQuery | SearchError::InvalidPathPattern(_))) => {
        Response::error(request.id, codes::INVALID_PARAMS, &e.to_string())
      }
      Err(e) => Response::error(request.id, codes::INTERNAL, &e.to_string()),
    }
  }

  /// get_index_status: live job progress when a run is in flight,
  /// otherwise collection stats, otherwise "no index".
  pub async fn get_index_status(&self, request: Request) -> Response {
    let params: StatusParams = serde_json::from_value(request.params.clone()).unwrap_or(StatusParams { path: None });

    if let Some(job) = self.jobs.current_indexing_job() {
      return Response::success(
        request.id,
        serde_json::json!({
            "state": "indexing",
            "job": job,
        }),
      );
    }

    let Some(path) = params.path else {
      return Response::success(request.id, serde_json::json!({ "state": "idle" }));
    };

    let context = match self.registry.get_or_open(Path::new(&path)).await {
      Ok(c) => c,
      Err(e) => return Response::error(request.id, codes::INTERNAL, &e.to_string()),
    };

    let ledger = ChangeLedger::for_project(&context.root)
      .snapshot_info()
      .ok()
      .flatten()
      .map(|(timestamp, file_count)| {
        serde_json::json!({
            "lastIndexed": timestamp,
            "fileCount": file_count,
        })
      });

    match self.registry.collection_stats(&context).await {
      Ok(Some(stats)) => Response::success(
        request.id,
        serde_json::json!({
            "state": "indexed",
            "stats": stats,
            "ledger": ledger,
        }),
      ),
      Ok(None) => Response::success(
        request.id,
        serde_json::json!({
            "state": "no index",
        }),
      ),
      Err(e) => Response::error(request.id, codes::INTERNAL, &e.to_string()),
    }
  }

  /// reindex_changed_files: incremental pipeline over the ledger diff
  /// or an explicit file list
  pub async fn reindex_changed_files(&self, request: Request) -> Response {
    let params: ReindexParams = match serde_json::from_value(request.params.clone()) {
      Ok(p) => p,
      Err(e) => return Response::error(request.id, codes::INVALID_PARAMS, &e.to_string()),
    };

    let context = match self.registry.get_or_open(Path::new(&params.path)).await {
      Ok(c) => c,
      Err(e) => return Response::error(request.id, codes::INTERNAL, &e.to_string()),
    };

    let indexer = context.indexer();
    match reindex_changed_files(&indexer, params.files.as_deref(), params.force, None).await {
      Ok(result) => Response::success(request.id, serde_json::to_value(&result).unwrap_or_default()),
      Err(e) => index_error_response(request.id, e),
    }
  }

  /// clear_index: drop the collection and the ledger. Requires an
  /// explicit confirm flag.
  pub async fn clear_index(&self, request: Request) -> Response {
    let params: ClearParams = match serde_json::from_value(request.params.clone()) {
      Ok(p) => p,
      Err(e) => return Response::error(request.id, codes::INVALID_PARAMS, &e.to_string()),
    };

    if !params.confirm {
      return Response::error(request.id, codes::INVALID_PARAMS, "clear_index requires confirm: true");
    }

    let context = match self.registry.get_or_open(Path::new(&params.path)).await {
      Ok(c) => c,
      Err(e) => return Response::error(request.id, codes::INTERNAL, &e.to_string()),
    };

    let existed = match context.store.collection_exists(COLLECTION).await {
      Ok(exists) => exists,
      Err(e) => return Response::error(request.id, codes::INTERNAL, &e.to_string()),
    };

    if existed && let Err(e) = context.store.delete_collection(COLLECTION).await {
      return Response::error(request.id, codes::INTERNAL, &e.to_string());
    }

    if let Err(e) = ChangeLedger::for_project(&context.root).clear() {
      return Response::error(request.id, codes::INTERNAL, &e.to_string());
    }

    info!(root = %context.root.display(), existed, "Index cleared");
    Response::success(request.id, serde_json::json!({ "cleared": existed }))
  }
}

impl ToolHandler {
  /// preflight: estimate a full run without starting one
  pub async fn preflight(&self, request: Request) -> Response {
    let params: StatusParams = match serde_json::from_value(request.params.clone()) {
      Ok(p) => p,
      Err(e) => return Response::error(request.id, codes::INVALID_PARAMS, &e.to_string()),
    };
    let Some(path) = params.path else {
      return Response::error(request.id, codes::INVALID_PARAMS, "preflight requires a path");
    };

    let context = match self.registry.get_or_open(Path::new(&path)).await {
      Ok(c) => c,
      Err(e) => return Response::error(request.id, codes::INTERNAL, &e.to_string()),
    };

    match preflight(
      &context.root,
      &context.config,
      context.provider.as_ref(),
      context.store.as_ref(),
    )
    .await
    {
      Ok(report) => Response::success(request.id, serde_json::to_value(&report).unwrap_or_default()),
      Err(e) => Response::error(request.id, codes::INTERNAL, &e.to_string()),
    }
  }

  /// health_check: probe the project's collaborators
  pub async fn health_check(&self, request: Request) -> Response {
    let params: StatusParams = serde_json::from_value(request.params.clone()).unwrap_or(StatusParams { path: None });

    let Some(path) = params.path else {
      return Response::success(request.id, serde_json::json!({ "status": "ok" }));
    };

    let context = match self.registry.get_or_open(Path::new(&path)).await {
      Ok(c) => c,
      Err(e) => return Response::error(request.id, codes::INTERNAL, &e.to_string()),
    };

    let embedding_healthy = context.provider.health_check().await;
    let store_healthy = context.store.health_check().await;

    Response::success(
      request.id,
      serde_json::json!({
          "status": if embedding_healthy && store_healthy { "ok" } else { "degraded" },
          "embedding": {
              "healthy": embedding_healthy,
              "provider": context.provider.name(),
              "model": context.provider.model_id(),
              "dimensions": context.provider.dimensions(),
          },
          "vectorDb": {
              "healthy": store_healthy,
          },
      }),
    )
  }
}

fn index_error_response(id: Option<serde_json::Value>, error: IndexError) -> Response {
  match &error {
    IndexError::Lock(LockError::Busy { .. }) => Response::error(id, codes::BUSY, &error.to_string()),
    _ => Response::error(id, codes::INTERNAL, &error.to_string()),
  }
}
