//! `semantica` - semantic code search daemon and client.
//!
//! `serve` runs the long-lived tool server. The other commands talk to
//! a running daemon over its socket, falling back to an in-process
//! router for one-shot use when no daemon is up.

mod logging;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use daemon::{Client, Daemon, DaemonConfig, Request, Response, Router, default_socket_path};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "semantica", version, about = "Semantic code search for project directories")]
struct Cli {
  /// Socket path of the daemon
  #[arg(long, global = true)]
  socket: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run the tool-server daemon
  Serve {
    /// Log to a rolling file instead of stderr
    #[arg(long)]
    log_file: bool,
  },

  /// Index a project directory
  Index {
    /// Project path
    #[arg(default_value = ".")]
    path: PathBuf,
    /// Wait for completion instead of returning a job id
    #[arg(long)]
    foreground: bool,
  },

  /// Search indexed code
  Search {
    /// Natural-language query
    query: String,
    /// Project path
    #[arg(long, default_value = ".")]
    path: PathBuf,
    #[arg(long)]
    max_results: Option<usize>,
    #[arg(long)]
    min_score: Option<f32>,
    /// Restrict to one language
    #[arg(long)]
    language: Option<String>,
    /// Case-insensitive regex over file paths
    #[arg(long)]
    path_pattern: Option<String>,
  },

  /// Show indexing progress or collection stats
  Status {
    #[arg(default_value = ".")]
    path: PathBuf,
  },

  /// Estimate a full index run without starting one
  Estimate {
    #[arg(default_value = ".")]
    path: PathBuf,
  },

  /// Re-index files the change ledger reports as modified
  Reindex {
    #[arg(default_value = ".")]
    path: PathBuf,
    /// Specific files to treat as modified
    #[arg(long)]
    files: Vec<String>,
    /// Take over a held indexing lock
    #[arg(long)]
    force: bool,
  },

  /// Delete the project's index
  Clear {
    #[arg(default_value = ".")]
    path: PathBuf,
    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let socket = cli.socket.clone().unwrap_or_else(default_socket_path);

  match cli.command {
    Command::Serve { log_file } => {
      let _guard = logging::init_logging(log_file);
      let config = DaemonConfig {
        socket_path: socket,
        ..Default::default()
      };
      Daemon::new(config).run().await?;
      Ok(())
    }

    Command::Index { path, foreground } => {
      let _guard = logging::init_logging(false);
      // Without a daemon the job would die with this process, so the
      // in-process fallback always runs to completion.
      let connected = Client::connect_to(&socket).await.ok();
      let background = !foreground && connected.is_some();
      let params = serde_json::json!({
          "path": canonical(&path)?,
          "background": background,
      });
      let response = match connected {
        Some(mut client) => client.call("index_codebase", params).await?,
        None => {
          let router = Router::new();
          router
            .handle(Request {
              id: Some(serde_json::json!(0)),
              method: "index_codebase".to_string(),
              params,
            })
            .await
        }
      };
      print_response(response)
    }

    Command::Search {
      query,
      path,
      max_results,
      min_score,
      language,
      path_pattern,
    } => {
      let _guard = logging::init_logging(false);
      let mut params = serde_json::json!({
          "query": query,
          "path": canonical(&path)?,
      });
      let map = params.as_object_mut().expect("params is an object");
      if let Some(n) = max_results {
        map.insert("maxResults".to_string(), serde_json::json!(n));
      }
      if let Some(s) = min_score {
        map.insert("minScore".to_string(), serde_json::json!(s));
      }
      if let Some(l) = language {
        map.insert("language".to_string(), serde_json::json!(l));
      }
      if let Some(p) = path_pattern {
        map.insert("pathPattern".to_string(), serde_json::json!(p));
      }
      let response = call(&socket, "search_code", params).await?;
      print_response(response)
    }

    Command::Status { path } => {
      let _guard = logging::init_logging(false);
      let params = serde_json::json!({ "path": canonical(&path)? });
      let response = call(&socket, "get_index_status", params).await?;
      print_response(response)
    }

    Command::Estimate { path } => {
      let _guard = logging::init_logging(false);
      let params = serde_json::json!({ "path": canonical(&path)? });
      let response = call(&socket, "preflight", params).await?;
      print_response(response)
    }

    Command::Reindex { path, files, force } => {
      let _guard = logging::init_logging(false);
      let mut params = serde_json::json!({
          "path": canonical(&path)?,
          "force": force,
      });
      if !files.is_empty() {
        params
          .as_object_mut()
          .expect("params is an object")
          .insert("files".to_string(), serde_json::json!(files));
      }
      let response = call(&socket, "reindex_changed_files", params).await?;
      print_response(response)
    }

    Command::Clear { path, yes } => {
      let _guard = logging::init_logging(false);
      if !yes {
        bail!("refusing to clear the index without --yes");
      }
      let params = serde_json::json!({
          "path": canonical(&path)?,
          "confirm": true,
      });
      let response = call(&socket, "clear_index", params).await?;
      print_response(response)
    }
  }
}

fn canonical(path: &PathBuf) -> Result<String> {
  let canonical = path
    .canonicalize()
    .with_context(|| format!("path does not exist: {}", path.display()))?;
  Ok(canonical.to_string_lossy().to_string())
}

/// Send one request: to the running daemon when the socket answers,
/// otherwise through an in-process router.
async fn call(socket: &PathBuf, method: &str, params: serde_json::Value) -> Result<Response> {
  if let Ok(mut client) = Client::connect_to(socket).await {
    return Ok(client.call(method, params).await?);
  }

  tracing::debug!("No daemon on {}; running in-process", socket.display());
  let router = Router::new();
  let request = Request {
    id: Some(serde_json::json!(0)),
    method: method.to_string(),
    params,
  };
  Ok(router.handle(request).await)
}

fn print_response(response: Response) -> Result<()> {
  if let Some(error) = response.error {
    bail!("{} (code {})", error.message, error.code);
  }
  let result = response.result.unwrap_or(serde_json::Value::Null);
  println!("{}", serde_json::to_string_pretty(&result)?);
  Ok(())
}
