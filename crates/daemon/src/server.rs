//! Line-oriented JSON-RPC transport over a unix socket.
//!
//! One request per line, one response per line. Each accepted
//! connection gets its own task; a shared cancellation token stops the
//! accept loop and every in-flight connection together, so shutdown
//! does not wait on idle clients.

use crate::router::{Request, Response, Router, codes};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
  #[error("Daemon closed the connection")]
  Disconnected,
}

/// Where clients look for the daemon. The name is fixed so every
/// process on the machine resolves the same socket.
pub fn default_socket_path() -> PathBuf {
  let dir = std::env::var_os("XDG_RUNTIME_DIR")
    .map(PathBuf::from)
    .unwrap_or_else(std::env::temp_dir);
  dir.join("semantica.sock")
}

/// The daemon's socket listener.
pub struct Server {
  socket_path: PathBuf,
  router: Arc<Router>,
  shutdown: CancellationToken,
}

impl Server {
  pub fn with_socket_path(router: Arc<Router>, socket_path: PathBuf) -> Self {
    Self {
      socket_path,
      router,
      shutdown: CancellationToken::new(),
    }
  }

  pub fn shutdown_handle(&self) -> ShutdownHandle {
    ShutdownHandle {
      token: self.shutdown.clone(),
    }
  }

  pub fn socket_path(&self) -> &Path {
    &self.socket_path
  }

  /// Accept connections until the shutdown token fires, then remove
  /// the socket file.
  pub async fn run(&self) -> Result<(), ServerError> {
    let listener = self.bind()?;
    info!(socket = %self.socket_path.display(), "Daemon listening");

    loop {
      let stream = tokio::select! {
        _ = self.shutdown.cancelled() => {
          info!("Shutdown signal received");
          break;
        }
        accepted = listener.accept() => match accepted {
          Ok((stream, _)) => stream,
          Err(e) => {
            error!(error = %e, "Accept error");
            continue;
          }
        },
      };

      let connection = Connection::new(stream, Arc::clone(&self.router), self.shutdown.clone());
      tokio::spawn(connection.serve());
    }

    if self.socket_path.exists() {
      std::fs::remove_file(&self.socket_path)?;
    }
    Ok(())
  }

  /// Bind the listener, clearing a stale socket file from a previous
  /// daemon first.
  fn bind(&self) -> Result<UnixListener, ServerError> {
    if let Some(parent) = self.socket_path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    if self.socket_path.exists() {
      std::fs::remove_file(&self.socket_path)?;
    }
    Ok(UnixListener::bind(&self.socket_path)?)
  }
}

/// Handle to stop the server and its connections.
#[derive(Clone)]
pub struct ShutdownHandle {
  token: CancellationToken,
}

impl ShutdownHandle {
  pub fn shutdown(&self) {
    self.token.cancel();
  }
}

/// One accepted client connection.
struct Connection {
  lines: Lines<BufReader<OwnedReadHalf>>,
  writer: OwnedWriteHalf,
  router: Arc<Router>,
  shutdown: CancellationToken,
}

impl Connection {
  fn new(stream: UnixStream, router: Arc<Router>, shutdown: CancellationToken) -> Self {
    let (reader, writer) = stream.into_split();
    Self {
      lines: BufReader::new(reader).lines(),
      writer,
      router,
      shutdown,
    }
  }

  /// Read requests line by line until the client hangs up or the
  /// daemon shuts down. Unparseable lines get a parse-error response
  /// instead of killing the connection.
  async fn serve(mut self) {
    loop {
      let line = tokio::select! {
        _ = self.shutdown.cancelled() => break,
        next = self.lines.next_line() => match next {
          Ok(Some(line)) => line,
          Ok(None) => {
            debug!("Client disconnected");
            break;
          }
          Err(e) => {
            debug!(error = %e, "Connection read failed");
            break;
          }
        },
      };

      let trimmed = line.trim();
      if trimmed.is_empty() {
        continue;
      }

      let response = match serde_json::from_str::<Request>(trimmed) {
        Ok(request) => {
          debug!(method = %request.method, id = ?request.id, "Request");
          self.router.handle(request).await
        }
        Err(e) => Response::error(None, codes::PARSE_ERROR, &format!("Parse error: {}", e)),
      };

      if let Err(e) = self.send(&response).await {
        debug!(error = %e, "Connection write failed");
        break;
      }
    }
  }

  async fn send(&mut self, response: &Response) -> Result<(), ServerError> {
    let mut payload = serde_json::to_string(response)?;
    payload.push('\n');
    self.writer.write_all(payload.as_bytes()).await?;
    self.writer.flush().await?;
    Ok(())
  }
}

/// Client side of the transport. Holds the split stream and numbers
/// its own requests.
pub struct Client {
  reader: BufReader<OwnedReadHalf>,
  writer: OwnedWriteHalf,
  next_id: u64,
}

impl Client {
  pub async fn connect() -> Result<Self, ServerError> {
    Self::connect_to(&default_socket_path()).await
  }

  pub async fn connect_to(socket_path: &Path) -> Result<Self, ServerError> {
    let stream = UnixStream::connect(socket_path).await?;
    let (reader, writer) = stream.into_split();
    Ok(Self {
      reader: BufReader::new(reader),
      writer,
      next_id: 0,
    })
  }

  /// Send one request and wait for its response line.
  pub async fn call(&mut self, method: &str, params: serde_json::Value) -> Result<Response, ServerError> {
    self.next_id += 1;
    let request = Request {
      id: Some(serde_json::json!(self.next_id)),
      method: method.to_string(),
      params,
    };

    let mut payload = serde_json::to_string(&request)?;
    payload.push('\n');
    self.writer.write_all(payload.as_bytes()).await?;
    self.writer.flush().await?;

    let mut line = String::new();
    if self.reader.read_line(&mut line).await? == 0 {
      return Err(ServerError::Disconnected);
    }
    Ok(serde_json::from_str(&line)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_default_socket_path_is_stable() {
    // Two calls (as a daemon and a client would make) agree
    assert_eq!(default_socket_path(), default_socket_path());
    assert!(default_socket_path().ends_with("semantica.sock"));
  }

  async fn start_server(socket_path: PathBuf) -> (ShutdownHandle, tokio::task::JoinHandle<Result<(), ServerError>>) {
    let server = Server::with_socket_path(Arc::new(Router::new()), socket_path);
    let shutdown = server.shutdown_handle();
    let handle = tokio::spawn(async move { server.run().await });
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    (shutdown, handle)
  }

  #[tokio::test]
  async fn test_roundtrip_and_request_numbering() {
    let dir = TempDir::new().unwrap();
    let socket_path = dir.path().join("test.sock");
    let (shutdown, handle) = start_server(socket_path.clone()).await;

    let mut client = Client::connect_to(&socket_path).await.unwrap();

    // Multiple calls flow over one connection with increasing ids
    let first = client.call("ping", serde_json::json!({})).await.unwrap();
    assert_eq!(first.result, Some(serde_json::json!("pong")));
    assert_eq!(first.id, Some(serde_json::json!(1)));

    let second = client.call("ping", serde_json::json!({})).await.unwrap();
    assert_eq!(second.id, Some(serde_json::json!(2)));

    shutdown.shutdown();
    let _ = handle.await;
    assert!(!socket_path.exists());
  }

  #[tokio::test]
  async fn test_shutdown_ends_open_connections() {
    let dir = TempDir::new().unwrap();
    let socket_path = dir.path().join("test.sock");
    let (shutdown, handle) = start_server(socket_path.clone()).await;

    let mut client = Client::connect_to(&socket_path).await.unwrap();
    client.call("ping", serde_json::json!({})).await.unwrap();

    shutdown.shutdown();
    let _ = handle.await;

    // The connection task observed the token; the next call fails
    let result = client.call("ping", serde_json::json!({})).await;
    assert!(result.is_err());
  }
}
