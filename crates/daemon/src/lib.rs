//! Long-lived tool-server: line-oriented JSON-RPC over a unix socket,
//! dispatching the indexing and search tools, with an in-process job
//! registry for background runs.

mod jobs;
mod lifecycle;
mod projects;
mod router;
mod scheduler;
mod server;
mod tools;

pub use jobs::{JobKind, JobRecord, JobRegistry, JobStatus};
pub use lifecycle::{Daemon, DaemonConfig};
pub use projects::{ProjectContext, ProjectError, ProjectRegistry};
pub use router::{Request, Response, Router, RpcError};
pub use scheduler::spawn_scheduler;
pub use server::{Client, Server, ServerError, ShutdownHandle, default_socket_path};
pub use tools::ToolHandler;
