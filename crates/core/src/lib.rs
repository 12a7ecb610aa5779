//! Shared types for Semantica: chunks, languages, project identity,
//! and per-project configuration.

mod chunk;
mod config;
mod language;
mod project;

pub use chunk::{Chunk, ChunkMetadata, ChunkType, CodeNode, chunk_id};
pub use config::{
  Config, ConfigError, EmbeddingConfig, EmbeddingProviderKind, IndexingConfig, ResultFormat, SearchConfig,
  SearchStrategy, parse_byte_size,
};
pub use language::Language;
pub use project::{find_git_root, resolve_project_path, semantica_dir};
