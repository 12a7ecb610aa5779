use crate::Language;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The semantic shape of a chunk, derived from the AST node it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
  File,
  Function,
  Method,
  Class,
  Module,
  Interface,
  Type,
  Block,
}

impl ChunkType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ChunkType::File => "file",
      ChunkType::Function => "function",
      ChunkType::Method => "method",
      ChunkType::Class => "class",
      ChunkType::Module => "module",
      ChunkType::Interface => "interface",
      ChunkType::Type => "type",
      ChunkType::Block => "block",
    }
  }

  pub fn from_str_loose(s: &str) -> Self {
    match s {
      "file" => ChunkType::File,
      "function" => ChunkType::Function,
      "method" => ChunkType::Method,
      "class" => ChunkType::Class,
      "module" => ChunkType::Module,
      "interface" => ChunkType::Interface,
      "type" => ChunkType::Type,
      _ => ChunkType::Block,
    }
  }
}

/// A node in the parsed source tree, the chunker's input. Children are
/// fully contained within the parent's span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeNode {
  pub kind: ChunkType,
  pub name: Option<String>,
  pub content: String,
  pub start_line: u32,
  pub end_line: u32,
  pub start_char: usize,
  pub end_char: usize,
  #[serde(default)]
  pub children: Vec<CodeNode>,
}

/// Metadata carried by every chunk. Content is co-stored with this in
/// the vector store row so search responses never re-read source files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
  /// Project-relative path, `/`-separated on every platform.
  pub file_path: String,
  pub absolute_path: String,
  pub language: Language,
  /// 1-based, inclusive.
  pub start_line: u32,
  pub end_line: u32,
  /// Byte offsets into the file at `last_modified`.
  pub start_char: usize,
  pub end_char: usize,
  pub chunk_type: ChunkType,
  /// Name of the chunker that produced this chunk.
  pub granularity: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub symbol_name: Option<String>,
  /// At most 10 lowercased identifier tokens for keyword overlap scoring.
  pub keywords: Vec<String>,
  /// Import statements of the originating file, when any were found.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub dependencies: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub token_count: Option<u32>,
  /// Unix seconds of the source file's mtime when chunked.
  pub last_modified: u64,
}

/// The unit of indexing: a contiguous slice of one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
  pub id: String,
  pub content: String,
  /// Absent until the embedding phase attaches a vector.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub embedding: Option<Vec<f32>>,
  pub metadata: ChunkMetadata,
}

impl Chunk {
  pub fn new(content: String, metadata: ChunkMetadata) -> Self {
    let id = chunk_id(&metadata.file_path, metadata.start_line, metadata.end_line);
    Self {
      id,
      content,
      embedding: None,
      metadata,
    }
  }
}

/// Stable short id for a (path, span) pair. Equal inputs always produce
/// equal ids; span uniqueness after merging rules out collisions within
/// one file.
pub fn chunk_id(file_path: &str, start_line: u32, end_line: u32) -> String {
  let mut hasher = Sha256::new();
  hasher.update(format!("{}:{}:{}", file_path, start_line, end_line).as_bytes());
  let digest = hasher.finalize();
  hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_chunk_id_deterministic() {
    let a = chunk_id("src/main.rs", 1, 42);
    let b = chunk_id("src/main.rs", 1, 42);
    assert_eq!(a, b);
    assert_eq!(a.len(), 16);
  }

  #[test]
  fn test_chunk_id_distinguishes_spans() {
    assert_ne!(chunk_id("src/main.rs", 1, 42), chunk_id("src/main.rs", 1, 43));
    assert_ne!(chunk_id("src/main.rs", 1, 42), chunk_id("src/lib.rs", 1, 42));
  }

  #[test]
  fn test_chunk_new_derives_id() {
    let metadata = ChunkMetadata {
      file_path: "a.ts".into(),
      absolute_path: "/p/a.ts".into(),
      language: Language::TypeScript,
      start_line: 10,
      end_line: 20,
      start_char: 100,
      end_char: 300,
      chunk_type: ChunkType::Method,
      granularity: "ast-split-merge".into(),
      symbol_name: Some("login".into()),
      keywords: vec!["login".into()],
      dependencies: None,
      token_count: Some(80),
      last_modified: 0,
    };
    let chunk = Chunk::new("function login() {}".into(), metadata);
    assert_eq!(chunk.id, chunk_id("a.ts", 10, 20));
    assert!(chunk.embedding.is_none());
  }
}
