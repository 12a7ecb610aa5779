use crate::tokens::{count_tokens, extract_keywords};
use crate::{FileRecord, GRANULARITY};
use semantica_core::{Chunk, ChunkMetadata, ChunkType, CodeNode};
use tracing::trace;

/// Configuration for the split-merge chunker
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
  /// Size ceiling in approximate tokens
  pub max_tokens: u32,
  /// Floor below which a trailing line-split remainder folds into the
  /// previous group
  pub min_tokens: u32,
  /// Consolidate small adjacent sibling chunks
  pub merge_siblings: bool,
}

impl Default for ChunkerConfig {
  fn default() -> Self {
    Self {
      max_tokens: 250,
      min_tokens: 30,
      merge_siblings: true,
    }
  }
}

/// Split-then-merge chunker over parsed node trees.
///
/// Split walks the tree depth-first: nodes within the size bound are
/// emitted whole, oversized nodes recurse into their children, and
/// oversized leaves fall back to line grouping. Merge is a single
/// left-to-right pass consolidating adjacent chunks that fit together
/// and sit within 3 lines of each other.
pub struct Chunker {
  config: ChunkerConfig,
}

impl Default for Chunker {
  fn default() -> Self {
    Self::new(ChunkerConfig::default())
  }
}

/// A chunk mid-flight, before metadata is attached
#[derive(Debug, Clone)]
struct Piece {
  kind: ChunkType,
  name: Option<String>,
  content: String,
  start_line: u32,
  end_line: u32,
  start_char: usize,
  end_char: usize,
  tokens: u32,
}

impl Chunker {
  pub fn new(config: ChunkerConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &ChunkerConfig {
    &self.config
  }

  /// Chunk one parsed file. Output is ordered by start line and every
  /// chunk's content is a contiguous slice of the source. `imports` is
  /// the file's import list, carried on every chunk as dependencies.
  pub fn chunk(&self, root: &CodeNode, file: &FileRecord, imports: &[String]) -> Vec<Chunk> {
    let mut pieces = Vec::new();
    self.split(root, &mut pieces);

    if self.config.merge_siblings {
      pieces = self.merge(pieces);
    }

    trace!(file = %file.relative_path, chunks = pieces.len(), "Chunked file");

    let dependencies = if imports.is_empty() { None } else { Some(imports.to_vec()) };

    pieces
      .into_iter()
      .map(|piece| {
        let keywords = extract_keywords(&piece.content);
        let metadata = ChunkMetadata {
          file_path: file.relative_path.clone(),
          absolute_path: file.absolute_path.to_string_lossy().to_string(),
          language: file.language,
          start_line: piece.start_line,
          end_line: piece.end_line,
          start_char: piece.start_char,
          end_char: piece.end_char,
          chunk_type: piece.kind,
          granularity: GRANULARITY.to_string(),
          symbol_name: piece.name,
          keywords,
          dependencies: dependencies.clone(),
          token_count: Some(piece.tokens),
          last_modified: file.last_modified,
        };
        Chunk::new(piece.content, metadata)
      })
      .collect()
  }

  /// Depth-first split pass
  fn split(&self, node: &CodeNode, out: &mut Vec<Piece>) {
    let tokens = count_tokens(&node.content);

    if tokens <= self.config.max_tokens {
      out.push(Piece {
        kind: node.kind,
        name: node.name.clone(),
        content: node.content.clone(),
        start_line: node.start_line,
        end_line: node.end_line,
        start_char: node.start_char,
        end_char: node.end_char,
        tokens,
      });
      return;
    }

    if !node.children.is_empty() {
      for child in &node.children {
        self.split(child, out);
      }
      return;
    }

    // Atomic leaf above the limit: fall back to line groups.
    self.split_by_lines(node, out);
  }

  /// Split an indivisible node into consecutive line groups whose
  /// cumulative token count stays within the bound. A single line above
  /// the bound is emitted as-is; nothing smaller exists to emit.
  fn split_by_lines(&self, node: &CodeNode, out: &mut Vec<Piece>) {
    let lines: Vec<&str> = node.content.split('\n').collect();

    let mut group_start = 0usize;
    let mut group_char = 0usize;
    let mut group_tokens = 0u32;
    let mut cursor = 0usize;
    let mut groups: Vec<(usize, usize, usize, usize, u32)> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
      let line_tokens = count_tokens(line);
      let line_end = cursor + line.len();

      if group_tokens > 0 && group_tokens + line_tokens > self.config.max_tokens {
        groups.push((group_start, i, group_char, cursor.saturating_sub(1), group_tokens));
        group_start = i;
        group_char = cursor;
        group_tokens = 0;
      }

      group_tokens += line_tokens;
      cursor = line_end + 1;
    }

    if group_start < lines.len() {
      let last = (group_start, lines.len(), group_char, node.content.len(), group_tokens);
      // A tiny trailing remainder folds back into the previous group
      // when the pair still fits.
      let folds = group_tokens < self.config.min_tokens
        && groups
          .last()
          .is_some_and(|prev| prev.4 + group_tokens <= self.config.max_tokens);
      if folds {
        let prev = groups.pop().expect("checked non-empty");
        groups.push((prev.0, last.1, prev.2, last.3, prev.4 + last.4));
      } else {
        groups.push(last);
      }
    }

    for (start_idx, end_idx, char_start, char_end, tokens) in groups {
      let content = lines[start_idx..end_idx].join("\n");
      out.push(Piece {
        kind: node.kind,
        name: node.name.clone(),
        content,
        start_line: node.start_line + start_idx as u32,
        end_line: node.start_line + end_idx as u32 - 1,
        start_char: node.start_char + char_start,
        end_char: node.start_char + char_end,
        tokens,
      });
    }
  }

  /// Single left-to-right merge pass
  fn merge(&self, pieces: Vec<Piece>) -> Vec<Piece> {
    let mut merged = Vec::new();
    let mut group: Vec<Piece> = Vec::new();
    let mut group_tokens = 0u32;

    for piece in pieces {
      let gap_ok = group
        .last()
        .is_some_and(|last| piece.start_line.saturating_sub(last.end_line) <= 3);

      if !group.is_empty() && group_tokens + piece.tokens <= self.config.max_tokens && gap_ok {
        group_tokens += piece.tokens;
        group.push(piece);
      } else {
        if !group.is_empty() {
          merged.push(finalize_group(std::mem::take(&mut group)));
        }
        group_tokens = piece.tokens;
        group.push(piece);
      }
    }

    if !group.is_empty() {
      merged.push(finalize_group(group));
    }

    merged
  }
}

/// Groups of one pass through unchanged; larger groups become one chunk
/// spanning first start to last end, contents joined by a blank line.
fn finalize_group(mut group: Vec<Piece>) -> Piece {
  if group.len() == 1 {
    return group.pop().expect("group of one");
  }

  let first = &group[0];
  let last = &group[group.len() - 1];

  let names: Vec<String> = group.iter().filter_map(|p| p.name.clone()).collect();
  let name = if names.is_empty() { None } else { Some(names.join(", ")) };

  let content = group
    .iter()
    .map(|p| p.content.as_str())
    .collect::<Vec<_>>()
    .join("\n\n");
  let tokens = count_tokens(&content);

  Piece {
    kind: first.kind,
    name,
    content,
    start_line: first.start_line,
    end_line: last.end_line,
    start_char: first.start_char,
    end_char: last.end_char,
    tokens,
  }
}
