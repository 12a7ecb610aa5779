use criterion::{Criterion, black_box, criterion_group, criterion_main};
use index::{Chunker, ChunkerConfig, FileRecord, count_tokens};
use semantica_core::{ChunkType, CodeNode, Language};
use std::path::PathBuf;

fn synthetic_file(functions: usize, lines_per_fn: usize) -> CodeNode {
  let mut children = Vec::new();
  let mut offset = 0usize;
  let mut line = 1u32;

  for i in 0..functions {
    let body: String = (0..lines_per_fn)
      .map(|j| format!("    let value_{j} = compute(input_{j}, {i});\n"))
      .collect();
    let content = format!("fn handler_{i}() {{\n{body}}}");
    let line_count = content.split('\n').count() as u32;

    children.push(CodeNode {
      kind: ChunkType::Function,
      name: Some(format!("handler_{i}")),
      content: content.clone(),
      start_line: line,
      end_line: line + line_count - 1,
      start_char: offset,
      end_char: offset + content.len(),
      children: vec![],
    });

    offset += content.len() + 2;
    line += line_count + 1;
  }

  let total: String = children.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n\n");
  CodeNode {
    kind: ChunkType::File,
    name: None,
    start_line: 1,
    end_line: line,
    start_char: 0,
    end_char: total.len(),
    content: total,
    children,
  }
}

fn record() -> FileRecord {
  FileRecord {
    absolute_path: PathBuf::from("/bench/lib.rs"),
    relative_path: "lib.rs".to_string(),
    extension: "rs".to_string(),
    language: Language::Rust,
    size: 0,
    last_modified: 0,
  }
}

fn bench_chunker(c: &mut Criterion) {
  let small = synthetic_file(20, 10);
  let large = synthetic_file(200, 30);
  let file = record();
  let chunker = Chunker::new(ChunkerConfig::default());

  c.bench_function("chunk_small_file", |b| {
    b.iter(|| black_box(chunker.chunk(black_box(&small), &file, &[])))
  });

  c.bench_function("chunk_large_file", |b| {
    b.iter(|| black_box(chunker.chunk(black_box(&large), &file, &[])))
  });
}

fn bench_token_counter(c: &mut Criterion) {
  let text = "let total = items.iter().map(|x| x * 2).sum::<usize>();\n".repeat(200);

  c.bench_function("count_tokens_10kb", |b| b.iter(|| black_box(count_tokens(black_box(&text)))));
}

criterion_group!(benches, bench_chunker, bench_token_counter);
criterion_main!(benches);
