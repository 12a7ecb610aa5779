use semantica_core::ResultFormat;

const SNIPPET_LINES: usize = 10;
const HYBRID_FULL_LIMIT: usize = 20;
const HYBRID_HEAD_LINES: usize = 15;

/// Shape a chunk's content for the response.
///
/// snippet: first 10 lines. context: full content. hybrid: full content
/// when it fits in 20 lines, otherwise the first 15 with a truncation
/// marker.
pub fn format_snippet(content: &str, format: ResultFormat) -> String {
  match format {
    ResultFormat::Snippet => head(content, SNIPPET_LINES),
    ResultFormat::Context => content.to_string(),
    ResultFormat::Hybrid => {
      if content.lines().count() <= HYBRID_FULL_LIMIT {
        content.to_string()
      } else {
        format!("{}\n… (truncated)", head(content, HYBRID_HEAD_LINES))
      }
    }
  }
}

fn head(content: &str, lines: usize) -> String {
  content.lines().take(lines).collect::<Vec<_>>().join("\n")
}
