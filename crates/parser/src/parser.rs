use crate::languages::{definition_kind, is_import, is_type_container, name_field};
use semantica_core::{ChunkType, CodeNode, Language};
use std::collections::HashMap;
use tree_sitter::{Node, Parser};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
  #[error("Grammar failed to load for {0}")]
  Grammar(Language),
  #[error("Parse failed for {0}")]
  Parse(Language),
}

/// Tree-sitter wrapper producing `CodeNode` trees.
///
/// Parsers are loaded lazily per language and reused; one instance is
/// meant to process many files sequentially.
pub struct CodeParser {
  parsers: HashMap<Language, Parser>,
}

impl Default for CodeParser {
  fn default() -> Self {
    Self::new()
  }
}

impl CodeParser {
  pub fn new() -> Self {
    Self {
      parsers: HashMap::new(),
    }
  }

  /// Parse a source file into a definition tree. The root node always
  /// covers the whole file; children are top-level definitions with
  /// nested definitions below them.
  pub fn parse(&mut self, source: &str, language: Language) -> Result<CodeNode, ParseError> {
    let parser = self.parser_for(language)?;
    let tree = parser.parse(source, None).ok_or(ParseError::Parse(language))?;

    let total_lines = source.lines().count().max(1) as u32;
    let mut children = Vec::new();
    collect_definitions(tree.root_node(), source, language, false, &mut children);

    Ok(CodeNode {
      kind: ChunkType::File,
      name: None,
      content: source.to_string(),
      start_line: 1,
      end_line: total_lines,
      start_char: 0,
      end_char: source.len(),
      children,
    })
  }

  /// Extract the file's import statements, verbatim and in order.
  pub fn extract_imports(&mut self, source: &str, language: Language) -> Result<Vec<String>, ParseError> {
    let parser = self.parser_for(language)?;
    let tree = parser.parse(source, None).ok_or(ParseError::Parse(language))?;

    let mut imports = Vec::new();
    let mut cursor = tree.root_node().walk();
    for child in tree.root_node().named_children(&mut cursor) {
      if is_import(language, child.kind())
        && let Ok(text) = child.utf8_text(source.as_bytes())
      {
        imports.push(text.trim().to_string());
      }
    }
    Ok(imports)
  }

  fn parser_for(&mut self, language: Language) -> Result<&mut Parser, ParseError> {
    if !self.parsers.contains_key(&language) {
      let mut parser = Parser::new();
      parser
        .set_language(&ts_language(language))
        .map_err(|_| ParseError::Grammar(language))?;
      self.parsers.insert(language, parser);
    }
    Ok(self.parsers.get_mut(&language).expect("parser just inserted"))
  }
}

fn ts_language(language: Language) -> tree_sitter::Language {
  match language {
    Language::Rust => tree_sitter_rust::LANGUAGE.into(),
    Language::Python => tree_sitter_python::LANGUAGE.into(),
    Language::JavaScript | Language::Jsx => tree_sitter_javascript::LANGUAGE.into(),
    Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
    Language::Go => tree_sitter_go::LANGUAGE.into(),
    Language::Java => tree_sitter_java::LANGUAGE.into(),
    Language::Ruby => tree_sitter_ruby::LANGUAGE.into(),
    Language::C => tree_sitter_c::LANGUAGE.into(),
    Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
  }
}

/// Walk the syntax tree, emitting a CodeNode for every definition and
/// descending transparently through everything else.
fn collect_definitions(node: Node, source: &str, language: Language, inside_type: bool, out: &mut Vec<CodeNode>) {
  let mut cursor = node.walk();

  for child in node.named_children(&mut cursor) {
    match definition_kind(language, child.kind(), inside_type) {
      Some(kind) => {
        let nested_in_type = inside_type || is_type_container(language, child.kind());
        let mut children = Vec::new();
        collect_definitions(child, source, language, nested_in_type, &mut children);
        out.push(to_code_node(child, source, language, kind, children));
      }
      None => {
        collect_definitions(child, source, language, inside_type, out);
      }
    }
  }
}

fn to_code_node(node: Node, source: &str, language: Language, kind: ChunkType, children: Vec<CodeNode>) -> CodeNode {
  let start_char = node.start_byte();
  let end_char = node.end_byte();

  let name = node
    .child_by_field_name(name_field(language, node.kind()))
    .and_then(|n| n.utf8_text(source.as_bytes()).ok())
    .map(clean_symbol);

  CodeNode {
    kind,
    name,
    content: source[start_char..end_char].to_string(),
    start_line: node.start_position().row as u32 + 1,
    end_line: node.end_position().row as u32 + 1,
    start_char,
    end_char,
    children,
  }
}

/// Strip parameter lists and pointer/reference sigils off a captured
/// identifier (C declarators carry both).
fn clean_symbol(raw: &str) -> String {
  raw
    .split('(')
    .next()
    .unwrap_or(raw)
    .trim_matches(|c: char| c == '*' || c == '&' || c.is_whitespace())
    .to_string()
}
