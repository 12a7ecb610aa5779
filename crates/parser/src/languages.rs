//! Per-language AST node tables: which tree-sitter node kinds become
//! definition nodes, and what chunk type they map to.

use semantica_core::{ChunkType, Language};

/// Map a tree-sitter node kind to a chunk type. `inside_type` is true
/// when the node sits inside a class-like container, which turns plain
/// functions into methods.
pub fn definition_kind(language: Language, node_kind: &str, inside_type: bool) -> Option<ChunkType> {
  match language {
    Language::Rust => match node_kind {
      "function_item" if inside_type => Some(ChunkType::Method),
      "function_item" => Some(ChunkType::Function),
      "struct_item" | "enum_item" | "union_item" => Some(ChunkType::Class),
      "impl_item" => Some(ChunkType::Class),
      "trait_item" => Some(ChunkType::Interface),
      "mod_item" => Some(ChunkType::Module),
      "type_item" => Some(ChunkType::Type),
      _ => None,
    },
    Language::Python => match node_kind {
      "function_definition" if inside_type => Some(ChunkType::Method),
      "function_definition" => Some(ChunkType::Function),
      "class_definition" => Some(ChunkType::Class),
      _ => None,
    },
    Language::JavaScript | Language::Jsx => match node_kind {
      "function_declaration" | "generator_function_declaration" => Some(ChunkType::Function),
      "method_definition" => Some(ChunkType::Method),
      "class_declaration" => Some(ChunkType::Class),
      _ => None,
    },
    Language::TypeScript | Language::Tsx => match node_kind {
      "function_declaration" | "generator_function_declaration" => Some(ChunkType::Function),
      "method_definition" => Some(ChunkType::Method),
      "class_declaration" | "abstract_class_declaration" => Some(ChunkType::Class),
      "interface_declaration" => Some(ChunkType::Interface),
      "type_alias_declaration" | "enum_declaration" => Some(ChunkType::Type),
      "internal_module" => Some(ChunkType::Module),
      _ => None,
    },
    Language::Go => match node_kind {
      "function_declaration" => Some(ChunkType::Function),
      "method_declaration" => Some(ChunkType::Method),
      "type_declaration" => Some(ChunkType::Type),
      _ => None,
    },
    Language::Java => match node_kind {
      "method_declaration" | "constructor_declaration" => Some(ChunkType::Method),
      "class_declaration" => Some(ChunkType::Class),
      "interface_declaration" => Some(ChunkType::Interface),
      "enum_declaration" => Some(ChunkType::Type),
      _ => None,
    },
    Language::Ruby => match node_kind {
      "method" | "singleton_method" => Some(ChunkType::Method),
      "class" | "singleton_class" => Some(ChunkType::Class),
      "module" => Some(ChunkType::Module),
      _ => None,
    },
    Language::C => match node_kind {
      "function_definition" => Some(ChunkType::Function),
      "struct_specifier" | "union_specifier" => Some(ChunkType::Class),
      "enum_specifier" | "type_definition" => Some(ChunkType::Type),
      _ => None,
    },
    Language::Cpp => match node_kind {
      "function_definition" if inside_type => Some(ChunkType::Method),
      "function_definition" => Some(ChunkType::Function),
      "class_specifier" | "struct_specifier" | "union_specifier" => Some(ChunkType::Class),
      "enum_specifier" | "type_definition" | "alias_declaration" => Some(ChunkType::Type),
      "namespace_definition" => Some(ChunkType::Module),
      _ => None,
    },
  }
}

/// Whether a node kind is a class-like container for method detection
pub fn is_type_container(language: Language, node_kind: &str) -> bool {
  match language {
    Language::Rust => matches!(node_kind, "impl_item" | "trait_item"),
    Language::Python => node_kind == "class_definition",
    Language::JavaScript | Language::Jsx => node_kind == "class_declaration",
    Language::TypeScript | Language::Tsx => {
      matches!(node_kind, "class_declaration" | "abstract_class_declaration")
    }
    Language::Go => false,
    Language::Java => matches!(node_kind, "class_declaration" | "interface_declaration" | "enum_declaration"),
    Language::Ruby => matches!(node_kind, "class" | "singleton_class" | "module"),
    Language::C => false,
    Language::Cpp => matches!(node_kind, "class_specifier" | "struct_specifier"),
  }
}

/// Field name carrying the definition's identifier, per language
pub fn name_field(language: Language, node_kind: &str) -> &'static str {
  match (language, node_kind) {
    (Language::Rust, "impl_item") => "type",
    (Language::C | Language::Cpp, "function_definition" | "type_definition") => "declarator",
    _ => "name",
  }
}

/// Node kinds that are import statements, per language. Ruby requires
/// are plain method calls and are not tracked.
pub fn is_import(language: Language, node_kind: &str) -> bool {
  match language {
    Language::Rust => node_kind == "use_declaration",
    Language::Python => matches!(node_kind, "import_statement" | "import_from_statement"),
    Language::JavaScript | Language::Jsx | Language::TypeScript | Language::Tsx => node_kind == "import_statement",
    Language::Go => node_kind == "import_declaration",
    Language::Java => node_kind == "import_declaration",
    Language::Ruby => false,
    Language::C | Language::Cpp => node_kind == "preproc_include",
  }
}
